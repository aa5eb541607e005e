use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::grade::Dimension;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionPolicy {
    pub weight: f64,
    pub target: f64,
    /// Any score below this fails the document regardless of composite.
    pub floor: f64,
}

/// Weights, targets, floors, and the pass threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingPolicy {
    pub dimensions: BTreeMap<Dimension, DimensionPolicy>,
    pub pass_threshold: f64,
    /// Blend a deterministic-mode model assessment into the seniority heuristic.
    pub llm_seniority: bool,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        let dim = |weight, target, floor| DimensionPolicy {
            weight,
            target,
            floor,
        };
        Self {
            dimensions: [
                (Dimension::FactualGrounding, dim(0.30, 100.0, 100.0)),
                (Dimension::KeywordCoverage, dim(0.25, 70.0, 50.0)),
                (Dimension::SeniorityAlignment, dim(0.15, 70.0, 40.0)),
                (Dimension::LengthCompliance, dim(0.15, 100.0, 60.0)),
                (Dimension::StructuralCompleteness, dim(0.15, 100.0, 100.0)),
            ]
            .into_iter()
            .collect(),
            pass_threshold: 80.0,
            llm_seniority: true,
        }
    }
}

impl GradingPolicy {
    /// Falls back to the default entry when a partial override omits a dimension.
    pub fn get(&self, dimension: Dimension) -> DimensionPolicy {
        self.dimensions
            .get(&dimension)
            .copied()
            .or_else(|| GradingPolicy::default().dimensions.get(&dimension).copied())
            .unwrap_or(DimensionPolicy {
                weight: 0.0,
                target: 0.0,
                floor: 0.0,
            })
    }

    /// Weighted mean over every dimension that has a score.
    pub fn composite(&self, scores: &BTreeMap<Dimension, f64>) -> f64 {
        let (sum, weights) = scores.iter().fold((0.0, 0.0), |(sum, weights), (dim, score)| {
            let w = self.get(*dim).weight;
            (sum + w * score, weights + w)
        });
        if weights == 0.0 {
            0.0
        } else {
            sum / weights
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (dim, p) in &self.dimensions {
            if !(0.0..=100.0).contains(&p.floor) || !(0.0..=100.0).contains(&p.target) {
                return Err(format!("{dim:?}: target and floor must be within 0..=100"));
            }
            if p.floor > p.target {
                return Err(format!("{dim:?}: floor {} is above target {}", p.floor, p.target));
            }
            if !p.weight.is_finite() || p.weight < 0.0 {
                return Err(format!("{dim:?}: weight must be a non-negative number"));
            }
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err("pass_threshold must be within 0..=100".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let total: f64 = GradingPolicy::default().dimensions.values().map(|p| p.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_composite_is_weighted_mean() {
        let policy = GradingPolicy::default();
        let scores: BTreeMap<Dimension, f64> = Dimension::ALL.iter().map(|d| (*d, 100.0)).collect();
        assert!((policy.composite(&scores) - 100.0).abs() < 1e-9);

        let mut scores = scores;
        scores.insert(Dimension::KeywordCoverage, 0.0);
        assert!((policy.composite(&scores) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let policy: GradingPolicy = serde_json::from_str(r#"{"pass_threshold": 90}"#).unwrap();
        assert_eq!(policy.pass_threshold, 90.0);
        assert_eq!(policy.get(Dimension::FactualGrounding).floor, 100.0);
    }

    #[test]
    fn test_floor_above_target_rejected() {
        let mut policy = GradingPolicy::default();
        policy.dimensions.insert(
            Dimension::KeywordCoverage,
            DimensionPolicy {
                weight: 0.25,
                target: 50.0,
                floor: 60.0,
            },
        );
        assert!(policy.validate().is_err());
    }
}
