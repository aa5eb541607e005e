//! Axum route handlers for the Document API.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::profile::RequirementProfile;
use crate::pipeline::{PipelineConfig, PipelineOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateDocumentRequest {
    pub candidate_id: Uuid,
    pub requirement_profile: RequirementProfile,
    /// Per-request overrides on top of the service defaults.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// Layers a partial JSON override over the service's default config.
fn effective_config(
    defaults: &PipelineConfig,
    overrides: Option<serde_json::Value>,
) -> Result<PipelineConfig, AppError> {
    let Some(overrides) = overrides else {
        return Ok(defaults.clone());
    };
    let mut merged = serde_json::to_value(defaults)
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    merge_json(&mut merged, overrides);
    serde_json::from_value(merged).map_err(|e| AppError::Validation(format!("invalid config: {e}")))
}

fn merge_json(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base), serde_json::Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// POST /api/v1/documents/generate
///
/// Runs the full pipeline for one candidate against one requirement profile and returns
/// the surfaced document, its grade report, and the run's audit trail.
pub async fn handle_generate_document(
    State(state): State<AppState>,
    Json(request): Json<GenerateDocumentRequest>,
) -> Result<Json<PipelineOutcome>, AppError> {
    let config = effective_config(&state.config.pipeline, request.config)?;

    let outcome = state
        .pipeline
        .generate_document(request.candidate_id, request.requirement_profile, config)
        .await?;

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_override_keeps_sibling_defaults() {
        let defaults = PipelineConfig::default();
        let config = effective_config(
            &defaults,
            Some(json!({ "word_budget": { "max": 700 }, "max_improvement_passes": 1 })),
        )
        .unwrap();
        assert_eq!(config.word_budget.max, 700);
        assert_eq!(config.word_budget.min, defaults.word_budget.min);
        assert_eq!(config.max_improvement_passes, 1);
        assert_eq!(config.bullets_per_role, defaults.bullets_per_role);
    }

    #[test]
    fn test_no_override_uses_defaults() {
        let defaults = PipelineConfig {
            max_improvement_passes: 3,
            ..PipelineConfig::default()
        };
        assert_eq!(effective_config(&defaults, None).unwrap(), defaults);
    }

    #[test]
    fn test_mistyped_override_is_validation_error() {
        let err = effective_config(
            &PipelineConfig::default(),
            Some(json!({ "bullets_per_role": "many" })),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
