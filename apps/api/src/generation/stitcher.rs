//! Cross-role stitching: rank, dedup, floor, greedy fill, floor truncation.
//!
//! The upper word bound is always enforced here. The lower bound depends on how much
//! grounded material exists; a shortfall is recorded, never padded.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::generation::dedup::{is_duplicate, DedupConfig};
use crate::generation::relevance::{rank_order, RankedBullet};
use crate::models::document::{
    BudgetAdjustment, GeneratedBullet, RoleSection, SkillCategories, StitchedDocument,
};
use crate::models::role_block::RoleBlock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchConfig {
    pub bullet_budget: usize,
    /// Minimum bullets kept for the most recent role that has any.
    pub recent_role_floor: usize,
    /// Minimum bullets kept for every other role that has any.
    pub other_role_floor: usize,
    pub dedup: DedupConfig,
}

impl StitchConfig {
    pub fn with_budget(bullet_budget: usize) -> Self {
        Self {
            bullet_budget,
            recent_role_floor: 2,
            other_role_floor: 1,
            dedup: DedupConfig::default(),
        }
    }
}

/// Assembles the bullet sections for `roles` (recency-ordered) from each role's accepted
/// bullets. Bullets in `excluded` are never considered.
pub fn stitch(
    roles: &[RoleBlock],
    bullets_by_role: &HashMap<Uuid, Vec<GeneratedBullet>>,
    excluded: &HashSet<Uuid>,
    config: &StitchConfig,
) -> StitchedDocument {
    let mut adjustments = Vec::new();

    // (0) global rank
    let mut ranked: Vec<RankedBullet> = Vec::new();
    for (role_rank, role) in roles.iter().enumerate() {
        let Some(bullets) = bullets_by_role.get(&role.role_id) else {
            continue;
        };
        let eligible = bullets.iter().filter(|b| !excluded.contains(&b.bullet_id));
        for (position, bullet) in eligible.enumerate() {
            ranked.push(RankedBullet {
                bullet: bullet.clone(),
                role_rank,
                position,
            });
        }
    }
    ranked.sort_by(rank_order);

    // (1) dedup in rank order; the earlier (higher-ranked) bullet wins
    let mut unique: Vec<RankedBullet> = Vec::with_capacity(ranked.len());
    for candidate in ranked {
        match unique
            .iter()
            .find(|kept| is_duplicate(&kept.bullet, &candidate.bullet, &config.dedup))
        {
            Some(kept) => adjustments.push(BudgetAdjustment::DuplicateDropped {
                bullet_id: candidate.bullet.bullet_id,
                kept_bullet_id: kept.bullet.bullet_id,
            }),
            None => unique.push(candidate),
        }
    }

    // (2) per-role floors
    let most_recent_with_bullets = unique.iter().map(|r| r.role_rank).min();
    let mut floor_taken: HashMap<usize, usize> = HashMap::new();
    let mut selected = vec![false; unique.len()];
    for (idx, item) in unique.iter().enumerate() {
        let floor = if Some(item.role_rank) == most_recent_with_bullets {
            config.recent_role_floor
        } else {
            config.other_role_floor
        };
        let taken = floor_taken.entry(item.role_rank).or_insert(0);
        if *taken < floor {
            *taken += 1;
            selected[idx] = true;
        }
    }

    let words_of = |idx: usize| unique[idx].bullet.estimated_word_count;
    let mut used: usize = (0..unique.len())
        .filter(|&i| selected[i])
        .map(words_of)
        .sum();

    // (4) the floor alone can overflow: drop lowest-relevance floor bullets whole
    for idx in (0..unique.len()).rev() {
        if used <= config.bullet_budget {
            break;
        }
        if selected[idx] {
            selected[idx] = false;
            used -= words_of(idx);
            adjustments.push(BudgetAdjustment::FloorTruncated {
                bullet_id: unique[idx].bullet.bullet_id,
                role_id: unique[idx].bullet.role_id,
            });
        }
    }

    // (3) greedy fill in rank order
    for idx in 0..unique.len() {
        if selected[idx] {
            continue;
        }
        let words = words_of(idx);
        if used + words <= config.bullet_budget {
            selected[idx] = true;
            used += words;
        } else if !was_truncated(&adjustments, unique[idx].bullet.bullet_id) {
            adjustments.push(BudgetAdjustment::SkippedOverBudget {
                bullet_id: unique[idx].bullet.bullet_id,
                words,
            });
        }
    }

    let sections: Vec<RoleSection> = roles
        .iter()
        .enumerate()
        .filter_map(|(role_rank, role)| {
            // `unique` is already in rank order, so section order is relevance order
            let bullets: Vec<GeneratedBullet> = unique
                .iter()
                .zip(&selected)
                .filter(|(item, keep)| **keep && item.role_rank == role_rank)
                .map(|(item, _)| item.bullet.clone())
                .collect();
            (!bullets.is_empty()).then(|| RoleSection {
                role_id: role.role_id,
                employer: role.employer.clone(),
                title: role.title.clone(),
                bullets,
            })
        })
        .collect();

    for adjustment in &adjustments {
        debug!(adjustment = ?adjustment, "Stitch adjustment");
    }
    info!(
        sections = sections.len(),
        bullet_words = used,
        bullet_budget = config.bullet_budget,
        adjustments = adjustments.len(),
        "Stitched document"
    );

    StitchedDocument {
        sections,
        summary_text: String::new(),
        skill_categories: SkillCategories::default(),
        total_word_count: used,
        bullet_budget: config.bullet_budget,
        budget_adjustments: adjustments,
    }
}

fn was_truncated(adjustments: &[BudgetAdjustment], bullet_id: Uuid) -> bool {
    adjustments.iter().any(|a| {
        matches!(a, BudgetAdjustment::FloorTruncated { bullet_id: id, .. } if *id == bullet_id)
    })
}

/// Records (or clears) a shortfall against `min_words` once the summary is in.
pub fn note_shortfall(document: &mut StitchedDocument, min_words: usize) {
    document
        .budget_adjustments
        .retain(|a| !matches!(a, BudgetAdjustment::Shortfall { .. }));
    document.recount();
    if document.total_word_count < min_words {
        document.budget_adjustments.push(BudgetAdjustment::Shortfall {
            total_words: document.total_word_count,
            min_words,
        });
    }
}
