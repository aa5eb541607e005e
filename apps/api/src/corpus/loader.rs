use std::cmp::Ordering;

use tracing::{debug, info};
use uuid::Uuid;

use crate::corpus::store::{CorpusError, CorpusStore};
use crate::models::role_block::RoleBlock;

/// Loads a candidate's RoleBlocks, most recent first.
///
/// Current roles lead, then end date descending, then start date descending. Roles
/// without dates keep the store's order (stable sort). Missing fields stay missing.
pub async fn load_corpus(
    store: &dyn CorpusStore,
    candidate_id: Uuid,
) -> Result<Vec<RoleBlock>, CorpusError> {
    let mut roles = store.fetch_role_blocks(candidate_id).await?;

    if roles.is_empty() {
        return Err(CorpusError::Empty(candidate_id));
    }

    for role in roles.iter().filter(|r| r.is_partial()) {
        debug!(
            role_id = %role.role_id,
            employer = %role.employer,
            has_start = role.period.start.is_some(),
            skill_tags = role.skill_tags.len(),
            achievements = role.achievements.len(),
            "Partially populated role block"
        );
    }

    roles.sort_by(recency_order);

    info!(
        candidate_id = %candidate_id,
        roles = roles.len(),
        "Loaded experience corpus"
    );
    Ok(roles)
}

/// Most-recent-first ordering. `None` dates sort after known dates.
fn recency_order(a: &RoleBlock, b: &RoleBlock) -> Ordering {
    fn desc_none_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
        match (a, b) {
            (Some(x), Some(y)) => y.cmp(x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    b.is_current
        .cmp(&a.is_current)
        .then_with(|| {
            // A current role has no meaningful end date; compare those by start only.
            if a.is_current && b.is_current {
                Ordering::Equal
            } else {
                desc_none_last(&a.period.end, &b.period.end)
            }
        })
        .then_with(|| desc_none_last(&a.period.start, &b.period.start))
}
