use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

use crate::models::role_block::{RoleBlock, RolePeriod};

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("candidate {0} not found")]
    NotFound(Uuid),

    #[error("candidate {0} has no role blocks")]
    Empty(Uuid),

    #[error("corpus store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only source of truth for a candidate's career records.
///
/// Returns `NotFound` for unknown candidates and `Ok(vec![])` for known candidates with
/// no roles; the loader decides what an empty corpus means.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    async fn fetch_role_blocks(&self, candidate_id: Uuid) -> Result<Vec<RoleBlock>, CorpusError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL store
// ────────────────────────────────────────────────────────────────────────────

/// Row shape of `role_blocks`. Every content column is nullable because the upstream
/// editor saves partially filled roles.
#[derive(Debug, Clone, FromRow)]
pub struct RoleBlockRow {
    pub role_id: Uuid,
    pub employer: Option<String>,
    pub title: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub achievements: Option<Vec<String>>,
    pub skill_tags: Option<Vec<String>>,
    pub is_current: Option<bool>,
}

impl From<RoleBlockRow> for RoleBlock {
    fn from(row: RoleBlockRow) -> Self {
        RoleBlock {
            role_id: row.role_id,
            employer: row.employer.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            period: RolePeriod {
                start: row.start_date,
                end: row.end_date,
            },
            location: row.location,
            achievements: row.achievements.unwrap_or_default(),
            skill_tags: row
                .skill_tags
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<BTreeSet<_>>(),
            is_current: row.is_current.unwrap_or(false),
        }
    }
}

pub struct PgCorpusStore {
    pool: PgPool,
}

impl PgCorpusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(e: sqlx::Error) -> CorpusError {
    CorpusError::Unavailable(e.to_string())
}

#[async_trait]
impl CorpusStore for PgCorpusStore {
    async fn fetch_role_blocks(&self, candidate_id: Uuid) -> Result<Vec<RoleBlock>, CorpusError> {
        let known: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM candidates WHERE id = $1)")
                .bind(candidate_id)
                .fetch_one(&self.pool)
                .await
                .map_err(unavailable)?;

        if !known {
            return Err(CorpusError::NotFound(candidate_id));
        }

        let rows = sqlx::query_as::<_, RoleBlockRow>(
            r#"
            SELECT role_id, employer, title, start_date, end_date,
                   location, achievements, skill_tags, is_current
            FROM role_blocks
            WHERE candidate_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows.into_iter().map(RoleBlock::from).collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store (fixtures)
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub use memory::InMemoryCorpusStore;

#[cfg(test)]
mod memory {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::{CorpusError, CorpusStore};
    use crate::models::role_block::RoleBlock;

    #[derive(Debug, Clone, Default)]
    pub struct InMemoryCorpusStore {
        candidates: HashMap<Uuid, Vec<RoleBlock>>,
        unavailable: bool,
    }

    impl InMemoryCorpusStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_candidate(mut self, candidate_id: Uuid, roles: Vec<RoleBlock>) -> Self {
            self.candidates.insert(candidate_id, roles);
            self
        }

        /// A store whose every call fails as if the backing service were down.
        pub fn offline() -> Self {
            Self {
                candidates: HashMap::new(),
                unavailable: true,
            }
        }
    }

    #[async_trait]
    impl CorpusStore for InMemoryCorpusStore {
        async fn fetch_role_blocks(&self, candidate_id: Uuid) -> Result<Vec<RoleBlock>, CorpusError> {
            if self.unavailable {
                return Err(CorpusError::Unavailable("in-memory store is offline".to_string()));
            }
            self.candidates
                .get(&candidate_id)
                .cloned()
                .ok_or(CorpusError::NotFound(candidate_id))
        }
    }
}
