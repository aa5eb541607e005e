use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::pipeline::orchestrator::PipelineOutcome;

/// Where finished runs are handed off. Called once per run, after a terminal state.
#[async_trait]
pub trait RunSink: Send + Sync {
    async fn persist(&self, outcome: &PipelineOutcome) -> anyhow::Result<()>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL sink
// ────────────────────────────────────────────────────────────────────────────

/// Stores the surfaced document and every grade report of the run in one transaction.
#[derive(Clone)]
pub struct PgRunSink {
    pool: PgPool,
}

impl PgRunSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunSink for PgRunSink {
    async fn persist(&self, outcome: &PipelineOutcome) -> anyhow::Result<()> {
        let document = serde_json::to_value(&outcome.document)?;
        let audit_trail = serde_json::to_value(&outcome.audit_trail)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO generated_documents
                (run_id, candidate_id, status, iteration_count, composite_score,
                 document, audit_trail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            "#,
        )
        .bind(outcome.run_id)
        .bind(outcome.candidate_id)
        .bind(outcome.status.as_str())
        .bind(outcome.iteration_count as i32)
        .bind(outcome.report.composite_score)
        .bind(&document)
        .bind(&audit_trail)
        .execute(&mut *tx)
        .await?;

        for report in &outcome.audit_trail.grade_reports {
            let body = serde_json::to_value(report)?;
            sqlx::query(
                r#"
                INSERT INTO grade_reports
                    (report_id, run_id, iteration, composite_score, pass, report, graded_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(report.report_id)
            .bind(outcome.run_id)
            .bind(report.iteration as i32)
            .bind(report.composite_score)
            .bind(report.pass)
            .bind(&body)
            .bind(report.graded_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            run_id = %outcome.run_id,
            reports = outcome.audit_trail.grade_reports.len(),
            "Persisted generated document"
        );
        Ok(())
    }
}
