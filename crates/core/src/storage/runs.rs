use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

/// Final numbers written to the run ledger.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: RunStatus,
    pub total_stocks: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub error: Option<String>,
}

pub async fn start_run(pool: &sqlx::PgPool, run_date: NaiveDate) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let started_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO analysis_runs (id, run_date, started_at, status) VALUES ($1, $2, $3, $4)",
    )
    .persistent(false)
    .bind(id)
    .bind(run_date)
    .bind(started_at)
    .bind(RunStatus::Running.as_str())
    .execute(pool)
    .await
    .context("insert analysis_runs failed")?;

    Ok(id)
}

pub async fn finish_run(pool: &sqlx::PgPool, id: Uuid, summary: &RunSummary) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE analysis_runs \
         SET finished_at = $2, status = $3, total_stocks = $4, success_count = $5, error_count = $6, error = $7 \
         WHERE id = $1",
    )
    .persistent(false)
    .bind(id)
    .bind(Utc::now())
    .bind(summary.status.as_str())
    .bind(summary.total_stocks as i32)
    .bind(summary.success_count as i32)
    .bind(summary.error_count as i32)
    .bind(summary.error.as_deref())
    .execute(pool)
    .await
    .with_context(|| format!("update analysis_runs {id} failed"))?;

    Ok(())
}
