use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

const RUN_LOCK_NAMESPACE: i64 = 0x5354_4B50_4C53; // "STKPLS"

fn run_lock_key(run_date: NaiveDate) -> i64 {
    RUN_LOCK_NAMESPACE ^ i64::from(run_date.num_days_from_ce())
}

/// Session advisory lock for one run date.
///
/// The lock lives on the connection that took it, so that connection is held
/// until [`RunLock::release`]. Dropping without releasing returns the connection
/// to the pool still locked; the lock then ends with that session.
#[derive(Debug)]
pub struct RunLock {
    conn: PoolConnection<Postgres>,
    key: i64,
    run_date: NaiveDate,
}

impl RunLock {
    /// `None` when another session already holds the lock for `run_date`.
    pub async fn try_acquire(pool: &sqlx::PgPool, run_date: NaiveDate) -> anyhow::Result<Option<Self>> {
        let key = run_lock_key(run_date);
        let mut conn = pool
            .acquire()
            .await
            .context("acquire connection for run lock failed")?;

        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("pg_try_advisory_lock for {run_date} failed (key={key})"))?;

        Ok(acquired.then_some(Self { conn, key, run_date }))
    }

    /// Unlock on the same session that locked.
    pub async fn release(mut self) -> anyhow::Result<()> {
        let (released,): (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(self.key)
            .fetch_one(&mut *self.conn)
            .await
            .with_context(|| format!("pg_advisory_unlock for {} failed (key={})", self.run_date, self.key))?;
        anyhow::ensure!(released, "run lock for {} was not held by this session", self.run_date);
        Ok(())
    }
}
