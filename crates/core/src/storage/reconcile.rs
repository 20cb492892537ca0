//! Make storage mirror the current run's ranked list.

use crate::domain::prediction::ShockingPredictions;
use crate::domain::stock::RankedStock;
use crate::storage::{StockRecord, StockStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub stale_removed: usize,
    pub stale_failed: usize,
    pub written: usize,
    pub write_failed: usize,
    pub price_rows: u64,
    pub prediction_rows: u64,
    pub shocking_written: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.stale_failed == 0 && self.write_failed == 0 && self.shocking_written
    }

    pub fn error_count(&self) -> usize {
        self.stale_failed + self.write_failed + usize::from(!self.shocking_written)
    }
}

pub struct PersistenceReconciler<'a> {
    store: &'a dyn StockStore,
    batch_size: usize,
}

impl<'a> PersistenceReconciler<'a> {
    pub fn new(store: &'a dyn StockStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Remove tickers that are no longer ranked, then write every ranked ticker.
    ///
    /// Only reading the stored ticker set is fatal. Each stale removal and each
    /// ticker write fails on its own and is counted in the report.
    pub async fn reconcile(
        &self,
        ranked: &[RankedStock],
        shocking: &ShockingPredictions,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let stored = self
            .store
            .list_tickers()
            .await
            .context("failed to list stored tickers")?;
        let current: BTreeSet<&str> = ranked.iter().map(|r| r.ticker()).collect();

        for ticker in stored.iter().filter(|t| !current.contains(t.as_str())) {
            match self.remove_stale(ticker).await {
                Ok(()) => {
                    report.stale_removed += 1;
                    tracing::info!(ticker = %ticker, "removed stale ticker");
                }
                Err(err) => {
                    report.stale_failed += 1;
                    tracing::error!(ticker = %ticker, error = %format!("{err:#}"), "failed to remove stale ticker");
                }
            }
        }

        for stock in ranked {
            match self.write_stock(stock, now).await {
                Ok((price_rows, prediction_rows)) => {
                    report.written += 1;
                    report.price_rows += price_rows;
                    report.prediction_rows += prediction_rows;
                }
                Err(err) => {
                    report.write_failed += 1;
                    tracing::error!(ticker = stock.ticker(), error = %format!("{err:#}"), "failed to write ticker");
                }
            }
        }

        match self.store.replace_shocking_predictions(shocking, now).await {
            Ok(()) => report.shocking_written = true,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "failed to write shocking predictions");
            }
        }

        tracing::info!(
            stale_removed = report.stale_removed,
            stale_failed = report.stale_failed,
            written = report.written,
            write_failed = report.write_failed,
            price_rows = report.price_rows,
            prediction_rows = report.prediction_rows,
            "storage reconciled"
        );
        Ok(report)
    }

    async fn remove_stale(&self, ticker: &str) -> anyhow::Result<()> {
        self.store.delete_stock_children(ticker).await?;
        self.store.delete_stock(ticker).await?;
        Ok(())
    }

    async fn write_stock(&self, stock: &RankedStock, now: DateTime<Utc>) -> anyhow::Result<(u64, u64)> {
        let ticker = stock.ticker();
        self.store
            .upsert_stock(&StockRecord::from_ranked(stock, now))
            .await?;
        self.store.delete_stock_children(ticker).await?;

        let mut price_rows: u64 = 0;
        for chunk in stock.stock.history.chunks(self.batch_size) {
            price_rows += self.store.insert_price_history_batch(ticker, chunk).await?;
        }

        let mut prediction_rows: u64 = 0;
        if let Some(projection) = &stock.stock.projection {
            for chunk in projection.series.points.chunks(self.batch_size) {
                prediction_rows += self
                    .store
                    .insert_predictions_batch(ticker, chunk, now)
                    .await?;
            }
        }

        Ok((price_rows, prediction_rows))
    }
}
