pub mod lock;
pub mod reconcile;
pub mod runs;
pub mod stocks;

use crate::domain::contract::{round_to, MasterStockEntry};
use crate::domain::prediction::{
    Direction, PredictionPoint, PredictionSeries, PricePoint, Projection, ShockingPredictions,
};
use crate::domain::sentiment::{SentimentCategory, TickerSentiment};
use crate::domain::stock::{AnalyzedStock, RankedStock};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

pub use reconcile::{PersistenceReconciler, ReconcileReport};
pub use stocks::PgStockStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// The storage operations the reconciler needs.
#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    async fn list_tickers(&self) -> anyhow::Result<BTreeSet<String>>;

    async fn upsert_stock(&self, record: &StockRecord) -> anyhow::Result<()>;

    /// Remove price history and predictions for `ticker`, keeping the stock row.
    async fn delete_stock_children(&self, ticker: &str) -> anyhow::Result<()>;

    async fn delete_stock(&self, ticker: &str) -> anyhow::Result<()>;

    async fn insert_price_history_batch(
        &self,
        ticker: &str,
        rows: &[PricePoint],
    ) -> anyhow::Result<u64>;

    async fn insert_predictions_batch(
        &self,
        ticker: &str,
        rows: &[PredictionPoint],
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    /// Replace the stored movers with `shocking` as a whole.
    async fn replace_shocking_predictions(
        &self,
        shocking: &ShockingPredictions,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

/// Master-document entries from stored rows, renumbered `1..=N` in stored rank order.
///
/// A run whose upsert or stale delete failed leaves gaps or repeated ranks behind.
/// Repeated ranks go to the most recently written row first.
pub fn master_entries(records: &[StockRecord]) -> anyhow::Result<Vec<MasterStockEntry>> {
    let mut ordered: Vec<&StockRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| b.updated_at.cmp(&a.updated_at))
            .then_with(|| a.ticker.cmp(&b.ticker))
    });

    let mut renumbered = 0usize;
    let entries = ordered
        .into_iter()
        .enumerate()
        .map(|(idx, record)| {
            let mut entry = record.master_entry()?;
            let rank = idx as u32 + 1;
            if entry.rank != rank {
                renumbered += 1;
                entry.rank = rank;
            }
            Ok(entry)
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if renumbered > 0 {
        tracing::warn!(renumbered, "stored ranks not dense; renumbered for reading");
    }
    Ok(entries)
}

/// One row of the `stocks` table.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StockRecord {
    pub ticker: String,
    pub name: String,
    pub sector: Option<String>,
    pub rank: i32,
    pub investment_score: f64,
    pub sentiment_score: f64,
    pub sentiment_category: String,
    pub sentiment_strength: f64,
    pub news_count: i32,
    pub bullish_count: i32,
    pub neutral_count: i32,
    pub bearish_count: i32,
    pub current_price: Option<f64>,
    pub predicted_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn from_ranked(ranked: &RankedStock, updated_at: DateTime<Utc>) -> Self {
        let s = ranked.sentiment();
        let projection = ranked.stock.projection.as_ref();
        Self {
            ticker: s.ticker.clone(),
            name: s.name.clone(),
            sector: ranked.stock.sector.clone(),
            rank: ranked.rank as i32,
            investment_score: round_to(s.investment_score, 2),
            sentiment_score: round_to(s.avg_sentiment, 4),
            sentiment_category: s.category.as_str().to_string(),
            sentiment_strength: round_to(s.sentiment_strength, 4),
            news_count: s.news_count as i32,
            bullish_count: s.bullish_count as i32,
            neutral_count: s.neutral_count as i32,
            bearish_count: s.bearish_count as i32,
            current_price: ranked.stock.current_price().map(|p| round_to(p, 2)),
            predicted_price: projection.map(|p| round_to(p.predicted_price, 2)),
            price_change_pct: projection.map(|p| round_to(p.price_change_pct, 2)),
            updated_at,
        }
    }

    /// Master-document entry straight from the row, without loading child rows.
    pub fn master_entry(&self) -> anyhow::Result<MasterStockEntry> {
        Ok(MasterStockEntry {
            rank: u32::try_from(self.rank)
                .with_context(|| format!("invalid rank {} for {}", self.rank, self.ticker))?,
            ticker: self.ticker.clone(),
            name: self.name.clone(),
            sector: self.sector.clone().unwrap_or_else(|| "Unknown".to_string()),
            investment_score: self.investment_score,
            sentiment_category: self.category()?,
            sentiment_score: self.sentiment_score,
            sentiment_strength: self.sentiment_strength,
            news_count: self.news_count.max(0) as u32,
            bullish_count: self.bullish_count.max(0) as u32,
            neutral_count: self.neutral_count.max(0) as u32,
            bearish_count: self.bearish_count.max(0) as u32,
            current_price: self.current_price,
        })
    }

    fn category(&self) -> anyhow::Result<SentimentCategory> {
        SentimentCategory::parse(&self.sentiment_category).with_context(|| {
            format!(
                "unknown sentiment_category {:?} for {}",
                self.sentiment_category, self.ticker
            )
        })
    }

    /// Rebuild the in-memory shape from a stored row and its child rows.
    pub fn into_ranked(
        self,
        history: Vec<PricePoint>,
        points: Vec<PredictionPoint>,
    ) -> anyhow::Result<RankedStock> {
        let category = self.category()?;
        anyhow::ensure!(self.rank >= 1, "invalid rank {} for {}", self.rank, self.ticker);

        let projection = match (self.current_price, self.predicted_price, self.price_change_pct) {
            (Some(current_price), Some(predicted_price), Some(price_change_pct))
                if !points.is_empty() =>
            {
                Some(Projection {
                    series: PredictionSeries {
                        ticker: self.ticker.clone(),
                        points,
                    },
                    current_price,
                    predicted_price,
                    price_change_pct,
                    direction: Direction::from_change_pct(price_change_pct),
                })
            }
            _ => None,
        };

        Ok(RankedStock {
            rank: self.rank as u32,
            stock: AnalyzedStock {
                sentiment: TickerSentiment {
                    ticker: self.ticker,
                    name: self.name,
                    avg_sentiment: self.sentiment_score,
                    category,
                    bullish_count: self.bullish_count.max(0) as u32,
                    neutral_count: self.neutral_count.max(0) as u32,
                    bearish_count: self.bearish_count.max(0) as u32,
                    news_count: self.news_count.max(0) as u32,
                    sentiment_strength: self.sentiment_strength,
                    investment_score: self.investment_score,
                },
                sector: self.sector,
                history,
                projection,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::MasterDocument;
    use chrono::{NaiveDate, TimeZone};

    fn ranked() -> RankedStock {
        let mut sentiment = TickerSentiment::neutral_default("AAPL", "Apple Inc.");
        sentiment.avg_sentiment = 0.123456;
        sentiment.sentiment_strength = 0.123456;
        sentiment.category = SentimentCategory::Bullish;
        sentiment.investment_score = 57.716;
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        RankedStock {
            rank: 3,
            stock: AnalyzedStock {
                sentiment,
                sector: Some("Technology".to_string()),
                history: vec![PricePoint { date, close: 231.456 }],
                projection: Some(Projection {
                    series: PredictionSeries {
                        ticker: "AAPL".to_string(),
                        points: vec![PredictionPoint {
                            date,
                            predicted_price: 231.456,
                            upper_bound: 240.0,
                            lower_bound: 220.0,
                        }],
                    },
                    current_price: 231.456,
                    predicted_price: 250.004,
                    price_change_pct: 8.016,
                    direction: Direction::Increase,
                }),
            },
        }
    }

    #[test]
    fn record_rounds_to_declared_precision() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let rec = StockRecord::from_ranked(&ranked(), now);
        assert_eq!(rec.rank, 3);
        assert_eq!(rec.investment_score, 57.72);
        assert_eq!(rec.sentiment_score, 0.1235);
        assert_eq!(rec.sentiment_category, "Bullish");
        assert_eq!(rec.current_price, Some(231.46));
        assert_eq!(rec.predicted_price, Some(250.0));
        assert_eq!(rec.price_change_pct, Some(8.02));
    }

    #[test]
    fn record_rebuilds_ranked_stock() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let original = ranked();
        let rec = StockRecord::from_ranked(&original, now);
        let rebuilt = rec
            .into_ranked(
                original.stock.history.clone(),
                original.stock.projection.as_ref().unwrap().series.points.clone(),
            )
            .unwrap();

        assert_eq!(rebuilt.rank, 3);
        assert_eq!(rebuilt.ticker(), "AAPL");
        assert_eq!(rebuilt.sentiment().category, SentimentCategory::Bullish);
        assert_eq!(rebuilt.sentiment().investment_score, 57.72);
        let projection = rebuilt.stock.projection.unwrap();
        assert_eq!(projection.direction, Direction::Increase);
        assert_eq!(projection.series.points.len(), 1);
    }

    #[test]
    fn record_without_predictions_has_no_projection() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let rec = StockRecord::from_ranked(&ranked(), now);
        let rebuilt = rec.into_ranked(Vec::new(), Vec::new()).unwrap();
        assert!(rebuilt.stock.projection.is_none());
        assert_eq!(rebuilt.stock.current_price(), None);
    }

    #[test]
    fn master_entry_keeps_stored_price() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let entry = StockRecord::from_ranked(&ranked(), now).master_entry().unwrap();
        assert_eq!(entry.rank, 3);
        assert_eq!(entry.sector, "Technology");
        assert_eq!(entry.current_price, Some(231.46));
        assert_eq!(entry.sentiment_category, SentimentCategory::Bullish);
    }

    fn stored(ticker: &str, rank: i32, updated_at: DateTime<Utc>) -> StockRecord {
        let mut rec = StockRecord::from_ranked(&ranked(), updated_at);
        rec.ticker = ticker.to_string();
        rec.rank = rank;
        rec
    }

    fn validated(records: &[StockRecord]) -> anyhow::Result<MasterDocument> {
        let last_updated = records.iter().map(|r| r.updated_at).max().unwrap();
        MasterDocument::from_entries(
            master_entries(records)?,
            &ShockingPredictions::default(),
            last_updated,
        )
        .validate()
    }

    #[test]
    fn gap_left_by_failed_upsert_is_closed_on_read() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let records = vec![stored("AAA", 1, now), stored("CCC", 3, now)];

        let doc = validated(&records).unwrap();

        let ranks: Vec<(u32, &str)> = doc.stocks.iter().map(|e| (e.rank, e.ticker.as_str())).collect();
        assert_eq!(ranks, vec![(1, "AAA"), (2, "CCC")]);
    }

    #[test]
    fn duplicate_left_by_failed_stale_delete_is_renumbered_on_read() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2026, 10, 18, 21, 0, 0).unwrap();
        let records = vec![
            stored("TOP", 1, now),
            stored("OLD", 2, yesterday),
            stored("NEW", 2, now),
        ];

        let doc = validated(&records).unwrap();

        let ranks: Vec<(u32, &str)> = doc.stocks.iter().map(|e| (e.rank, e.ticker.as_str())).collect();
        assert_eq!(ranks, vec![(1, "TOP"), (2, "NEW"), (3, "OLD")]);
    }

    #[test]
    fn dense_ranks_are_read_unchanged() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let records = vec![stored("BBB", 2, now), stored("AAA", 1, now)];
        let entries = master_entries(&records).unwrap();
        assert_eq!(entries[0].ticker, "AAA");
        assert_eq!(entries[1].rank, 2);
    }

    #[test]
    fn unknown_category_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 21, 0, 0).unwrap();
        let mut rec = StockRecord::from_ranked(&ranked(), now);
        rec.sentiment_category = "Sideways".to_string();
        assert!(rec.into_ranked(Vec::new(), Vec::new()).is_err());
    }
}
