use crate::domain::prediction::{
    Direction, PredictionPoint, PricePoint, ShockingPrediction, ShockingPredictions, Timeframe,
};
use crate::ranking::distinct_movers;
use crate::storage::{StockRecord, StockStore};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: sqlx::PgPool,
}

impl PgStockStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// All stock rows, best rank first.
    pub async fn load_stocks(&self) -> anyhow::Result<Vec<StockRecord>> {
        sqlx::query_as::<_, StockRecord>(&format!("{STOCK_SELECT} ORDER BY rank ASC, ticker ASC"))
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .context("select stocks failed")
    }

    pub async fn load_stock(&self, ticker: &str) -> anyhow::Result<Option<StockRecord>> {
        sqlx::query_as::<_, StockRecord>(&format!("{STOCK_SELECT} WHERE ticker = $1"))
            .persistent(false)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("select stock {ticker} failed"))
    }

    pub async fn load_price_history(&self, ticker: &str) -> anyhow::Result<Vec<PricePoint>> {
        let rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
            "SELECT date, price FROM price_history WHERE ticker = $1 ORDER BY date ASC",
        )
        .persistent(false)
        .bind(ticker)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select price_history for {ticker} failed"))?;

        Ok(rows
            .into_iter()
            .map(|(date, close)| PricePoint { date, close })
            .collect())
    }

    pub async fn load_predictions(&self, ticker: &str) -> anyhow::Result<Vec<PredictionPoint>> {
        let rows: Vec<(NaiveDate, f64, f64, f64)> = sqlx::query_as(
            "SELECT prediction_date, predicted_price, upper_bound, lower_bound \
             FROM predictions WHERE ticker = $1 ORDER BY prediction_date ASC",
        )
        .persistent(false)
        .bind(ticker)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("select predictions for {ticker} failed"))?;

        Ok(rows
            .into_iter()
            .map(|(date, predicted_price, upper_bound, lower_bound)| PredictionPoint {
                date,
                predicted_price,
                upper_bound,
                lower_bound,
            })
            .collect())
    }

    /// Stored movers, largest magnitude first, plus when they were generated.
    pub async fn load_shocking_movers(
        &self,
    ) -> anyhow::Result<(Vec<ShockingPrediction>, Option<DateTime<Utc>>)> {
        let rows: Vec<ShockingRow> = sqlx::query_as(
            "SELECT ticker, name, abs_change_pct, direction, timeframe, current_price, \
                    predicted_price, sentiment_score, investment_score, generated_at \
             FROM shocking_predictions ORDER BY abs_change_pct DESC, id ASC",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select shocking_predictions failed")?;

        let generated_at = rows.iter().map(|r| r.generated_at).max();
        let movers = rows
            .into_iter()
            .map(ShockingRow::into_prediction)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok((movers, generated_at))
    }
}

const STOCK_SELECT: &str = "SELECT ticker, name, sector, rank, investment_score, sentiment_score, \
     sentiment_category, sentiment_strength, news_count, bullish_count, neutral_count, \
     bearish_count, current_price, predicted_price, price_change_pct, updated_at FROM stocks";

#[derive(Debug, sqlx::FromRow)]
struct ShockingRow {
    ticker: String,
    name: String,
    abs_change_pct: f64,
    direction: String,
    timeframe: String,
    current_price: f64,
    predicted_price: f64,
    sentiment_score: f64,
    investment_score: f64,
    generated_at: DateTime<Utc>,
}

impl ShockingRow {
    fn into_prediction(self) -> anyhow::Result<ShockingPrediction> {
        let direction = match self.direction.as_str() {
            "increase" => Direction::Increase,
            "decrease" => Direction::Decrease,
            other => anyhow::bail!("unknown direction {other:?} for {}", self.ticker),
        };
        let timeframe = match self.timeframe.as_str() {
            "7 days" => Timeframe::SevenDays,
            "14 days" => Timeframe::FourteenDays,
            "30 days" => Timeframe::ThirtyDays,
            other => anyhow::bail!("unknown timeframe {other:?} for {}", self.ticker),
        };
        Ok(ShockingPrediction {
            ticker: self.ticker,
            name: self.name,
            abs_change_pct: self.abs_change_pct,
            direction,
            timeframe,
            current_price: self.current_price,
            predicted_price: self.predicted_price,
            sentiment_score: self.sentiment_score,
            investment_score: self.investment_score,
        })
    }
}

#[async_trait::async_trait]
impl StockStore for PgStockStore {
    async fn list_tickers(&self) -> anyhow::Result<BTreeSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT ticker FROM stocks")
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .context("select stock tickers failed")?;
        Ok(rows.into_iter().map(|(t,)| t).collect())
    }

    async fn upsert_stock(&self, r: &StockRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO stocks (ticker, name, sector, rank, investment_score, sentiment_score, \
                sentiment_category, sentiment_strength, news_count, bullish_count, neutral_count, \
                bearish_count, current_price, predicted_price, price_change_pct, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             ON CONFLICT (ticker) DO UPDATE SET \
                name = EXCLUDED.name, sector = EXCLUDED.sector, rank = EXCLUDED.rank, \
                investment_score = EXCLUDED.investment_score, \
                sentiment_score = EXCLUDED.sentiment_score, \
                sentiment_category = EXCLUDED.sentiment_category, \
                sentiment_strength = EXCLUDED.sentiment_strength, \
                news_count = EXCLUDED.news_count, bullish_count = EXCLUDED.bullish_count, \
                neutral_count = EXCLUDED.neutral_count, bearish_count = EXCLUDED.bearish_count, \
                current_price = EXCLUDED.current_price, predicted_price = EXCLUDED.predicted_price, \
                price_change_pct = EXCLUDED.price_change_pct, updated_at = EXCLUDED.updated_at",
        )
        .persistent(false)
        .bind(&r.ticker)
        .bind(&r.name)
        .bind(&r.sector)
        .bind(r.rank)
        .bind(r.investment_score)
        .bind(r.sentiment_score)
        .bind(&r.sentiment_category)
        .bind(r.sentiment_strength)
        .bind(r.news_count)
        .bind(r.bullish_count)
        .bind(r.neutral_count)
        .bind(r.bearish_count)
        .bind(r.current_price)
        .bind(r.predicted_price)
        .bind(r.price_change_pct)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert stocks {} failed", r.ticker))?;
        Ok(())
    }

    async fn delete_stock_children(&self, ticker: &str) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        sqlx::query("DELETE FROM price_history WHERE ticker = $1")
            .persistent(false)
            .bind(ticker)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("delete price_history for {ticker} failed"))?;
        sqlx::query("DELETE FROM predictions WHERE ticker = $1")
            .persistent(false)
            .bind(ticker)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("delete predictions for {ticker} failed"))?;

        tx.commit().await.context("commit transaction failed")?;
        Ok(())
    }

    async fn delete_stock(&self, ticker: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM stocks WHERE ticker = $1")
            .persistent(false)
            .bind(ticker)
            .execute(&self.pool)
            .await
            .with_context(|| format!("delete stocks {ticker} failed"))?;
        Ok(())
    }

    async fn insert_price_history_batch(
        &self,
        ticker: &str,
        rows: &[PricePoint],
    ) -> anyhow::Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new("INSERT INTO price_history (ticker, date, price) ");
        qb.push_values(rows, |mut b, row| {
            b.push_bind(ticker).push_bind(row.date).push_bind(row.close);
        });
        qb.push(" ON CONFLICT (ticker, date) DO UPDATE SET price = EXCLUDED.price");

        let res = qb
            .build()
            .persistent(false)
            .execute(&self.pool)
            .await
            .with_context(|| format!("batch insert price_history for {ticker} failed"))?;

        tracing::debug!(
            ticker,
            batch_size = rows.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "price_history batch insert"
        );
        Ok(res.rows_affected())
    }

    async fn insert_predictions_batch(
        &self,
        ticker: &str,
        rows: &[PredictionPoint],
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "INSERT INTO predictions (ticker, prediction_date, predicted_price, upper_bound, lower_bound, generated_at) ",
        );
        qb.push_values(rows, |mut b, row| {
            b.push_bind(ticker)
                .push_bind(row.date)
                .push_bind(row.predicted_price)
                .push_bind(row.upper_bound)
                .push_bind(row.lower_bound)
                .push_bind(generated_at);
        });
        qb.push(
            " ON CONFLICT (ticker, prediction_date) DO UPDATE \
               SET predicted_price = EXCLUDED.predicted_price, upper_bound = EXCLUDED.upper_bound, \
                   lower_bound = EXCLUDED.lower_bound, generated_at = EXCLUDED.generated_at",
        );

        let res = qb
            .build()
            .persistent(false)
            .execute(&self.pool)
            .await
            .with_context(|| format!("batch insert predictions for {ticker} failed"))?;

        tracing::debug!(
            ticker,
            batch_size = rows.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "predictions batch insert"
        );
        Ok(res.rows_affected())
    }

    async fn replace_shocking_predictions(
        &self,
        shocking: &ShockingPredictions,
        generated_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let movers = distinct_movers(shocking);
        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        sqlx::query("DELETE FROM shocking_predictions")
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("clear shocking_predictions failed")?;

        if !movers.is_empty() {
            let mut qb = sqlx::QueryBuilder::<sqlx::Postgres>::new(
                "INSERT INTO shocking_predictions (ticker, name, abs_change_pct, direction, timeframe, \
                 current_price, predicted_price, sentiment_score, investment_score, generated_at) ",
            );
            qb.push_values(&movers, |mut b, m| {
                b.push_bind(&m.ticker)
                    .push_bind(&m.name)
                    .push_bind(m.abs_change_pct)
                    .push_bind(m.direction.as_str())
                    .push_bind(m.timeframe.as_str())
                    .push_bind(m.current_price)
                    .push_bind(m.predicted_price)
                    .push_bind(m.sentiment_score)
                    .push_bind(m.investment_score)
                    .push_bind(generated_at);
            });
            qb.build()
                .persistent(false)
                .execute(&mut *tx)
                .await
                .context("insert shocking_predictions failed")?;
        }

        tx.commit().await.context("commit transaction failed")?;
        Ok(())
    }
}
