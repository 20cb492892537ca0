use crate::domain::sentiment::{RawNewsItem, SentimentCategory, TickerSentiment};
use crate::ingest::provider::NewsSource;
use crate::scoring::investment_score;
use crate::sentiment::dates::{parse_news_date, DateOrigin};
use crate::sentiment::scorer::SentimentScorer;
use chrono::{Days, NaiveDate};
use std::time::Duration;

/// What one source returned on one attempt.
#[derive(Debug)]
pub enum SourceOutcome {
    Rows(Vec<RawNewsItem>),
    Empty,
    Failed(String),
}

impl SourceOutcome {
    async fn poll(source: &dyn NewsSource, ticker: &str) -> Self {
        match source.fetch_news(ticker).await {
            Ok(rows) if rows.is_empty() => Self::Empty,
            Ok(rows) => Self::Rows(rows),
            Err(err) => Self::Failed(format!("{err:#}")),
        }
    }
}

/// Retry while no source has produced a single row.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Merged headline rows for one ticker plus how many attempts it took.
#[derive(Debug, Default)]
pub struct NewsCollection {
    pub rows: Vec<RawNewsItem>,
    pub attempts: u32,
    pub failed_sources: usize,
}

#[derive(Debug, Clone, Copy)]
struct ScoredRow {
    date: NaiveDate,
    compound: f64,
    category: SentimentCategory,
}

pub struct SentimentAggregator {
    scorer: SentimentScorer,
    sources: Vec<Box<dyn NewsSource>>,
    retry: RetryPolicy,
    days_back: i64,
}

impl SentimentAggregator {
    pub fn new(
        scorer: SentimentScorer,
        sources: Vec<Box<dyn NewsSource>>,
        retry: RetryPolicy,
        days_back: i64,
    ) -> Self {
        if sources.len() < 2 {
            tracing::warn!(sources = sources.len(), "fewer than two news sources configured");
        }
        Self {
            scorer,
            sources,
            retry,
            days_back: days_back.max(0),
        }
    }

    /// Full per-ticker pass: collect, score, filter, aggregate. Never fails.
    pub async fn analyze_ticker(&self, ticker: &str, name: &str, today: NaiveDate) -> TickerSentiment {
        let collected = self.collect_news(ticker).await;
        if collected.rows.is_empty() {
            tracing::info!(
                ticker,
                attempts = collected.attempts,
                failed_sources = collected.failed_sources,
                "no news found; using neutral sentiment"
            );
            return TickerSentiment::neutral_default(ticker, name);
        }

        self.aggregate(ticker, name, &collected.rows, today)
    }

    /// Poll every source, retrying with a fixed backoff while the merged set is empty.
    ///
    /// Rows from different sources are concatenated as-is; the same headline seen on
    /// two sites counts twice.
    pub async fn collect_news(&self, ticker: &str) -> NewsCollection {
        let mut out = NewsCollection::default();
        let max_attempts = self.retry.max_attempts.max(1);

        while out.attempts < max_attempts && out.rows.is_empty() {
            if out.attempts > 0 {
                tracing::info!(
                    ticker,
                    attempt = out.attempts + 1,
                    max_attempts,
                    "retrying news fetch"
                );
                tokio::time::sleep(self.retry.backoff).await;
            }
            out.attempts += 1;

            for source in &self.sources {
                match SourceOutcome::poll(source.as_ref(), ticker).await {
                    SourceOutcome::Rows(rows) => {
                        tracing::debug!(ticker, source = source.source_name(), rows = rows.len(), "news rows");
                        out.rows.extend(rows);
                    }
                    SourceOutcome::Empty => {
                        tracing::debug!(ticker, source = source.source_name(), "news source returned nothing");
                    }
                    SourceOutcome::Failed(error) => {
                        out.failed_sources += 1;
                        tracing::warn!(ticker, source = source.source_name(), %error, "news source failed");
                    }
                }
            }
        }

        out
    }

    /// Aggregate already-collected rows. Pure apart from logging.
    pub fn aggregate(
        &self,
        ticker: &str,
        name: &str,
        rows: &[RawNewsItem],
        today: NaiveDate,
    ) -> TickerSentiment {
        if rows.is_empty() {
            return TickerSentiment::neutral_default(ticker, name);
        }

        let scored: Vec<ScoredRow> = rows
            .iter()
            .map(|row| {
                let parsed = parse_news_date(&row.date, today);
                if parsed.origin == DateOrigin::Fallback {
                    tracing::debug!(ticker, raw_date = %row.date, "unrecognized news date; using today");
                }
                let compound = self.scorer.score(&row.headline).compound;
                ScoredRow {
                    date: parsed.date,
                    compound,
                    category: SentimentCategory::from_compound(compound),
                }
            })
            .collect();

        let cutoff = today
            .checked_sub_days(Days::new(self.days_back as u64))
            .unwrap_or(NaiveDate::MIN);
        let recent: Vec<ScoredRow> = scored.iter().copied().filter(|r| r.date >= cutoff).collect();

        // Everything stale: use what we have rather than reporting no data.
        let used = if recent.is_empty() {
            tracing::debug!(ticker, rows = scored.len(), "no recent news; using all rows");
            scored
        } else {
            recent
        };

        let avg_sentiment = (used.iter().map(|r| r.compound).sum::<f64>() / used.len() as f64)
            .clamp(-1.0, 1.0);
        let sentiment_strength = avg_sentiment.abs();
        let count = |c: SentimentCategory| used.iter().filter(|r| r.category == c).count() as u32;

        TickerSentiment {
            ticker: ticker.to_string(),
            name: name.to_string(),
            avg_sentiment,
            category: SentimentCategory::from_compound(avg_sentiment),
            bullish_count: count(SentimentCategory::Bullish),
            neutral_count: count(SentimentCategory::Neutral),
            bearish_count: count(SentimentCategory::Bearish),
            news_count: used.len() as u32,
            sentiment_strength,
            investment_score: investment_score(avg_sentiment, sentiment_strength),
        }
    }
}
