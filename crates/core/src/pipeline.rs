//! One analysis run: sentiment, price history and projection per ticker, then ranking.
//!
//! Tickers are processed strictly one after another with a randomized pause between
//! them so the scraped sites are not hammered.

use crate::config::AnalysisOptions;
use crate::domain::prediction::{PricePoint, ShockingPredictions};
use crate::domain::stock::{AnalyzedStock, CandidateTicker, RankedStock};
use crate::ingest::provider::MarketDataProvider;
use crate::projection::PriceTrendProjector;
use crate::ranking::{rank_stocks, select_shocking};
use crate::sentiment::SentimentAggregator;
use chrono::NaiveDate;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Request pacing between tickers.
#[derive(Debug, Clone)]
pub struct Pacer {
    delay_min: Duration,
    delay_max: Duration,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl Pacer {
    pub fn new(delay_min: Duration, delay_max: Duration, chunk_size: usize, chunk_delay: Duration) -> Self {
        Self {
            delay_min,
            delay_max: delay_max.max(delay_min),
            chunk_size: chunk_size.max(1),
            chunk_delay,
        }
    }

    pub fn from_options(opts: &AnalysisOptions) -> Self {
        Self::new(
            opts.request_delay_min,
            opts.request_delay_max,
            opts.chunk_size,
            opts.chunk_delay,
        )
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, usize::MAX, Duration::ZERO)
    }

    /// Pause before processing the ticker at `index`.
    ///
    /// Nothing before the first ticker, the chunk delay at every chunk boundary and a
    /// uniform random delay otherwise.
    pub fn delay_before<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Duration {
        if index == 0 {
            return Duration::ZERO;
        }
        if index % self.chunk_size == 0 {
            return self.chunk_delay;
        }
        if self.delay_max <= self.delay_min {
            return self.delay_min;
        }
        let secs = rng.gen_range(self.delay_min.as_secs_f64()..=self.delay_max.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.delay_max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No candidate yielded any news or price data; nothing should be written.
    NothingAnalyzed { candidates: usize },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingAnalyzed { candidates } => {
                write!(f, "no ticker could be analyzed ({candidates} candidates)")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub ranked: Vec<RankedStock>,
    pub shocking: ShockingPredictions,
    pub candidates: usize,
    pub projected: usize,
    pub without_news: usize,
}

pub struct AnalysisPipeline<'a, R> {
    aggregator: SentimentAggregator,
    market: &'a dyn MarketDataProvider,
    projector: PriceTrendProjector,
    pacer: Pacer,
    price_history_days: u32,
    shocking_top_n: usize,
    rng: R,
}

impl<'a, R: Rng> AnalysisPipeline<'a, R> {
    pub fn new(
        aggregator: SentimentAggregator,
        market: &'a dyn MarketDataProvider,
        projector: PriceTrendProjector,
        pacer: Pacer,
        opts: &AnalysisOptions,
        rng: R,
    ) -> Self {
        Self {
            aggregator,
            market,
            projector,
            pacer,
            price_history_days: opts.price_history_days,
            shocking_top_n: opts.shocking_top_n,
            rng,
        }
    }

    pub async fn run(
        &mut self,
        candidates: &[CandidateTicker],
        today: NaiveDate,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut analyzed: Vec<AnalyzedStock> = Vec::with_capacity(candidates.len());
        let mut with_data: usize = 0;

        for (idx, candidate) in candidates.iter().enumerate() {
            let delay = self.pacer.delay_before(idx, &mut self.rng);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            tracing::info!(
                ticker = %candidate.ticker,
                progress = idx + 1,
                total = candidates.len(),
                "analyzing ticker"
            );
            let stock = self.analyze_one(candidate, today).await;
            if stock.sentiment.news_count > 0 || !stock.history.is_empty() {
                with_data += 1;
            }
            analyzed.push(stock);
        }

        if with_data == 0 {
            return Err(PipelineError::NothingAnalyzed {
                candidates: candidates.len(),
            });
        }

        let projected = analyzed.iter().filter(|s| s.projection.is_some()).count();
        let without_news = analyzed.iter().filter(|s| s.sentiment.news_count == 0).count();
        let shocking = select_shocking(&analyzed, self.shocking_top_n);
        let ranked = rank_stocks(analyzed);

        tracing::info!(
            ranked = ranked.len(),
            projected,
            without_news,
            increases = shocking.top_increases.len(),
            decreases = shocking.top_decreases.len(),
            "analysis complete"
        );

        Ok(PipelineOutput {
            ranked,
            shocking,
            candidates: candidates.len(),
            projected,
            without_news,
        })
    }

    async fn analyze_one(&mut self, candidate: &CandidateTicker, today: NaiveDate) -> AnalyzedStock {
        let ticker = candidate.ticker.as_str();
        let name = if candidate.name.trim().is_empty() {
            ticker
        } else {
            candidate.name.trim()
        };

        let sentiment = self.aggregator.analyze_ticker(ticker, name, today).await;
        let history = self.fetch_history(ticker).await;

        let projection = match self
            .projector
            .project(ticker, &history, sentiment.avg_sentiment, &mut self.rng)
        {
            Ok(p) => Some(p),
            Err(err) => {
                tracing::info!(ticker, error = %err, "skipping projection");
                None
            }
        };

        AnalyzedStock {
            sentiment,
            sector: candidate.sector.clone(),
            history,
            projection,
        }
    }

    async fn fetch_history(&self, ticker: &str) -> Vec<PricePoint> {
        match self
            .market
            .fetch_price_history(ticker, self.price_history_days)
            .await
        {
            Ok(points) => points,
            Err(err) => {
                tracing::warn!(ticker, error = %format!("{err:#}"), "price history unavailable");
                Vec::new()
            }
        }
    }
}
