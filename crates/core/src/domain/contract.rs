use crate::domain::prediction::{PredictionPoint, ShockingPrediction, ShockingPredictions};
use crate::domain::sentiment::SentimentCategory;
use crate::domain::stock::{AnalyzedStock, RankedStock};
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const ANALYSIS_VERSION: &str = "2.0";

const PRICE_DP: u32 = 2;
const SCORE_DP: u32 = 2;
const PCT_DP: u32 = 2;
const SENTIMENT_DP: u32 = 4;

pub fn round_to(v: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (v * factor).round() / factor
}

/// The run-level document consumed by the API and report collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterDocument {
    pub stocks: Vec<MasterStockEntry>,
    pub shocking_predictions: ShockingPredictions,
    pub total_stocks: usize,
    pub last_updated: DateTime<Utc>,
    pub analysis_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterStockEntry {
    pub rank: u32,
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub investment_score: f64,
    pub sentiment_category: SentimentCategory,
    pub sentiment_score: f64,
    pub sentiment_strength: f64,
    pub news_count: u32,
    pub bullish_count: u32,
    pub neutral_count: u32,
    pub bearish_count: u32,
    #[serde(default)]
    pub current_price: Option<f64>,
}

impl MasterStockEntry {
    pub fn from_ranked(ranked: &RankedStock) -> Self {
        let s = ranked.sentiment();
        Self {
            rank: ranked.rank,
            ticker: s.ticker.clone(),
            name: s.name.clone(),
            sector: ranked
                .stock
                .sector
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            investment_score: round_to(s.investment_score, SCORE_DP),
            sentiment_category: s.category,
            sentiment_score: round_to(s.avg_sentiment, SENTIMENT_DP),
            sentiment_strength: round_to(s.sentiment_strength, SENTIMENT_DP),
            news_count: s.news_count,
            bullish_count: s.bullish_count,
            neutral_count: s.neutral_count,
            bearish_count: s.bearish_count,
            current_price: ranked.stock.current_price().map(|p| round_to(p, PRICE_DP)),
        }
    }
}

impl MasterDocument {
    pub fn build(
        ranked: &[RankedStock],
        shocking: &ShockingPredictions,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let stocks: Vec<MasterStockEntry> = ranked.iter().map(MasterStockEntry::from_ranked).collect();
        Self::from_entries(stocks, shocking, last_updated)
    }

    /// Assemble from entries that are already in rank order.
    pub fn from_entries(
        stocks: Vec<MasterStockEntry>,
        shocking: &ShockingPredictions,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            total_stocks: stocks.len(),
            stocks,
            shocking_predictions: round_shocking(shocking),
            last_updated,
            analysis_version: ANALYSIS_VERSION.to_string(),
        }
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        ensure!(
            self.total_stocks == self.stocks.len(),
            "total_stocks mismatch: declared {}, got {} entries",
            self.total_stocks,
            self.stocks.len()
        );

        let mut seen_ranks = BTreeSet::<u32>::new();
        let mut seen_tickers = BTreeSet::<String>::new();
        for entry in &self.stocks {
            ensure!(!entry.ticker.trim().is_empty(), "ticker must be non-empty");
            ensure!(
                seen_tickers.insert(entry.ticker.clone()),
                "duplicate ticker: {}",
                entry.ticker
            );
            ensure!(
                seen_ranks.insert(entry.rank),
                "duplicate rank: {}",
                entry.rank
            );
            ensure!(
                (0.0..=100.0).contains(&entry.investment_score),
                "investment_score out of range for {}: {}",
                entry.ticker,
                entry.investment_score
            );
        }

        // Ranks must be exactly 1..=N.
        for rank in 1..=self.stocks.len() as u32 {
            if !seen_ranks.contains(&rank) {
                bail!("missing rank {rank} in master document");
            }
        }

        let shocking = &self.shocking_predictions;
        ensure!(
            shocking
                .top_increases
                .iter()
                .all(|p| !shocking.top_decreases.iter().any(|d| d.ticker == p.ticker)),
            "a ticker appears among both top increases and top decreases"
        );

        Ok(self)
    }
}

pub fn parse_master_document(text: &str) -> anyhow::Result<MasterDocument> {
    let parsed = serde_json::from_str::<MasterDocument>(text)
        .context("master document is not valid JSON for the expected schema")?;
    parsed.validate()
}

pub fn round_shocking(shocking: &ShockingPredictions) -> ShockingPredictions {
    let round_all = |list: &[ShockingPrediction]| -> Vec<ShockingPrediction> {
        list.iter()
            .map(|p| ShockingPrediction {
                abs_change_pct: round_to(p.abs_change_pct, PCT_DP),
                current_price: round_to(p.current_price, PRICE_DP),
                predicted_price: round_to(p.predicted_price, PRICE_DP),
                sentiment_score: round_to(p.sentiment_score, SENTIMENT_DP),
                investment_score: round_to(p.investment_score, SCORE_DP),
                ..p.clone()
            })
            .collect()
    };

    ShockingPredictions {
        top_increases: round_all(&shocking.top_increases),
        top_decreases: round_all(&shocking.top_decreases),
        all_shocking: round_all(&shocking.all_shocking),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedPrice {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub score: f64,
    pub category: SentimentCategory,
    pub investment_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionDocument {
    pub data: Vec<DatedPrice>,
    pub upper_bound: Vec<DatedPrice>,
    pub lower_bound: Vec<DatedPrice>,
}

impl PredictionDocument {
    pub fn from_points(points: &[PredictionPoint]) -> Self {
        let map = |f: fn(&PredictionPoint) -> f64| -> Vec<DatedPrice> {
            points
                .iter()
                .map(|p| DatedPrice {
                    date: p.date,
                    price: round_to(f(p), PRICE_DP),
                })
                .collect()
        };

        Self {
            data: map(|p: &PredictionPoint| p.predicted_price),
            upper_bound: map(|p: &PredictionPoint| p.upper_bound),
            lower_bound: map(|p: &PredictionPoint| p.lower_bound),
        }
    }
}

/// Per-ticker detail document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDocument {
    pub ticker: String,
    pub name: String,
    pub sentiment: SentimentSummary,
    pub historical_data: Vec<DatedPrice>,
    pub prediction: PredictionDocument,
    pub last_updated: DateTime<Utc>,
}

impl StockDocument {
    pub fn build(stock: &AnalyzedStock, last_updated: DateTime<Utc>) -> Self {
        let s = &stock.sentiment;
        Self {
            ticker: s.ticker.clone(),
            name: s.name.clone(),
            sentiment: SentimentSummary {
                score: round_to(s.avg_sentiment, SENTIMENT_DP),
                category: s.category,
                investment_score: round_to(s.investment_score, SCORE_DP),
            },
            historical_data: stock
                .history
                .iter()
                .map(|p| DatedPrice {
                    date: p.date,
                    price: round_to(p.close, PRICE_DP),
                })
                .collect(),
            prediction: stock
                .projection
                .as_ref()
                .map(|p| PredictionDocument::from_points(&p.series.points))
                .unwrap_or_default(),
            last_updated,
        }
    }
}
