use crate::domain::prediction::{PricePoint, Projection};
use crate::domain::sentiment::TickerSentiment;
use serde::{Deserialize, Serialize};

/// A ticker offered by the scraping collaborator as a candidate for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTicker {
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
}

/// Everything computed for one ticker during a run.
///
/// `projection` is `None` when the price history was missing or too short; such a
/// ticker still ranks on sentiment but never shows up among the shocking movers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedStock {
    pub sentiment: TickerSentiment,
    pub sector: Option<String>,
    pub history: Vec<PricePoint>,
    pub projection: Option<Projection>,
}

impl AnalyzedStock {
    pub fn ticker(&self) -> &str {
        &self.sentiment.ticker
    }

    pub fn investment_score(&self) -> f64 {
        self.sentiment.investment_score
    }

    pub fn current_price(&self) -> Option<f64> {
        self.projection
            .as_ref()
            .map(|p| p.current_price)
            .or_else(|| self.history.last().map(|p| p.close))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStock {
    pub rank: u32,
    pub stock: AnalyzedStock,
}

impl RankedStock {
    pub fn ticker(&self) -> &str {
        self.stock.ticker()
    }

    pub fn sentiment(&self) -> &TickerSentiment {
        &self.stock.sentiment
    }
}
