use crate::domain::prediction::PricePoint;
use crate::domain::sentiment::RawNewsItem;
use crate::domain::stock::CandidateTicker;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatesResponse {
    pub items: Vec<CandidateTicker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsResponse {
    pub ticker: String,
    #[serde(default)]
    pub items: Vec<RawNewsItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesResponse {
    pub ticker: String,
    #[serde(default)]
    pub items: Vec<PriceRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

impl PricesResponse {
    /// Chronological closes, skipping rows without a usable positive close.
    pub fn into_price_points(self) -> Vec<PricePoint> {
        let mut out: Vec<PricePoint> = self
            .items
            .into_iter()
            .filter_map(|row| {
                let close = row.close.filter(|c| c.is_finite() && *c > 0.0)?;
                Some(PricePoint {
                    date: row.date,
                    close,
                })
            })
            .collect();
        out.sort_by_key(|p| p.date);
        out.dedup_by_key(|p| p.date);
        out
    }
}
