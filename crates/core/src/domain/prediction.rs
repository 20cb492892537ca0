use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    pub predicted_price: f64,
    pub upper_bound: f64,
    pub lower_bound: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSeries {
    pub ticker: String,
    pub points: Vec<PredictionPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn from_change_pct(pct: f64) -> Self {
        if pct > 0.0 {
            Self::Increase
        } else {
            Self::Decrease
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increase => "increase",
            Self::Decrease => "decrease",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "7 days")]
    SevenDays,
    #[serde(rename = "14 days")]
    FourteenDays,
    #[serde(rename = "30 days")]
    ThirtyDays,
}

impl Timeframe {
    /// Bigger projected moves are presented over a longer window.
    pub fn from_abs_change_pct(abs_change_pct: f64) -> Self {
        let v = abs_change_pct.abs();
        if v > 20.0 {
            Self::ThirtyDays
        } else if v > 10.0 {
            Self::FourteenDays
        } else {
            Self::SevenDays
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SevenDays => "7 days",
            Self::FourteenDays => "14 days",
            Self::ThirtyDays => "30 days",
        }
    }
}

/// Forward price path plus its summary metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub series: PredictionSeries,
    pub current_price: f64,
    pub predicted_price: f64,
    pub price_change_pct: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShockingPrediction {
    pub ticker: String,
    pub name: String,
    pub abs_change_pct: f64,
    pub direction: Direction,
    pub timeframe: Timeframe,
    pub current_price: f64,
    pub predicted_price: f64,
    pub sentiment_score: f64,
    pub investment_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShockingPredictions {
    pub top_increases: Vec<ShockingPrediction>,
    pub top_decreases: Vec<ShockingPrediction>,
    pub all_shocking: Vec<ShockingPrediction>,
}
