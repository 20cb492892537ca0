use serde::{Deserialize, Serialize};

/// Compound scores at or above this are bullish.
pub const BULLISH_THRESHOLD: f64 = 0.05;
/// Compound scores at or below this are bearish.
pub const BEARISH_THRESHOLD: f64 = -0.05;

/// One scraped headline row, as handed over by the scraping collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNewsItem {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    pub headline: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentCategory {
    Bullish,
    Neutral,
    Bearish,
}

impl SentimentCategory {
    pub fn from_compound(score: f64) -> Self {
        if score >= BULLISH_THRESHOLD {
            Self::Bullish
        } else if score <= BEARISH_THRESHOLD {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Bearish => "Bearish",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Bullish" => Some(Self::Bullish),
            "Neutral" => Some(Self::Neutral),
            "Bearish" => Some(Self::Bearish),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSentiment {
    pub ticker: String,
    pub name: String,
    pub avg_sentiment: f64,
    pub category: SentimentCategory,
    pub bullish_count: u32,
    pub neutral_count: u32,
    pub bearish_count: u32,
    pub news_count: u32,
    pub sentiment_strength: f64,
    pub investment_score: f64,
}

impl TickerSentiment {
    /// Result used when no headline could be obtained for a ticker.
    ///
    /// `neutral_count` is 1 so downstream ratio displays never divide by zero.
    pub fn neutral_default(ticker: &str, name: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            avg_sentiment: 0.0,
            category: SentimentCategory::Neutral,
            bullish_count: 0,
            neutral_count: 1,
            bearish_count: 0,
            news_count: 0,
            sentiment_strength: 0.0,
            investment_score: 50.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_on_inclusive_thresholds() {
        assert_eq!(SentimentCategory::from_compound(0.05), SentimentCategory::Bullish);
        assert_eq!(SentimentCategory::from_compound(-0.05), SentimentCategory::Bearish);
        assert_eq!(SentimentCategory::from_compound(0.0499), SentimentCategory::Neutral);
        assert_eq!(SentimentCategory::from_compound(-0.0499), SentimentCategory::Neutral);
        assert_eq!(SentimentCategory::from_compound(1.0), SentimentCategory::Bullish);
    }

    #[test]
    fn category_round_trips_through_str() {
        for c in [
            SentimentCategory::Bullish,
            SentimentCategory::Neutral,
            SentimentCategory::Bearish,
        ] {
            assert_eq!(SentimentCategory::parse(c.as_str()), Some(c));
        }
        assert_eq!(SentimentCategory::parse("Sideways"), None);
    }

    #[test]
    fn raw_news_item_tolerates_missing_date_fields() {
        let v = serde_json::json!({"headline": "Apple beats estimates"});
        let item: RawNewsItem = serde_json::from_value(v).unwrap();
        assert!(item.date.is_empty());
        assert!(item.time.is_empty());
        assert!(item.source.is_empty());
    }
}
