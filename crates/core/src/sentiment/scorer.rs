use crate::sentiment::lexicon::Lexicon;
use serde::{Deserialize, Serialize};
use vader_sentiment::SentimentIntensityAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarityScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    /// Normalized polarity in [-1, 1].
    pub compound: f64,
}

impl PolarityScores {
    fn neutral() -> Self {
        Self {
            neg: 0.0,
            neu: 1.0,
            pos: 0.0,
            compound: 0.0,
        }
    }
}

/// Headline polarity scorer over a fixed lexicon. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct SentimentScorer {
    lexicon: Lexicon,
}

impl SentimentScorer {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn finance() -> Self {
        Self::new(Lexicon::finance())
    }

    pub fn score(&self, headline: &str) -> PolarityScores {
        if headline.trim().is_empty() {
            return PolarityScores::neutral();
        }

        let analyzer = SentimentIntensityAnalyzer::from_lexicon(self.lexicon.words());
        let scores = analyzer.polarity_scores(headline);
        let get = |key: &str| {
            scores
                .get(key)
                .copied()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };

        PolarityScores {
            neg: get("neg"),
            neu: get("neu"),
            pos: get("pos"),
            compound: get("compound").clamp(-1.0, 1.0),
        }
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::finance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_headline_is_neutral() {
        let scorer = SentimentScorer::finance();
        assert_eq!(scorer.score("").compound, 0.0);
        assert_eq!(scorer.score("   ").neu, 1.0);
    }

    #[test]
    fn finance_terms_drive_polarity() {
        let scorer = SentimentScorer::finance();

        let bullish = [
            "Analysts turn bullish as Apple earnings beat estimates",
            "Nvidia shares surge after strong guidance",
            "Broker issues upgrade, says buy the dip",
        ];
        for h in bullish {
            let s = scorer.score(h);
            assert!(s.compound >= 0.05, "expected bullish score for '{h}', got {}", s.compound);
        }

        let bearish = [
            "Tesla shares plunge after delivery miss",
            "Analyst downgrade sends stock into decline",
            "Bearish outlook as quarterly loss widens",
        ];
        for h in bearish {
            let s = scorer.score(h);
            assert!(s.compound <= -0.05, "expected bearish score for '{h}', got {}", s.compound);
        }
    }

    #[test]
    fn overrides_shift_scores_relative_to_general_lexicon() {
        let general = SentimentScorer::new(Lexicon::general());
        let finance = SentimentScorer::finance();
        let h = "Morgan Stanley upgrade to outperform";
        assert!(finance.score(h).compound > general.score(h).compound);
    }

    #[test]
    fn bullish_override_moves_compound_score() {
        let general = SentimentScorer::new(Lexicon::general());
        let finance = SentimentScorer::finance();
        let h = "Analysts are bullish on the chipmaker";
        let tuned = finance.score(h).compound;
        assert!(tuned >= 0.05, "got {tuned}");
        assert!(tuned > general.score(h).compound);
        assert_eq!(finance.score("BULLISH").compound, finance.score("bullish").compound);
    }

    #[test]
    fn scores_are_bounded_and_deterministic() {
        let scorer = SentimentScorer::finance();
        let h = "bullish bullish bullish rally surge beat breakthrough profit growth";
        let a = scorer.score(h);
        let b = scorer.score(h);
        assert_eq!(a, b);
        assert!((-1.0..=1.0).contains(&a.compound));
        assert!(a.pos > a.neg);
    }
}
