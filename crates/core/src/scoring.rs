//! Investment score normalization.
//!
//! `normalized = (avg + 1) / 2`, `base = 50 + (normalized - 0.5) * 100`,
//! `score = base * (1 + strength * 0.5)`, clamped to `[0, 100]`.

pub const NEUTRAL_SCORE: f64 = 50.0;

/// Map aggregate sentiment in `[-1, 1]` and its strength in `[0, 1]` to a 0-100 score.
pub fn investment_score(avg_sentiment: f64, sentiment_strength: f64) -> f64 {
    if !avg_sentiment.is_finite() || !sentiment_strength.is_finite() {
        return NEUTRAL_SCORE;
    }

    let avg = avg_sentiment.clamp(-1.0, 1.0);
    let strength = sentiment_strength.clamp(0.0, 1.0);

    let normalized = (avg + 1.0) / 2.0;
    let base = 50.0 + (normalized - 0.5) * 100.0;
    (base * (1.0 + strength * 0.5)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_sentiment_scores_exactly_fifty() {
        assert_eq!(investment_score(0.0, 0.0), 50.0);
    }

    #[test]
    fn full_bullish_clamps_to_hundred() {
        assert_eq!(investment_score(1.0, 1.0), 100.0);
    }

    #[test]
    fn full_bearish_is_zero() {
        assert_eq!(investment_score(-1.0, 1.0), 0.0);
    }

    #[test]
    fn strength_amplifies_base() {
        assert_eq!(investment_score(0.5, 0.5), 93.75);
        assert_eq!(investment_score(-0.5, 0.5), 31.25);
        assert_eq!(investment_score(0.5, 0.0), 75.0);
    }

    #[test]
    fn stays_within_bounds_over_the_domain() {
        for i in 0..=200 {
            let avg = -1.0 + i as f64 * 0.01;
            for j in 0..=20 {
                let strength = j as f64 * 0.05;
                let s = investment_score(avg, strength);
                assert!((0.0..=100.0).contains(&s), "avg={avg} strength={strength} score={s}");
            }
        }
    }

    #[test]
    fn non_finite_inputs_degrade_to_neutral() {
        assert_eq!(investment_score(f64::NAN, 0.0), NEUTRAL_SCORE);
        assert_eq!(investment_score(0.2, f64::INFINITY), NEUTRAL_SCORE);
    }
}
