//! Short-horizon price path projection.
//!
//! Historical drift plus a momentum term, nudged by sentiment, with multiplicative
//! Gaussian noise and a per-day floor. A heuristic, not a fitted model.

use crate::domain::prediction::{
    Direction, PredictionPoint, PredictionSeries, PricePoint, Projection,
};
use crate::time::us_market::TradingCalendar;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt;

pub const MIN_HISTORY_POINTS: usize = 5;
pub const DEFAULT_HORIZON: usize = 30;

const SHORT_WINDOW: usize = 10;
const LONG_WINDOW: usize = 30;
const SENTIMENT_WEIGHT: f64 = 0.05;
const MOMENTUM_SPREAD_DAYS: f64 = 30.0;
const NOISE_SCALE: f64 = 0.5;
const MAX_DAILY_DROP: f64 = 0.95;
const CI_Z: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientData {
    pub available: usize,
    pub required: usize,
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient price history: {} points, need at least {}",
            self.available, self.required
        )
    }
}

impl std::error::Error for InsufficientData {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendStatistics {
    pub short_ma: f64,
    pub long_ma: f64,
    pub avg_daily_pct_change: f64,
    /// Sample standard deviation of day-over-day percent changes.
    pub volatility: f64,
    pub momentum: f64,
}

/// Requires at least two closes; callers enforce [`MIN_HISTORY_POINTS`].
pub fn trend_statistics(closes: &[f64]) -> TrendStatistics {
    let n = closes.len();
    let short_ma = tail_mean(closes, SHORT_WINDOW.min(n));
    let long_ma = tail_mean(closes, LONG_WINDOW.min(n));

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let avg_daily_pct_change = mean(&changes);
    let volatility = sample_std(&changes, avg_daily_pct_change);

    let momentum = if long_ma > 0.0 && long_ma.is_finite() {
        short_ma / long_ma - 1.0
    } else {
        0.0
    };

    TrendStatistics {
        short_ma,
        long_ma,
        avg_daily_pct_change,
        volatility,
        momentum,
    }
}

fn tail_mean(values: &[f64], window: usize) -> f64 {
    if window == 0 {
        return 0.0;
    }
    mean(&values[values.len() - window..])
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

#[derive(Debug, Clone)]
pub struct PriceTrendProjector {
    horizon: usize,
    calendar: TradingCalendar,
}

impl Default for PriceTrendProjector {
    fn default() -> Self {
        Self::new(DEFAULT_HORIZON, TradingCalendar::default())
    }
}

impl PriceTrendProjector {
    pub fn new(horizon: usize, calendar: TradingCalendar) -> Self {
        Self {
            horizon: horizon.max(1),
            calendar,
        }
    }

    /// Project `horizon` points forward from the last close.
    ///
    /// Point 0 is the last observed close on the next trading day; each later point
    /// applies drift, noise and the one-day floor to the previous mid-point. Bounds
    /// are derived from the final mid-point, so `lower <= predicted <= upper` holds
    /// for every point.
    pub fn project<R: Rng + ?Sized>(
        &self,
        ticker: &str,
        history: &[PricePoint],
        avg_sentiment: f64,
        rng: &mut R,
    ) -> Result<Projection, InsufficientData> {
        let usable: Vec<&PricePoint> = history
            .iter()
            .filter(|p| p.close.is_finite() && p.close > 0.0)
            .collect();
        if usable.len() < MIN_HISTORY_POINTS {
            return Err(InsufficientData {
                available: usable.len(),
                required: MIN_HISTORY_POINTS,
            });
        }

        let closes: Vec<f64> = usable.iter().map(|p| p.close).collect();
        let stats = trend_statistics(&closes);
        let sentiment = if avg_sentiment.is_finite() {
            avg_sentiment.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let sentiment_factor = 1.0 + sentiment * SENTIMENT_WEIGHT;
        let daily_change =
            (stats.avg_daily_pct_change + stats.momentum / MOMENTUM_SPREAD_DAYS) * sentiment_factor;
        let ci = stats.volatility * CI_Z;
        let noise = Normal::new(0.0, stats.volatility * NOISE_SCALE).ok();

        let last = usable[usable.len() - 1];
        let current_price = last.close;
        let mut date = self.calendar.next_trading_day(last.date);
        let mut prev = current_price;

        let mut points = Vec::with_capacity(self.horizon);
        points.push(bounded_point(date, current_price, ci));

        for _ in 1..self.horizon {
            date = self.calendar.next_trading_day(date);

            let mut next = prev * (1.0 + daily_change);
            let shock = match &noise {
                Some(dist) => dist.sample(&mut *rng),
                None => 0.0,
            };
            next *= 1.0 + shock;
            next = next.max(prev * MAX_DAILY_DROP);

            points.push(bounded_point(date, next, ci));
            prev = next;
        }

        let predicted_price = prev;
        let price_change_pct = (predicted_price - current_price) / current_price * 100.0;

        tracing::debug!(
            ticker,
            current_price,
            predicted_price,
            price_change_pct,
            volatility = stats.volatility,
            momentum = stats.momentum,
            "projected price path"
        );

        Ok(Projection {
            series: PredictionSeries {
                ticker: ticker.to_string(),
                points,
            },
            current_price,
            predicted_price,
            price_change_pct,
            direction: Direction::from_change_pct(price_change_pct),
        })
    }
}

fn bounded_point(date: chrono::NaiveDate, mid: f64, ci: f64) -> PredictionPoint {
    PredictionPoint {
        date,
        predicted_price: mid,
        upper_bound: mid * (1.0 + ci),
        lower_bound: mid * (1.0 - ci),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        // Consecutive calendar days ending on Friday 2026-10-16.
        let end = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let n = closes.len() as u64;
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint {
                date: end.checked_sub_days(Days::new(n - 1 - i as u64)).unwrap(),
                close: *c,
            })
            .collect()
    }

    fn volatile_closes() -> Vec<f64> {
        vec![
            100.0, 103.0, 98.0, 104.0, 97.0, 105.0, 101.0, 96.0, 108.0, 102.0, 99.0, 110.0,
        ]
    }

    #[test]
    fn four_points_is_insufficient() {
        let mut rng = StdRng::seed_from_u64(1);
        let res = PriceTrendProjector::default().project(
            "XYZ",
            &series(&[10.0, 11.0, 12.0, 13.0]),
            0.3,
            &mut rng,
        );
        assert_eq!(
            res,
            Err(InsufficientData {
                available: 4,
                required: 5
            })
        );
    }

    #[test]
    fn invalid_closes_do_not_count_toward_minimum() {
        let mut rng = StdRng::seed_from_u64(1);
        let res = PriceTrendProjector::default().project(
            "XYZ",
            &series(&[10.0, 0.0, 12.0, f64::NAN, 13.0, 14.0]),
            0.0,
            &mut rng,
        );
        assert!(res.is_err());
    }

    #[test]
    fn trend_statistics_match_hand_computation() {
        let stats = trend_statistics(&[100.0, 110.0, 99.0, 99.0, 108.9]);
        assert!((stats.avg_daily_pct_change - 0.025).abs() < 1e-12);
        assert!((stats.volatility - (0.0275f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((stats.short_ma - 103.38).abs() < 1e-9);
        assert_eq!(stats.short_ma, stats.long_ma);
        assert_eq!(stats.momentum, 0.0);
    }

    #[test]
    fn flat_history_projects_flat_path() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = PriceTrendProjector::default()
            .project("FLAT", &series(&[50.0; 12]), 0.8, &mut rng)
            .unwrap();

        assert_eq!(p.series.points.len(), DEFAULT_HORIZON);
        for pt in &p.series.points {
            assert_eq!(pt.predicted_price, 50.0);
            assert_eq!(pt.upper_bound, 50.0);
            assert_eq!(pt.lower_bound, 50.0);
        }
        assert_eq!(p.price_change_pct, 0.0);
        assert_eq!(p.direction, Direction::Decrease);
    }

    #[test]
    fn same_seed_reproduces_exact_path() {
        let projector = PriceTrendProjector::default();
        let history = series(&volatile_closes());

        let a = projector
            .project("VOL", &history, 0.2, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = projector
            .project("VOL", &history, 0.2, &mut StdRng::seed_from_u64(42))
            .unwrap();
        let c = projector
            .project("VOL", &history, 0.2, &mut StdRng::seed_from_u64(43))
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a.series.points, c.series.points);
    }

    #[test]
    fn path_respects_bounds_floor_and_anchor() {
        let projector = PriceTrendProjector::default();
        let history = series(&volatile_closes());

        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let p = projector.project("VOL", &history, -0.7, &mut rng).unwrap();
            let pts = &p.series.points;

            assert_eq!(pts[0].predicted_price, 110.0);
            assert_eq!(p.current_price, 110.0);
            assert_eq!(p.predicted_price, pts[pts.len() - 1].predicted_price);

            for pt in pts {
                assert!(pt.lower_bound <= pt.predicted_price, "seed={seed}");
                assert!(pt.predicted_price <= pt.upper_bound, "seed={seed}");
            }
            for w in pts.windows(2) {
                assert!(w[1].predicted_price >= w[0].predicted_price * MAX_DAILY_DROP);
            }

            let expected = (p.predicted_price - 110.0) / 110.0 * 100.0;
            assert_eq!(p.price_change_pct, expected);
            assert_eq!(p.direction, Direction::from_change_pct(expected));
        }
    }

    #[test]
    fn sentiment_tilts_a_rising_series_upwards() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let history = series(&closes);
        let projector = PriceTrendProjector::default();

        let bullish = projector
            .project("UP", &history, 1.0, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let bearish = projector
            .project("UP", &history, -1.0, &mut StdRng::seed_from_u64(5))
            .unwrap();

        assert!(bullish.price_change_pct > 0.0);
        assert!(bullish.predicted_price > bearish.predicted_price);
        assert_eq!(bullish.direction, Direction::Increase);
    }

    #[test]
    fn prediction_dates_advance_over_trading_days() {
        let mut rng = StdRng::seed_from_u64(3);
        let p = PriceTrendProjector::new(3, TradingCalendar::default())
            .project("D", &series(&[10.0, 10.5, 11.0, 10.8, 11.2]), 0.0, &mut rng)
            .unwrap();

        let dates: Vec<NaiveDate> = p.series.points.iter().map(|pt| pt.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 21).unwrap(),
            ]
        );
    }
}
