use crate::domain::prediction::{Direction, ShockingPrediction, ShockingPredictions, Timeframe};
use crate::domain::stock::{AnalyzedStock, RankedStock};

pub const DEFAULT_SHOCKING_TOP_N: usize = 5;

/// Order by investment score, highest first, and assign ranks `1..=N`.
///
/// `sort_by` is stable, so equal scores keep their input order.
pub fn rank_stocks(stocks: Vec<AnalyzedStock>) -> Vec<RankedStock> {
    let mut stocks = stocks;
    stocks.sort_by(|a, b| b.investment_score().total_cmp(&a.investment_score()));

    stocks
        .into_iter()
        .enumerate()
        .map(|(idx, stock)| RankedStock {
            rank: (idx + 1) as u32,
            stock,
        })
        .collect()
}

/// Biggest projected movers in each direction.
///
/// Only tickers with a projection take part. `all_shocking` is the overall top
/// `2 * top_n` by magnitude, independent of the per-direction lists.
pub fn select_shocking<'a, I>(stocks: I, top_n: usize) -> ShockingPredictions
where
    I: IntoIterator<Item = &'a AnalyzedStock>,
{
    shocking_from_movers(stocks.into_iter().filter_map(to_shocking).collect(), top_n)
}

/// Selection over already-built mover rows.
///
/// Re-running it on [`distinct_movers`] of its own output with the same `top_n`
/// gives the same lists back, which is how stored movers are read.
pub fn shocking_from_movers(mut movers: Vec<ShockingPrediction>, top_n: usize) -> ShockingPredictions {
    movers.sort_by(|a, b| b.abs_change_pct.total_cmp(&a.abs_change_pct));

    let top_increases: Vec<ShockingPrediction> = movers
        .iter()
        .filter(|m| m.direction == Direction::Increase)
        .take(top_n)
        .cloned()
        .collect();
    let top_decreases: Vec<ShockingPrediction> = movers
        .iter()
        .filter(|m| m.direction == Direction::Decrease)
        .take(top_n)
        .cloned()
        .collect();
    let all_shocking: Vec<ShockingPrediction> =
        movers.into_iter().take(top_n.saturating_mul(2)).collect();

    ShockingPredictions {
        top_increases,
        top_decreases,
        all_shocking,
    }
}

/// Every mover appearing in any list, once, largest magnitude first.
pub fn distinct_movers(shocking: &ShockingPredictions) -> Vec<ShockingPrediction> {
    let mut out: Vec<ShockingPrediction> = Vec::new();
    for m in shocking
        .all_shocking
        .iter()
        .chain(&shocking.top_increases)
        .chain(&shocking.top_decreases)
    {
        if !out.iter().any(|o| o.ticker == m.ticker) {
            out.push(m.clone());
        }
    }
    out.sort_by(|a, b| b.abs_change_pct.total_cmp(&a.abs_change_pct));
    out
}

fn to_shocking(stock: &AnalyzedStock) -> Option<ShockingPrediction> {
    let projection = stock.projection.as_ref()?;
    if !projection.price_change_pct.is_finite() {
        return None;
    }
    let abs_change_pct = projection.price_change_pct.abs();

    Some(ShockingPrediction {
        ticker: stock.ticker().to_string(),
        name: stock.sentiment.name.clone(),
        abs_change_pct,
        direction: projection.direction,
        timeframe: Timeframe::from_abs_change_pct(abs_change_pct),
        current_price: projection.current_price,
        predicted_price: projection.predicted_price,
        sentiment_score: stock.sentiment.avg_sentiment,
        investment_score: stock.investment_score(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prediction::{PredictionSeries, Projection};
    use crate::domain::sentiment::TickerSentiment;
    use std::collections::HashSet;

    fn stock(ticker: &str, score: f64, change_pct: Option<f64>) -> AnalyzedStock {
        let mut sentiment = TickerSentiment::neutral_default(ticker, &format!("{ticker} Inc"));
        sentiment.investment_score = score;
        let projection = change_pct.map(|pct| Projection {
            series: PredictionSeries {
                ticker: ticker.to_string(),
                points: Vec::new(),
            },
            current_price: 100.0,
            predicted_price: 100.0 * (1.0 + pct / 100.0),
            price_change_pct: pct,
            direction: Direction::from_change_pct(pct),
        });
        AnalyzedStock {
            sentiment,
            sector: None,
            history: Vec::new(),
            projection,
        }
    }

    #[test]
    fn ranks_descending_and_dense() {
        let ranked = rank_stocks(vec![
            stock("AAA", 40.0, None),
            stock("BBB", 90.0, None),
            stock("CCC", 65.0, None),
        ]);
        let tickers: Vec<&str> = ranked.iter().map(|r| r.ticker()).collect();
        assert_eq!(tickers, vec!["BBB", "CCC", "AAA"]);
        let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = rank_stocks(vec![
            stock("ZZZ", 50.0, None),
            stock("TOP", 80.0, None),
            stock("AAA", 50.0, None),
            stock("MMM", 50.0, None),
        ]);
        let tickers: Vec<&str> = ranked.iter().map(|r| r.ticker()).collect();
        assert_eq!(tickers, vec!["TOP", "ZZZ", "AAA", "MMM"]);
    }

    #[test]
    fn empty_input_ranks_nothing() {
        assert!(rank_stocks(Vec::new()).is_empty());
    }

    #[test]
    fn shocking_examples_bucket_and_direction() {
        let stocks = vec![stock("UPP", 60.0, Some(25.3)), stock("DWN", 40.0, Some(-12.0))];
        let shocking = select_shocking(&stocks, 5);

        assert_eq!(shocking.top_increases.len(), 1);
        assert_eq!(shocking.top_increases[0].ticker, "UPP");
        assert_eq!(shocking.top_increases[0].timeframe, Timeframe::ThirtyDays);

        assert_eq!(shocking.top_decreases.len(), 1);
        let down = &shocking.top_decreases[0];
        assert_eq!(down.ticker, "DWN");
        assert_eq!(down.direction, Direction::Decrease);
        assert_eq!(down.timeframe, Timeframe::FourteenDays);
        assert_eq!(down.abs_change_pct, 12.0);

        let all: Vec<&str> = shocking.all_shocking.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(all, vec!["UPP", "DWN"]);
    }

    #[test]
    fn partitions_are_disjoint_and_capped() {
        let stocks: Vec<AnalyzedStock> = (0..12)
            .map(|i| {
                let pct = if i % 2 == 0 { i as f64 + 1.0 } else { -(i as f64) - 1.0 };
                stock(&format!("T{i:02}"), 50.0, Some(pct))
            })
            .collect();
        let shocking = select_shocking(&stocks, 3);

        assert_eq!(shocking.top_increases.len(), 3);
        assert_eq!(shocking.top_decreases.len(), 3);
        assert_eq!(shocking.all_shocking.len(), 6);

        let ups: HashSet<&str> = shocking.top_increases.iter().map(|s| s.ticker.as_str()).collect();
        assert!(shocking
            .top_decreases
            .iter()
            .all(|s| !ups.contains(s.ticker.as_str())));

        // Largest magnitudes first: 12, 11, 10, ...
        let mags: Vec<f64> = shocking.all_shocking.iter().map(|s| s.abs_change_pct).collect();
        assert_eq!(mags, vec![12.0, 11.0, 10.0, 9.0, 8.0, 7.0]);
        assert_eq!(shocking.top_increases[0].abs_change_pct, 11.0);
        assert_eq!(shocking.top_decreases[0].abs_change_pct, 12.0);
    }

    #[test]
    fn tickers_without_projection_only_rank() {
        let stocks = vec![
            stock("NOPX", 95.0, None),
            stock("MOVE", 30.0, Some(8.0)),
        ];
        let shocking = select_shocking(&stocks, 5);
        assert!(shocking.all_shocking.iter().all(|s| s.ticker != "NOPX"));
        assert_eq!(shocking.all_shocking.len(), 1);

        let ranked = rank_stocks(stocks);
        assert_eq!(ranked[0].ticker(), "NOPX");
        assert_eq!(ranked[0].rank, 1);
    }

    #[test]
    fn stored_movers_reselect_identically() {
        let stocks: Vec<AnalyzedStock> = [30.0, 25.0, 20.0, 2.0, -1.0, -40.0, -3.0, 15.0]
            .iter()
            .enumerate()
            .map(|(i, pct)| stock(&format!("S{i}"), 50.0, Some(*pct)))
            .collect();
        let original = select_shocking(&stocks, 2);

        let stored = distinct_movers(&original);
        assert_eq!(stored.len(), 5);
        assert_eq!(shocking_from_movers(stored, 2), original);
    }

    #[test]
    fn zero_top_n_selects_nothing() {
        let stocks = vec![stock("UPP", 60.0, Some(25.3))];
        assert_eq!(select_shocking(&stocks, 0), ShockingPredictions::default());
    }
}
