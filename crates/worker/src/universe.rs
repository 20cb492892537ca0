use std::cmp::Ordering;
use std::collections::HashSet;
use stockpulse_core::domain::stock::CandidateTicker;

/// Large-cap names analyzed when the scraper has no candidate list.
pub const FALLBACK_TICKERS: [&str; 50] = [
    "AAPL", "MSFT", "AMZN", "GOOGL", "META", "TSLA", "NVDA", "BRK-B", "JPM", "V", "JNJ", "UNH",
    "PG", "MA", "HD", "BAC", "XOM", "AVGO", "CVX", "COST", "ABBV", "MRK", "PEP", "KO", "LLY",
    "TMO", "CSCO", "ABT", "CRM", "MCD", "ACN", "WMT", "NKE", "DHR", "TXN", "UPS", "NEE", "PM",
    "ORCL", "IBM", "QCOM", "INTC", "NFLX", "ADBE", "AMD", "CMCSA", "HON", "PFE", "CAT", "UNP",
];

#[derive(Debug, Clone)]
pub struct UniverseOptions {
    pub max_stocks: usize,
}

/// Clean the scraper's candidate list into the tickers to analyze, largest market cap
/// first.
///
/// Blank and duplicate tickers are dropped (first occurrence wins), obvious funds and
/// names with a non-positive market cap are excluded. Names without a cap keep their
/// listed order after the sized ones. An empty result falls back to [`FALLBACK_TICKERS`].
pub fn build_candidate_universe(
    raw: Vec<CandidateTicker>,
    opts: &UniverseOptions,
) -> Vec<CandidateTicker> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<CandidateTicker> = Vec::new();

    for mut c in raw {
        let ticker = c.ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() || is_fund_name(&c.name) {
            continue;
        }
        if c.market_cap.is_some_and(|cap| cap.is_nan() || cap <= 0.0) {
            continue;
        }
        if !seen.insert(ticker.clone()) {
            continue;
        }
        c.ticker = ticker;
        c.name = c.name.trim().to_string();
        out.push(c);
    }

    if out.is_empty() {
        tracing::warn!("no candidates from scraper; using fallback tickers");
        out = fallback_candidates();
    }

    out.sort_by(|a, b| match (a.market_cap, b.market_cap) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    out.truncate(opts.max_stocks);
    out
}

pub fn fallback_candidates() -> Vec<CandidateTicker> {
    FALLBACK_TICKERS
        .iter()
        .map(|t| CandidateTicker {
            ticker: t.to_string(),
            name: t.to_string(),
            market_cap: None,
            sector: None,
        })
        .collect()
}

fn is_fund_name(name: &str) -> bool {
    let s = name.trim();
    if s.is_empty() {
        return false;
    }

    // Word-level match so names like "Netflix" or "Trustmark" survive.
    let upper = s.to_ascii_uppercase();
    let words: Vec<&str> = upper
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| matches!(*w, "ETF" | "ETN" | "FUND")) {
        return true;
    }

    ["ISHARES", "SPDR", "VANGUARD", "INVESCO QQQ", "PROSHARES", "DIREXION"]
        .iter()
        .any(|brand| upper.contains(brand))
}
