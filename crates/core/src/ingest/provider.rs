use crate::config::Settings;
use crate::domain::prediction::PricePoint;
use crate::domain::sentiment::RawNewsItem;
use crate::domain::stock::CandidateTicker;
use crate::ingest::types::{CandidatesResponse, NewsResponse, PricesResponse};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_NEWS_SOURCES: &str = "finviz,yahoo";

/// One independent headline source (one scraped site).
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    fn source_name(&self) -> &str;

    /// Headline rows for `ticker`. An empty vec is a valid answer.
    async fn fetch_news(&self, ticker: &str) -> Result<Vec<RawNewsItem>>;
}

/// Ticker universe and price history.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn list_candidate_tickers(&self) -> Result<Vec<CandidateTicker>>;

    /// Chronological daily closes covering roughly the last `days` calendar days.
    async fn fetch_price_history(&self, ticker: &str, days: u32) -> Result<Vec<PricePoint>>;
}

/// JSON client for the scraping sidecar that owns the HTML scraping.
#[derive(Debug, Clone)]
pub struct HttpScraperClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpScraperClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_scraper_base_url()?.to_string();
        let api_key = settings.scraper_api_key.clone();

        let timeout_secs = std::env::var("SCRAPER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("SCRAPER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build scraper http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    /// One [`HttpNewsSource`] per name in `NEWS_SOURCES` (default `finviz,yahoo`).
    pub fn news_sources_from_env(&self) -> Vec<HttpNewsSource> {
        let raw = std::env::var("NEWS_SOURCES")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NEWS_SOURCES.to_string());

        parse_source_names(&raw)
            .into_iter()
            .map(|source| HttpNewsSource {
                client: self.clone(),
                source,
            })
            .collect()
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_once<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let res = self
            .http
            .get(self.url(path))
            .headers(self.headers()?)
            .query(query)
            .send()
            .await
            .with_context(|| format!("scraper request failed: {path}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read scraper response")?;

        if !status.is_success() {
            anyhow::bail!("scraper HTTP {status} for {path}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected scraper response shape for {path}: {text}"))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(v) => return Ok(v),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, path, ?backoff, error = %err, "scraper fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpScraperClient {
    async fn list_candidate_tickers(&self) -> Result<Vec<CandidateTicker>> {
        let resp: CandidatesResponse = self.get_json("/v1/candidates", &[]).await?;
        Ok(resp.items)
    }

    async fn fetch_price_history(&self, ticker: &str, days: u32) -> Result<Vec<PricePoint>> {
        let resp: PricesResponse = self
            .get_json(
                "/v1/prices",
                &[("ticker", ticker.to_string()), ("days", days.to_string())],
            )
            .await?;
        validate_ticker(&resp.ticker, ticker)?;
        Ok(resp.into_price_points())
    }
}

#[derive(Debug, Clone)]
pub struct HttpNewsSource {
    client: HttpScraperClient,
    source: String,
}

#[async_trait::async_trait]
impl NewsSource for HttpNewsSource {
    fn source_name(&self) -> &str {
        &self.source
    }

    async fn fetch_news(&self, ticker: &str) -> Result<Vec<RawNewsItem>> {
        let path = format!("/v1/news/{}", self.source);
        let resp: NewsResponse = self
            .client
            .get_json(&path, &[("ticker", ticker.to_string())])
            .await?;
        validate_ticker(&resp.ticker, ticker)?;

        Ok(resp
            .items
            .into_iter()
            .filter(|item| !item.headline.trim().is_empty())
            .map(|mut item| {
                if item.source.trim().is_empty() {
                    item.source = self.source.clone();
                }
                item
            })
            .collect())
    }
}

fn validate_ticker(got: &str, expected: &str) -> Result<()> {
    anyhow::ensure!(
        got.trim().eq_ignore_ascii_case(expected.trim()),
        "scraper ticker mismatch: expected {expected}, got {got}"
    );
    Ok(())
}

fn parse_source_names(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let name = part.trim().to_ascii_lowercase();
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
