pub mod domain;
pub mod ingest;
pub mod pipeline;
pub mod projection;
pub mod ranking;
pub mod scoring;
pub mod sentiment;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub scraper_base_url: Option<String>,
        pub scraper_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                scraper_base_url: std::env::var("SCRAPER_BASE_URL").ok(),
                scraper_api_key: std::env::var("SCRAPER_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_scraper_base_url(&self) -> anyhow::Result<&str> {
            self.scraper_base_url
                .as_deref()
                .context("SCRAPER_BASE_URL is required")
        }
    }

    /// Tunables for one analysis run. Every field can be overridden from the environment.
    #[derive(Debug, Clone)]
    pub struct AnalysisOptions {
        pub max_stocks: usize,
        pub days_back: i64,
        pub prediction_days: usize,
        pub price_history_days: u32,
        pub chunk_size: usize,
        pub request_delay_min: Duration,
        pub request_delay_max: Duration,
        pub chunk_delay: Duration,
        pub news_retry_attempts: u32,
        pub news_retry_backoff: Duration,
        pub shocking_top_n: usize,
        pub persist_batch_size: usize,
    }

    impl Default for AnalysisOptions {
        fn default() -> Self {
            Self {
                max_stocks: 50,
                days_back: 7,
                prediction_days: 30,
                price_history_days: 90,
                chunk_size: 10,
                request_delay_min: Duration::from_secs(1),
                request_delay_max: Duration::from_secs(2),
                chunk_delay: Duration::from_secs(2),
                news_retry_attempts: 3,
                news_retry_backoff: Duration::from_secs(5),
                shocking_top_n: 5,
                persist_batch_size: 100,
            }
        }
    }

    impl AnalysisOptions {
        pub fn from_env() -> Self {
            let d = Self::default();
            Self {
                max_stocks: env_or("MAX_STOCKS", d.max_stocks),
                days_back: env_or("DAYS_BACK", d.days_back),
                prediction_days: env_or("PREDICTION_DAYS", d.prediction_days),
                price_history_days: env_or("PRICE_HISTORY_DAYS", d.price_history_days),
                chunk_size: env_or("CHUNK_SIZE", d.chunk_size).max(1),
                request_delay_min: env_secs("REQUEST_DELAY_MIN", d.request_delay_min),
                request_delay_max: env_secs("REQUEST_DELAY_MAX", d.request_delay_max),
                chunk_delay: env_secs("CHUNK_DELAY", d.chunk_delay),
                news_retry_attempts: env_or("NEWS_RETRY_ATTEMPTS", d.news_retry_attempts).max(1),
                news_retry_backoff: env_secs("NEWS_RETRY_BACKOFF_SECS", d.news_retry_backoff),
                shocking_top_n: env_or("SHOCKING_TOP_N", d.shocking_top_n),
                persist_batch_size: env_or("PERSIST_BATCH_SIZE", d.persist_batch_size).max(1),
            }
        }
    }

    fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

    fn env_secs(key: &str, default: Duration) -> Duration {
        let Ok(raw) = std::env::var(key) else {
            return default;
        };
        parse_secs(&raw).unwrap_or_else(|| {
            tracing::warn!(key, raw = %raw, ?default, "invalid duration in env; using default");
            default
        })
    }

    /// Seconds as a non-negative float; `None` for anything `Duration` cannot hold.
    fn parse_secs(raw: &str) -> Option<Duration> {
        let secs = raw.trim().parse::<f64>().ok()?;
        Duration::try_from_secs_f64(secs).ok()
    }

}
