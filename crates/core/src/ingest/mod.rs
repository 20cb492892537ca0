pub mod provider;
pub mod types;

pub use provider::{HttpNewsSource, HttpScraperClient, MarketDataProvider, NewsSource};
