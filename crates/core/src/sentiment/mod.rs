pub mod aggregator;
pub mod dates;
pub mod lexicon;
pub mod scorer;

pub use aggregator::{RetryPolicy, SentimentAggregator, SourceOutcome};
pub use lexicon::Lexicon;
pub use scorer::{PolarityScores, SentimentScorer};
