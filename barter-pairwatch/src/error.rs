use crate::model::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// All errors generated in `barter-pairwatch`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PairwatchError {
    #[error("ComparisonError: {0}")]
    Comparison(#[from] ComparisonError),

    #[error("SourceError: {0}")]
    Source(#[from] SourceError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failures of the pure [`ComparisonEngine`](crate::engine::ComparisonEngine) calculations.
///
/// None of these are fatal: the sampler logs the error and skips the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Error)]
pub enum ComparisonError {
    #[error("percent change undefined: first value of the series is zero")]
    DivideByZero,

    #[error(
        "insufficient data: reference has {reference} points, comparison has {comparison} \
        points, at least 2 each are required"
    )]
    InsufficientData { reference: usize, comparison: usize },

    #[error("percent change needs at least 2 points, series has {len}")]
    TooFewPoints { len: usize },

    #[error("series are not index aligned: reference has {reference} points, comparison has {comparison}")]
    LengthMismatch { reference: usize, comparison: usize },

    #[error("correlation undefined: series has zero variance")]
    DegenerateSeries,
}

/// Failures fetching samples from a [`SampleSource`](crate::source::SampleSource).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("rate limited by exchange (retry after: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no candles available for {symbol} since {since}")]
    NoCandles {
        symbol: Symbol,
        since: DateTime<Utc>,
    },

    #[error("sample source connection is closed")]
    Closed,
}

impl SourceError {
    /// Determine if the next cadence tick should simply try again.
    ///
    /// Only a closed source is permanent, everything else is transient from the
    /// point of view of a sampler.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Closed => false,
            _ => true,
        }
    }
}
