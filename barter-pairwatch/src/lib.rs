//! # Barter-Pairwatch
//! Periodic price-decoupling monitor for a pair of exchange symbols.
//!
//! Several [`PeriodicSampler`]s poll one shared [`SampleSource`] on their own cadence. Each
//! cycle builds a [`PairedSeries`] for the reference and comparison symbols and feeds it to
//! the pure [`ComparisonEngine`]. When the reference asset moves by at least 1% while its
//! Pearson correlation with the comparison asset is at or below 0.6, an [`AnomalyEvent`] is
//! emitted to an [`EventSink`].
//!
//! The [`Supervisor`] owns the source, starts every sampler, and on stop cancels them,
//! closes the source exactly once and waits for each sampler to acknowledge.
//!
//! ## Example
//! ```rust,no_run
//! use barter_pairwatch::{
//!     BinanceRestClient, ComparisonEngine, LogSink, PairwatchConfig, PairwatchError,
//!     Supervisor, SupervisorContext,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PairwatchError> {
//!     let config = PairwatchConfig::from_env()?;
//!     let source = BinanceRestClient::new(config.base_url.clone(), config.request_timeout)?;
//!
//!     let report = Supervisor::new(
//!         SupervisorContext::new(Arc::new(source), Arc::new(LogSink)),
//!         config.pair.clone(),
//!         ComparisonEngine::new(config.thresholds),
//!         config.samplers(),
//!     )
//!     .run(config.run_for, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//!
//!     println!("{} anomalies detected", report.anomalies());
//!     Ok(())
//! }
//! ```

/// Environment driven runtime configuration and the default sampler set.
pub mod config;

/// Percent change, Pearson correlation and the decoupling verdict.
pub mod engine;

/// All errors generated in `barter-pairwatch`.
pub mod error;

/// Prices, candles, paired series and verdicts.
pub mod model;

/// [`PeriodicSampler`] and its sampling strategies.
pub mod sampler;

/// [`AnomalyEvent`] consumers.
pub mod sink;

/// [`SampleSource`] trait and exchange implementations.
pub mod source;

/// Concurrent sampler lifecycle management.
pub mod supervisor;

// Re-export commonly used types for convenience
pub use config::PairwatchConfig;
pub use engine::{ComparisonEngine, Thresholds};
pub use error::{ComparisonError, PairwatchError, SourceError};
pub use model::{AnomalyVerdict, Candle, Correlation, PairedSeries, PricePoint, Symbol, SymbolPair};
pub use sampler::{
    CycleOutcome, PeriodicSampler, SamplerConfig, SamplerState, SamplerSummary, SamplingStrategy,
};
pub use sink::{AnomalyEvent, ChannelSink, EventSink, LogSink};
pub use source::{KlineInterval, SampleSource, binance::BinanceRestClient};
pub use supervisor::{Supervisor, SupervisorContext, SupervisorReport};
