//! Periodic sampling of a [`SymbolPair`] and evaluation of each sample.
//!
//! A [`PeriodicSampler`] runs `Fetch -> Evaluate -> Emit -> Sleep` until it is cancelled.
//! Failures stay local to the cycle they happen in: fetch failures are logged and retried
//! on the next cadence tick, evaluation failures are logged and the cycle is skipped.

use crate::{
    engine::ComparisonEngine,
    error::{ComparisonError, SourceError},
    model::{AnomalyVerdict, PairedSeries, SymbolPair},
    sink::AnomalyEvent,
    supervisor::SupervisorContext,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use smol_str::SmolStr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub mod strategy;

pub use strategy::{AnchorMode, EvaluationMode, SamplingStrategy, Window};

/// Static description of one sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Period label used in logs and events, eg/ "1-hour".
    pub label: SmolStr,
    pub strategy: SamplingStrategy,
    /// Lookback window length and anchor step.
    pub interval: TimeDelta,
    /// Sleep between cycles.
    pub cadence: Duration,
}

impl SamplerConfig {
    pub fn new(
        label: impl Into<SmolStr>,
        strategy: SamplingStrategy,
        interval: TimeDelta,
        cadence: Duration,
    ) -> Self {
        Self {
            label: label.into(),
            strategy,
            interval,
            cadence,
        }
    }
}

/// Rolling cursor of a running sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub anchor_time: DateTime<Utc>,
    pub interval: TimeDelta,
}

impl SamplerState {
    fn advance(&mut self) {
        self.anchor_time += self.interval;
    }

    fn window(&self) -> Window {
        Window {
            start: self.anchor_time,
            span: self.interval,
        }
    }
}

/// Launch prices of the [`SamplingStrategy::SinceLaunch`] sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    reference: f64,
    comparison: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Running {
    state: SamplerState,
    baseline: Option<Baseline>,
}

/// Result of one sampler cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Evaluated(AnomalyVerdict),
    FetchFailed(SourceError),
    Skipped(ComparisonError),
}

/// Running totals of a sampler, returned when it stops.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SamplerSummary {
    pub label: SmolStr,
    pub cycles: u64,
    pub anomalies: u64,
    pub fetch_failures: u64,
    pub skipped: u64,
}

impl SamplerSummary {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Evaluated(verdict) if verdict.triggered => self.anomalies += 1,
            CycleOutcome::Evaluated(_) => {}
            CycleOutcome::FetchFailed(_) => self.fetch_failures += 1,
            CycleOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

pub struct PeriodicSampler {
    config: SamplerConfig,
    pair: SymbolPair,
    engine: ComparisonEngine,
    context: SupervisorContext,
    running: Option<Running>,
    summary: SamplerSummary,
}

impl PeriodicSampler {
    pub fn new(
        config: SamplerConfig,
        pair: SymbolPair,
        engine: ComparisonEngine,
        context: SupervisorContext,
    ) -> Self {
        let summary = SamplerSummary {
            label: config.label.clone(),
            ..Default::default()
        };

        Self {
            config,
            pair,
            engine,
            context,
            running: None,
            summary,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// `None` until the first successful fetch of the server time.
    pub fn state(&self) -> Option<SamplerState> {
        self.running.map(|running| running.state)
    }

    pub fn summary(&self) -> &SamplerSummary {
        &self.summary
    }

    /// Run cycles until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// Cancellation is observed while fetching and while sleeping. A cycle whose
    /// fetch is interrupted is abandoned before anything is emitted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SamplerSummary {
        info!(
            period = %self.config.label,
            strategy = ?self.config.strategy,
            cadence_secs = self.config.cadence.as_secs_f64(),
            "sampler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let fetched = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                fetched = self.fetch() => fetched,
            };

            self.complete(fetched);

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.config.cadence) => {}
            }
        }

        info!(
            period = %self.config.label,
            cycles = self.summary.cycles,
            anomalies = self.summary.anomalies,
            "sampler cancelled"
        );

        self.summary
    }

    /// Run exactly one cycle without sleeping.
    pub async fn step(&mut self) -> CycleOutcome {
        let fetched = self.fetch().await;
        self.complete(fetched)
    }

    async fn fetch(&mut self) -> Result<(Vec<f64>, Vec<f64>), SourceError> {
        let running = match self.running {
            Some(running) => running,
            None => {
                let running = self.start().await?;
                self.running = Some(running);
                running
            }
        };

        let source = self.context.source.as_ref();
        let window = running.state.window();
        let baseline = running.baseline;
        let strategy = self.config.strategy;

        let reference = strategy
            .sample(
                source,
                &self.pair.reference,
                window,
                baseline.map(|baseline| baseline.reference),
            )
            .await?;
        let comparison = strategy
            .sample(
                source,
                &self.pair.comparison,
                window,
                baseline.map(|baseline| baseline.comparison),
            )
            .await?;

        Ok((reference, comparison))
    }

    async fn start(&self) -> Result<Running, SourceError> {
        let source = self.context.source.as_ref();
        let server_time = source.server_time().await?;

        let (anchor_time, baseline) = match self.config.strategy {
            SamplingStrategy::SinceLaunch => {
                let reference = source.current_price(&self.pair.reference).await?;
                let comparison = source.current_price(&self.pair.comparison).await?;
                let baseline = Baseline {
                    reference: reference.price,
                    comparison: comparison.price,
                };
                (server_time, Some(baseline))
            }
            _ => (server_time - self.config.interval, None),
        };

        info!(
            period = %self.config.label,
            %anchor_time,
            ?baseline,
            "sampler anchored"
        );

        Ok(Running {
            state: SamplerState {
                anchor_time,
                interval: self.config.interval,
            },
            baseline,
        })
    }

    fn complete(&mut self, fetched: Result<(Vec<f64>, Vec<f64>), SourceError>) -> CycleOutcome {
        let outcome = match fetched {
            Ok((reference, comparison)) => {
                debug!(
                    period = %self.config.label,
                    ?reference,
                    ?comparison,
                    "fetched series"
                );

                let outcome = match PairedSeries::new(reference, comparison)
                    .and_then(|series| self.evaluate(&series))
                {
                    Ok(verdict) => {
                        self.emit(&verdict);
                        CycleOutcome::Evaluated(verdict)
                    }
                    Err(error) => {
                        warn!(
                            period = %self.config.label,
                            reference = %self.pair.reference,
                            %error,
                            "evaluation skipped"
                        );
                        CycleOutcome::Skipped(error)
                    }
                };

                if self.config.strategy.anchor_mode() == AnchorMode::Sliding {
                    if let Some(running) = self.running.as_mut() {
                        running.state.advance();
                    }
                }

                outcome
            }
            Err(error) => {
                if error.is_retryable() {
                    warn!(
                        period = %self.config.label,
                        reference = %self.pair.reference,
                        comparison = %self.pair.comparison,
                        %error,
                        "fetch failed, retrying next cycle"
                    );
                } else {
                    error!(
                        period = %self.config.label,
                        reference = %self.pair.reference,
                        comparison = %self.pair.comparison,
                        %error,
                        "fetch failed"
                    );
                }
                CycleOutcome::FetchFailed(error)
            }
        };

        self.summary.record(&outcome);
        outcome
    }

    fn evaluate(&self, series: &PairedSeries) -> Result<AnomalyVerdict, ComparisonError> {
        let verdict = match self.config.strategy.evaluation_mode() {
            EvaluationMode::Gated => self.engine.evaluate(series, self.config.label.clone())?,
            EvaluationMode::CorrelationOnly => self
                .engine
                .evaluate_correlation(series, self.config.label.clone()),
        };

        info!(
            "Analyzing {} change percent is: {} for last {}",
            self.pair.reference, verdict.percent_change, self.config.label
        );

        if verdict.correlation.is_degenerate() {
            warn!(
                period = %self.config.label,
                reference = %self.pair.reference,
                comparison = %self.pair.comparison,
                "correlation undefined for constant series"
            );
        }

        Ok(verdict)
    }

    fn emit(&self, verdict: &AnomalyVerdict) {
        if let Some(event) = AnomalyEvent::from_verdict(&self.pair, verdict, Utc::now()) {
            self.context.sink.emit(&event);
        }
    }
}
