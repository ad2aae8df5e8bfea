use crate::{
    engine::ComparisonEngine,
    model::SymbolPair,
    sampler::{PeriodicSampler, SamplerConfig, SamplerSummary},
    sink::EventSink,
    source::SampleSource,
};
use futures::future::join_all;
use serde::Serialize;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info};

/// Shared handles passed to every sampler at construction.
///
/// The source is read-only from a sampler's point of view, only the [`Supervisor`]
/// closes it.
#[derive(Clone)]
pub struct SupervisorContext {
    pub source: Arc<dyn SampleSource>,
    pub sink: Arc<dyn EventSink>,
}

impl SupervisorContext {
    pub fn new(source: Arc<dyn SampleSource>, sink: Arc<dyn EventSink>) -> Self {
        Self { source, sink }
    }
}

/// Summaries of every sampler that acknowledged cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SupervisorReport {
    pub samplers: Vec<SamplerSummary>,
}

impl SupervisorReport {
    pub fn cycles(&self) -> u64 {
        self.samplers.iter().map(|summary| summary.cycles).sum()
    }

    pub fn anomalies(&self) -> u64 {
        self.samplers.iter().map(|summary| summary.anomalies).sum()
    }
}

/// Runs a set of [`PeriodicSampler`]s concurrently against one shared [`SampleSource`].
pub struct Supervisor {
    context: SupervisorContext,
    pair: SymbolPair,
    engine: ComparisonEngine,
    samplers: Vec<SamplerConfig>,
}

impl Supervisor {
    pub fn new(
        context: SupervisorContext,
        pair: SymbolPair,
        engine: ComparisonEngine,
        samplers: Vec<SamplerConfig>,
    ) -> Self {
        Self {
            context,
            pair,
            engine,
            samplers,
        }
    }

    /// Run every sampler until `run_for` elapses or `stop` resolves, whichever is first.
    ///
    /// On the way out every sampler is cancelled, the shared source is closed exactly
    /// once, and each sampler task is awaited before returning.
    pub async fn run<Stop>(self, run_for: Option<Duration>, stop: Stop) -> SupervisorReport
    where
        Stop: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = self
            .samplers
            .into_iter()
            .map(|config| {
                let sampler = PeriodicSampler::new(
                    config,
                    self.pair.clone(),
                    self.engine,
                    self.context.clone(),
                );
                tokio::spawn(sampler.run(shutdown_rx.clone()))
            })
            .collect::<Vec<_>>();

        info!(
            samplers = handles.len(),
            reference = %self.pair.reference,
            comparison = %self.pair.comparison,
            run_for_secs = run_for.map(|run_for| run_for.as_secs()),
            "supervisor started"
        );

        match run_for {
            Some(run_for) => tokio::select! {
                _ = tokio::time::sleep(run_for) => info!("run duration elapsed"),
                _ = stop => info!("stop signal received"),
            },
            None => {
                stop.await;
                info!("stop signal received");
            }
        }

        // Receivers may already be gone if every sampler task panicked
        let _ = shutdown_tx.send(true);
        info!("closing shared sample source");
        self.context.source.close().await;

        let mut report = SupervisorReport::default();
        for result in join_all(handles).await {
            match result {
                Ok(summary) => report.samplers.push(summary),
                Err(error) => error!(%error, "sampler task failed"),
            }
        }

        info!(
            cycles = report.cycles(),
            anomalies = report.anomalies(),
            "supervisor stopped"
        );

        report
    }
}
