use barter_pairwatch::{
    BinanceRestClient, ComparisonEngine, LogSink, PairwatchConfig, PairwatchError, Supervisor,
    SupervisorContext,
};
use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Arc,
};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

#[tokio::main]
async fn main() -> Result<(), PairwatchError> {
    let config = PairwatchConfig::from_env();

    // Initialize logging
    let (log_json, log_file) = match &config {
        Ok(config) => (config.log_json, config.log_file.as_deref()),
        Err(_) => (false, None),
    };
    let log_file = log_file.map(|path| (path, open_log_file(path)));
    init_logging(
        log_json,
        log_file
            .as_ref()
            .and_then(|(_, file)| file.as_ref().ok())
            .cloned(),
    );
    if let Some((path, Err(error))) = &log_file {
        warn!(path = %path.display(), %error, "log file unavailable, logging to stdout only");
    }

    let config = config.inspect_err(|error| error!(%error, "invalid configuration"))?;

    info!(
        base_url = %config.base_url,
        reference = %config.pair.reference,
        comparison = %config.pair.comparison,
        correlation_threshold = config.thresholds.correlation,
        percent_threshold = config.thresholds.percent_change,
        "Starting pairwatch"
    );

    let source = BinanceRestClient::new(config.base_url.clone(), config.request_timeout)
        .inspect_err(|error| error!(%error, "failed to build REST client"))?;

    let supervisor = Supervisor::new(
        SupervisorContext::new(Arc::new(source), Arc::new(LogSink)),
        config.pair.clone(),
        ComparisonEngine::new(config.thresholds),
        config.samplers(),
    );

    let report = supervisor
        .run(config.run_for, async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!(%error, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    for summary in &report.samplers {
        info!(
            period = %summary.label,
            cycles = summary.cycles,
            anomalies = summary.anomalies,
            fetch_failures = summary.fetch_failures,
            skipped = summary.skipped,
            "sampler summary"
        );
    }

    Ok(())
}

fn open_log_file(path: &Path) -> std::io::Result<Arc<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Arc::new)
}

fn init_logging(json: bool, log_file: Option<Arc<File>>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().flatten_event(true).boxed()
    } else {
        fmt::layer().boxed()
    };

    let file = log_file.map(|file| fmt::layer().with_ansi(false).with_writer(file));

    tracing_subscriber::registry()
        .with(stdout)
        .with(file)
        .with(filter)
        .init();
}
