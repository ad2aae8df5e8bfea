use crate::model::{AnomalyVerdict, Symbol, SymbolPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tokio::sync::mpsc;
use tracing::warn;

/// Emitted whenever a sampler detects decoupled price movement.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnomalyEvent {
    pub period_label: SmolStr,
    pub reference: Symbol,
    pub comparison: Symbol,
    pub percent_change: f64,
    pub correlation: f64,
    pub detected_at: DateTime<Utc>,
}

impl AnomalyEvent {
    /// Build the event for a triggered verdict. `None` if the verdict did not
    /// trigger or carries no correlation value.
    pub fn from_verdict(
        pair: &SymbolPair,
        verdict: &AnomalyVerdict,
        detected_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !verdict.triggered {
            return None;
        }

        Some(Self {
            period_label: verdict.period_label.clone(),
            reference: pair.reference.clone(),
            comparison: pair.comparison.clone(),
            percent_change: verdict.percent_change,
            correlation: verdict.correlation.value()?,
            detected_at,
        })
    }
}

/// Fire-and-forget consumer of [`AnomalyEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AnomalyEvent);
}

/// Logs every [`AnomalyEvent`] at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &AnomalyEvent) {
        warn!(
            period = %event.period_label,
            reference = %event.reference,
            comparison = %event.comparison,
            percent_change = event.percent_change,
            correlation = event.correlation,
            "Price movement detected"
        );
    }
}

/// Forwards every [`AnomalyEvent`] to an unbounded channel.
///
/// Events are dropped silently once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AnomalyEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AnomalyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &AnomalyEvent) {
        let _ = self.tx.send(event.clone());
    }
}
