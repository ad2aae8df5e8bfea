use crate::error::ComparisonError;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Exchange symbol of a tradable pair, eg/ "ETHUSDT".
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Display, From,
)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn new<S>(symbol: S) -> Self
    where
        S: AsRef<str>,
    {
        Self(SmolStr::new(symbol))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The two symbols a sampler compares.
///
/// Percent change is always measured on the `reference` asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Constructor)]
pub struct SymbolPair {
    pub reference: Symbol,
    pub comparison: Symbol,
}

/// Last traded price of a symbol at request time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct PricePoint {
    pub symbol: Symbol,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Open-high-low-close aggregate for one kline interval.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
}

/// Two index-aligned series of equal length, at least 2 points each.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedSeries {
    reference: Vec<f64>,
    comparison: Vec<f64>,
}

impl PairedSeries {
    pub fn new(reference: Vec<f64>, comparison: Vec<f64>) -> Result<Self, ComparisonError> {
        if reference.len() < 2 || comparison.len() < 2 {
            return Err(ComparisonError::InsufficientData {
                reference: reference.len(),
                comparison: comparison.len(),
            });
        }

        if reference.len() != comparison.len() {
            return Err(ComparisonError::LengthMismatch {
                reference: reference.len(),
                comparison: comparison.len(),
            });
        }

        Ok(Self {
            reference,
            comparison,
        })
    }

    pub fn reference(&self) -> &[f64] {
        &self.reference
    }

    pub fn comparison(&self) -> &[f64] {
        &self.comparison
    }

    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }
}

/// Correlation part of an [`AnomalyVerdict`].
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum Correlation {
    /// Percent change stayed inside the gate, correlation was not computed.
    Skipped,
    /// Pearson coefficient in `[-1, 1]`.
    Computed(f64),
    /// At least one series has zero variance.
    Degenerate,
}

impl Correlation {
    pub fn value(&self) -> Option<f64> {
        match self {
            Correlation::Computed(value) => Some(*value),
            Correlation::Skipped | Correlation::Degenerate => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, Correlation::Degenerate)
    }
}

/// Result of evaluating one [`PairedSeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub triggered: bool,
    pub percent_change: f64,
    pub correlation: Correlation,
    pub period_label: SmolStr,
}
