//! Percent change, Pearson correlation and the decoupling verdict.
//!
//! Everything here is a pure function of its inputs. Logging and alerting belong
//! to the caller.

use crate::{
    error::ComparisonError,
    model::{AnomalyVerdict, Correlation, PairedSeries},
};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Correlation at or below this value counts as decoupled.
/// The usual correlation between ETHUSDT and BTCUSDT is around 0.98.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.6;

/// Absolute percent change of the reference asset required before the
/// correlation is looked at.
pub const DEFAULT_PERCENT_CHANGE_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub correlation: f64,
    pub percent_change: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            correlation: DEFAULT_CORRELATION_THRESHOLD,
            percent_change: DEFAULT_PERCENT_CHANGE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComparisonEngine {
    thresholds: Thresholds,
}

impl ComparisonEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// `(last - first) / first * 100`, rounded to 3 decimal places.
    pub fn percent_change(series: &[f64]) -> Result<f64, ComparisonError> {
        let (first, last) = match (series.first(), series.last()) {
            (Some(first), Some(last)) if series.len() >= 2 => (*first, *last),
            _ => return Err(ComparisonError::TooFewPoints { len: series.len() }),
        };

        if first == 0.0 {
            return Err(ComparisonError::DivideByZero);
        }

        Ok(round3((last - first) / first * 100.0))
    }

    /// Pearson correlation coefficient over index-aligned pairs.
    pub fn correlation(a: &[f64], b: &[f64]) -> Result<f64, ComparisonError> {
        if a.len() < 2 || b.len() < 2 {
            return Err(ComparisonError::InsufficientData {
                reference: a.len(),
                comparison: b.len(),
            });
        }
        if a.len() != b.len() {
            return Err(ComparisonError::LengthMismatch {
                reference: a.len(),
                comparison: b.len(),
            });
        }
        if is_constant(a) || is_constant(b) {
            return Err(ComparisonError::DegenerateSeries);
        }

        let n = a.len() as f64;
        let mean_a = a.iter().sum::<f64>() / n;
        let mean_b = b.iter().sum::<f64>() / n;

        let (cov, var_a, var_b) = a.iter().zip(b).fold(
            (0.0, 0.0, 0.0),
            |(cov, var_a, var_b), (value_a, value_b)| {
                let diff_a = value_a - mean_a;
                let diff_b = value_b - mean_b;
                (
                    cov + diff_a * diff_b,
                    var_a + diff_a * diff_a,
                    var_b + diff_b * diff_b,
                )
            },
        );

        if var_a == 0.0 || var_b == 0.0 {
            return Err(ComparisonError::DegenerateSeries);
        }

        // Rounding can push a perfect fit fractionally outside [-1, 1]
        Ok((cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0))
    }

    /// Percent change gated decoupling check.
    ///
    /// Correlation is only computed once the reference asset moved by at least the
    /// percent change threshold. A degenerate correlation never triggers.
    pub fn evaluate(
        &self,
        series: &PairedSeries,
        period_label: impl Into<SmolStr>,
    ) -> Result<AnomalyVerdict, ComparisonError> {
        let percent_change = Self::percent_change(series.reference())?;

        if percent_change.abs() < self.thresholds.percent_change {
            return Ok(AnomalyVerdict {
                triggered: false,
                percent_change,
                correlation: Correlation::Skipped,
                period_label: period_label.into(),
            });
        }

        Ok(self.verdict(Self::correlate(series), percent_change, period_label.into()))
    }

    /// Ungated decoupling check, used for longer candle series where the
    /// correlation itself is the signal.
    ///
    /// The correlation is rounded to 3 decimal places before it is compared with the
    /// threshold. The percent change is still reported, and a zero first value only
    /// blanks it.
    pub fn evaluate_correlation(
        &self,
        series: &PairedSeries,
        period_label: impl Into<SmolStr>,
    ) -> AnomalyVerdict {
        let percent_change = Self::percent_change(series.reference()).unwrap_or(0.0);
        let correlation = match Self::correlate(series) {
            Correlation::Computed(value) => Correlation::Computed(round3(value)),
            other => other,
        };
        self.verdict(correlation, percent_change, period_label.into())
    }

    fn correlate(series: &PairedSeries) -> Correlation {
        match Self::correlation(series.comparison(), series.reference()) {
            Ok(value) => Correlation::Computed(value),
            Err(_) => Correlation::Degenerate,
        }
    }

    fn verdict(
        &self,
        correlation: Correlation,
        percent_change: f64,
        period_label: SmolStr,
    ) -> AnomalyVerdict {
        let triggered = correlation
            .value()
            .is_some_and(|value| value <= self.thresholds.correlation);

        AnomalyVerdict {
            triggered,
            percent_change,
            correlation,
            period_label,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn is_constant(series: &[f64]) -> bool {
    series.windows(2).all(|pair| pair[0] == pair[1])
}
