use crate::{
    error::SourceError,
    model::{Candle, Symbol},
    source::{KlineInterval, SampleSource},
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// How a sampler builds the two series it compares each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SamplingStrategy {
    /// Ticker price captured once at sampler start vs. the current ticker price.
    SinceLaunch,
    /// `[high, low]` of the candle opening at the anchor.
    CandleHighLow { interval: KlineInterval },
    /// `[open, close]` of the candle opening at the anchor.
    CandleOpenClose { interval: KlineInterval },
    /// `open, close` of every candle inside the sampler window, oldest first.
    CandleSeries { interval: KlineInterval },
}

/// Whether the sampler anchor slides forward after each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AnchorMode {
    Fixed,
    Sliding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EvaluationMode {
    /// Correlation only once the reference percent change passes the threshold.
    Gated,
    /// Correlation every cycle.
    CorrelationOnly,
}

impl SamplingStrategy {
    pub fn anchor_mode(&self) -> AnchorMode {
        match self {
            SamplingStrategy::SinceLaunch => AnchorMode::Fixed,
            _ => AnchorMode::Sliding,
        }
    }

    pub fn evaluation_mode(&self) -> EvaluationMode {
        match self {
            SamplingStrategy::CandleSeries { .. } => EvaluationMode::CorrelationOnly,
            _ => EvaluationMode::Gated,
        }
    }

    /// Fetch this cycle's sample for one symbol.
    ///
    /// `baseline` is the launch price, only used by [`SamplingStrategy::SinceLaunch`].
    pub(crate) async fn sample(
        &self,
        source: &dyn SampleSource,
        symbol: &Symbol,
        window: Window,
        baseline: Option<f64>,
    ) -> Result<Vec<f64>, SourceError> {
        match self {
            SamplingStrategy::SinceLaunch => {
                let current = source.current_price(symbol).await?;
                info!(symbol = %current.symbol, price = current.price, "Ticker current price");
                Ok(vec![baseline.unwrap_or(current.price), current.price])
            }
            SamplingStrategy::CandleHighLow { interval } => {
                let candle = first_candle(source, symbol, *interval, window.start).await?;
                Ok(vec![candle.high, candle.low])
            }
            SamplingStrategy::CandleOpenClose { interval } => {
                let candle = first_candle(source, symbol, *interval, window.start).await?;
                Ok(vec![candle.open, candle.close])
            }
            SamplingStrategy::CandleSeries { interval } => {
                let series = source
                    .klines(symbol, *interval, window.start)
                    .await?
                    .into_iter()
                    .filter(|candle| window.contains(candle.open_time))
                    .flat_map(|candle| [candle.open, candle.close])
                    .collect::<Vec<_>>();

                if series.is_empty() {
                    return Err(SourceError::NoCandles {
                        symbol: symbol.clone(),
                        since: window.start,
                    });
                }

                Ok(series)
            }
        }
    }
}

/// Half-open `[start, start + span)` lookback window of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub span: TimeDelta,
}

impl Window {
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.start + self.span
    }
}

async fn first_candle(
    source: &dyn SampleSource,
    symbol: &Symbol,
    interval: KlineInterval,
    since: DateTime<Utc>,
) -> Result<Candle, SourceError> {
    source
        .klines(symbol, interval, since)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::NoCandles {
            symbol: symbol.clone(),
            since,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_modes() {
        struct TestCase {
            input: SamplingStrategy,
            expected: (AnchorMode, EvaluationMode),
        }

        let tests = vec![
            TestCase {
                // TC0: since launch keeps its anchor
                input: SamplingStrategy::SinceLaunch,
                expected: (AnchorMode::Fixed, EvaluationMode::Gated),
            },
            TestCase {
                // TC1: high/low slides
                input: SamplingStrategy::CandleHighLow {
                    interval: KlineInterval::Hour1,
                },
                expected: (AnchorMode::Sliding, EvaluationMode::Gated),
            },
            TestCase {
                // TC2: open/close slides
                input: SamplingStrategy::CandleOpenClose {
                    interval: KlineInterval::Minute1,
                },
                expected: (AnchorMode::Sliding, EvaluationMode::Gated),
            },
            TestCase {
                // TC3: candle series is correlation only
                input: SamplingStrategy::CandleSeries {
                    interval: KlineInterval::Minute3,
                },
                expected: (AnchorMode::Sliding, EvaluationMode::CorrelationOnly),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = (test.input.anchor_mode(), test.input.evaluation_mode());
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_window_contains() {
        let start = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let window = Window {
            start,
            span: TimeDelta::hours(1),
        };

        assert!(window.contains(start));
        assert!(window.contains(start + TimeDelta::minutes(57)));
        assert!(!window.contains(start + TimeDelta::hours(1)));
        assert!(!window.contains(start - TimeDelta::minutes(3)));
    }
}
