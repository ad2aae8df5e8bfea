use crate::{
    error::SourceError,
    model::{Candle, PricePoint, Symbol},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Binance spot REST [`SampleSource`] implementation.
pub mod binance;

/// Read-only access to exchange market data.
///
/// One connection is shared by every sampler. Only the
/// [`Supervisor`](crate::supervisor::Supervisor) opens it and calls [`SampleSource::close`].
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Last traded price of `symbol`.
    async fn current_price(&self, symbol: &Symbol) -> Result<PricePoint, SourceError>;

    /// Current exchange server time.
    async fn server_time(&self) -> Result<DateTime<Utc>, SourceError>;

    /// Candles of `interval` opening at or after `since`, ordered oldest first.
    async fn klines(
        &self,
        symbol: &Symbol,
        interval: KlineInterval,
        since: DateTime<Utc>,
    ) -> Result<Vec<Candle>, SourceError>;

    /// Release the connection. Later requests fail with [`SourceError::Closed`].
    async fn close(&self);
}

/// Candle interval supported by the exchange kline endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum KlineInterval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl KlineInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::Minute1 => "1m",
            KlineInterval::Minute3 => "3m",
            KlineInterval::Minute5 => "5m",
            KlineInterval::Minute15 => "15m",
            KlineInterval::Hour1 => "1h",
            KlineInterval::Hour4 => "4h",
            KlineInterval::Day1 => "1d",
        }
    }

    pub fn duration(&self) -> TimeDelta {
        match self {
            KlineInterval::Minute1 => TimeDelta::minutes(1),
            KlineInterval::Minute3 => TimeDelta::minutes(3),
            KlineInterval::Minute5 => TimeDelta::minutes(5),
            KlineInterval::Minute15 => TimeDelta::minutes(15),
            KlineInterval::Hour1 => TimeDelta::hours(1),
            KlineInterval::Hour4 => TimeDelta::hours(4),
            KlineInterval::Day1 => TimeDelta::days(1),
        }
    }
}

impl Display for KlineInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
