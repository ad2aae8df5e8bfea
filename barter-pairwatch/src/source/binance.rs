use super::{KlineInterval, SampleSource};
use crate::{
    error::SourceError,
    model::{Candle, PricePoint, Symbol},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, de::DeserializeOwned};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tracing::{debug, info};
use url::Url;

/// Default Binance spot REST base url.
pub const BINANCE_SPOT_BASE_URL: &str = "https://api.binance.com";

/// Maximum candles returned by one kline request.
const KLINES_LIMIT: u16 = 1000;

/// Binance `/api/v3/ticker/price` response.
#[derive(Debug, Deserialize)]
struct BinanceTickerPrice {
    symbol: String,
    #[serde(deserialize_with = "de_str_f64")]
    price: f64,
}

/// Binance `/api/v3/time` response.
#[derive(Debug, Deserialize)]
struct BinanceServerTime {
    #[serde(rename = "serverTime")]
    server_time: i64,
}

/// Binance kline response row.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

impl TryFrom<BinanceKline> for Candle {
    type Error = SourceError;

    fn try_from(kline: BinanceKline) -> Result<Self, Self::Error> {
        let parse = |field: &str, raw: &str| {
            raw.parse::<f64>()
                .map_err(|error| SourceError::Decode(format!("kline {field} '{raw}': {error}")))
        };
        let time = |field: &str, epoch_ms: i64| {
            DateTime::from_timestamp_millis(epoch_ms)
                .ok_or_else(|| SourceError::Decode(format!("kline {field} out of range: {epoch_ms}")))
        };

        Ok(Candle {
            open: parse("open", &kline.1)?,
            high: parse("high", &kline.2)?,
            low: parse("low", &kline.3)?,
            close: parse("close", &kline.4)?,
            open_time: time("open time", kline.0)?,
            close_time: time("close time", kline.6)?,
        })
    }
}

/// Binance spot REST client.
#[derive(Debug)]
pub struct BinanceRestClient {
    client: Client,
    base_url: Url,
    closed: AtomicBool,
}

impl BinanceRestClient {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|error| SourceError::Connection(error.to_string()))?;

        info!(%base_url, "opened Binance REST sample source");

        Ok(Self {
            client,
            base_url,
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn get<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, SourceError>
    where
        T: DeserializeOwned,
    {
        if self.is_closed() {
            return Err(SourceError::Closed);
        }

        let url = self
            .base_url
            .join(path)
            .map_err(|error| SourceError::Connection(format!("invalid url {path}: {error}")))?;

        debug!(%url, ?query, "Binance REST request");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|error| SourceError::Connection(error.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(SourceError::RateLimited { retry_after });
        }

        let body = response
            .text()
            .await
            .map_err(|error| SourceError::Connection(error.to_string()))?;

        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        decode(&body)
    }
}

#[async_trait]
impl SampleSource for BinanceRestClient {
    async fn current_price(&self, symbol: &Symbol) -> Result<PricePoint, SourceError> {
        let ticker: BinanceTickerPrice = self
            .get("/api/v3/ticker/price", &[("symbol", symbol.to_string())])
            .await?;

        Ok(PricePoint {
            symbol: Symbol::new(ticker.symbol),
            price: ticker.price,
            timestamp: Utc::now(),
        })
    }

    async fn server_time(&self) -> Result<DateTime<Utc>, SourceError> {
        let time: BinanceServerTime = self.get("/api/v3/time", &[]).await?;
        DateTime::from_timestamp_millis(time.server_time).ok_or_else(|| {
            SourceError::Decode(format!("server time out of range: {}", time.server_time))
        })
    }

    async fn klines(
        &self,
        symbol: &Symbol,
        interval: KlineInterval,
        since: DateTime<Utc>,
    ) -> Result<Vec<Candle>, SourceError> {
        let klines: Vec<BinanceKline> = self
            .get(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("startTime", since.timestamp_millis().to_string()),
                    ("limit", KLINES_LIMIT.to_string()),
                ],
            )
            .await?;

        klines.into_iter().map(Candle::try_from).collect()
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(base_url = %self.base_url, "closed Binance REST sample source");
        }
    }
}

fn decode<T>(body: &str) -> Result<T, SourceError>
where
    T: DeserializeOwned,
{
    serde_json::from_str(body).map_err(|error| {
        let snippet = body.chars().take(200).collect::<String>();
        SourceError::Decode(format!("{error}: {snippet}"))
    })
}

fn de_str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<f64>().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_de_ticker_price() {
        let input = r#"{"symbol":"ETHUSDT","price":"2450.17000000"}"#;
        let actual = decode::<BinanceTickerPrice>(input).unwrap();
        assert_eq!(actual.symbol, "ETHUSDT");
        assert_eq!(actual.price, 2450.17);
    }

    #[test]
    fn test_de_server_time() {
        let input = r#"{"serverTime":1499827319559}"#;
        let actual = decode::<BinanceServerTime>(input).unwrap();
        assert_eq!(actual.server_time, 1499827319559);
    }

    #[test]
    fn test_de_klines() {
        let input = r#"[
            [
                1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100",
                "148976.11427815", 1499644799999, "2434.19055334", 308, "1756.87402397",
                "28.46694368", "0"
            ]
        ]"#;

        let klines = decode::<Vec<BinanceKline>>(input).unwrap();
        let candles = klines
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(
            candles,
            vec![Candle {
                open: 0.0163479,
                high: 0.8,
                low: 0.015758,
                close: 0.015771,
                open_time: DateTime::from_timestamp_millis(1499040000000).unwrap(),
                close_time: DateTime::from_timestamp_millis(1499644799999).unwrap(),
            }]
        );
    }

    #[test]
    fn test_de_kline_invalid_price() {
        let input = r#"[[1499040000000, "abc", "0.8", "0.01", "0.02", "1", 1499644799999, "1", 1, "1", "1", "0"]]"#;
        let klines = decode::<Vec<BinanceKline>>(input).unwrap();
        let actual = klines.into_iter().map(Candle::try_from).next().unwrap();
        assert!(matches!(actual, Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_decode_error_body() {
        let actual = decode::<BinanceServerTime>(r#"{"code":-1121,"msg":"Invalid symbol."}"#);
        assert!(matches!(actual, Err(SourceError::Decode(message)) if message.contains("Invalid symbol")));
    }

    #[tokio::test]
    async fn test_closed_client_rejects_requests() {
        let client = BinanceRestClient::new(
            Url::parse(BINANCE_SPOT_BASE_URL).unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();

        client.close().await;
        client.close().await;

        assert!(client.is_closed());
        assert_eq!(client.server_time().await, Err(SourceError::Closed));
        assert_eq!(
            client.current_price(&Symbol::new("ETHUSDT")).await,
            Err(SourceError::Closed)
        );
    }
}
