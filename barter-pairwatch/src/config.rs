use crate::{
    engine::{DEFAULT_CORRELATION_THRESHOLD, DEFAULT_PERCENT_CHANGE_THRESHOLD, Thresholds},
    error::PairwatchError,
    model::{Symbol, SymbolPair},
    sampler::{SamplerConfig, SamplingStrategy},
    source::{KlineInterval, binance::BINANCE_SPOT_BASE_URL},
};
use chrono::TimeDelta;
use std::{path::PathBuf, str::FromStr, time::Duration};
use url::Url;

pub const DEFAULT_REFERENCE: &str = "ETHUSDT";
pub const DEFAULT_COMPARISON: &str = "BTCUSDT";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOG_FILE: &str = "info.log";

/// Cadence of the since-launch sampler.
pub const SINCE_LAUNCH_CADENCE: Duration = Duration::from_secs(15);
pub const HOUR: Duration = Duration::from_secs(3600);
pub const MINUTE: Duration = Duration::from_secs(60);

/// Runtime configuration.
///
/// Every field can be overridden with a `PAIRWATCH_*` environment variable, see
/// [`PairwatchConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct PairwatchConfig {
    /// Exchange REST base url
    pub base_url: Url,
    pub pair: SymbolPair,
    pub thresholds: Thresholds,
    /// Total run duration, `None` runs until stopped
    pub run_for: Option<Duration>,
    pub request_timeout: Duration,
    /// Emit JSON formatted logs
    pub log_json: bool,
    /// Plain text log file written alongside stdout, `None` disables it
    pub log_file: Option<PathBuf>,
}

impl PairwatchConfig {
    /// Default configuration against the provided exchange base url.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            pair: SymbolPair::new(
                Symbol::new(DEFAULT_REFERENCE),
                Symbol::new(DEFAULT_COMPARISON),
            ),
            thresholds: Thresholds::default(),
            run_for: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_json: false,
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }

    /// Read configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `PAIRWATCH_BASE_URL` | `https://api.binance.com` |
    /// | `PAIRWATCH_REFERENCE` | `ETHUSDT` |
    /// | `PAIRWATCH_COMPARISON` | `BTCUSDT` |
    /// | `PAIRWATCH_CORRELATION_THRESHOLD` | `0.6` |
    /// | `PAIRWATCH_PERCENT_THRESHOLD` | `1.0` |
    /// | `PAIRWATCH_RUN_SECS` | unset, `0` also runs until stopped |
    /// | `PAIRWATCH_REQUEST_TIMEOUT_SECS` | `10` |
    /// | `PAIRWATCH_LOG_JSON` | `false` |
    /// | `PAIRWATCH_LOG_FILE` | `info.log`, `off` disables the file |
    pub fn from_env() -> Result<Self, PairwatchError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PairwatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = match var("PAIRWATCH_BASE_URL") {
            Some(raw) => Url::parse(&raw)
                .map_err(|error| config_error("PAIRWATCH_BASE_URL", &raw, error))?,
            None => Url::parse(BINANCE_SPOT_BASE_URL)
                .map_err(|error| config_error("PAIRWATCH_BASE_URL", BINANCE_SPOT_BASE_URL, error))?,
        };

        let reference = var("PAIRWATCH_REFERENCE").unwrap_or_else(|| DEFAULT_REFERENCE.to_string());
        let comparison =
            var("PAIRWATCH_COMPARISON").unwrap_or_else(|| DEFAULT_COMPARISON.to_string());

        let thresholds = Thresholds {
            correlation: parse_or(
                var("PAIRWATCH_CORRELATION_THRESHOLD"),
                "PAIRWATCH_CORRELATION_THRESHOLD",
                DEFAULT_CORRELATION_THRESHOLD,
            )?,
            percent_change: parse_or(
                var("PAIRWATCH_PERCENT_THRESHOLD"),
                "PAIRWATCH_PERCENT_THRESHOLD",
                DEFAULT_PERCENT_CHANGE_THRESHOLD,
            )?,
        };

        let run_secs: u64 = parse_or(var("PAIRWATCH_RUN_SECS"), "PAIRWATCH_RUN_SECS", 0)?;
        let timeout_secs: u64 = parse_or(
            var("PAIRWATCH_REQUEST_TIMEOUT_SECS"),
            "PAIRWATCH_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        )?;
        let log_json = var("PAIRWATCH_LOG_JSON")
            .map(|raw| matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let log_file = match var("PAIRWATCH_LOG_FILE") {
            Some(raw) if matches!(raw.to_lowercase().as_str(), "off" | "none" | "false") => None,
            Some(raw) => Some(PathBuf::from(raw)),
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        };

        Self {
            base_url,
            pair: SymbolPair::new(
                Symbol::new(reference.to_uppercase()),
                Symbol::new(comparison.to_uppercase()),
            ),
            thresholds,
            run_for: (run_secs > 0).then(|| Duration::from_secs(run_secs)),
            request_timeout: Duration::from_secs(timeout_secs),
            log_json,
            log_file,
        }
        .validate()
    }

    /// Set the compared symbols
    pub fn with_pair(mut self, reference: &str, comparison: &str) -> Self {
        self.pair = SymbolPair::new(Symbol::new(reference), Symbol::new(comparison));
        self
    }

    /// Set the decoupling thresholds
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the total run duration
    pub fn with_run_for(mut self, run_for: Option<Duration>) -> Self {
        self.run_for = run_for;
        self
    }

    /// Check invariants the env parsing alone cannot guarantee.
    pub fn validate(self) -> Result<Self, PairwatchError> {
        if self.pair.reference == self.pair.comparison {
            return Err(PairwatchError::Config(format!(
                "reference and comparison symbols must differ, both are {}",
                self.pair.reference
            )));
        }
        if !self.thresholds.correlation.is_finite() || !self.thresholds.percent_change.is_finite()
        {
            return Err(PairwatchError::Config(format!(
                "thresholds must be finite: {:?}",
                self.thresholds
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(PairwatchError::Config(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Default sampler set: since launch, hourly high/low, hourly 3m candle
    /// series and minute open/close.
    pub fn samplers(&self) -> Vec<SamplerConfig> {
        vec![
            SamplerConfig::new(
                "since-launch",
                SamplingStrategy::SinceLaunch,
                TimeDelta::seconds(15),
                SINCE_LAUNCH_CADENCE,
            ),
            SamplerConfig::new(
                "1-hour",
                SamplingStrategy::CandleHighLow {
                    interval: KlineInterval::Hour1,
                },
                TimeDelta::hours(1),
                HOUR,
            ),
            SamplerConfig::new(
                "1-hour-series",
                SamplingStrategy::CandleSeries {
                    interval: KlineInterval::Minute3,
                },
                TimeDelta::hours(1),
                HOUR,
            ),
            SamplerConfig::new(
                "1-minute",
                SamplingStrategy::CandleOpenClose {
                    interval: KlineInterval::Minute1,
                },
                TimeDelta::minutes(1),
                MINUTE,
            ),
        ]
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T, PairwatchError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|error| config_error(name, &raw, error)),
        None => Ok(default),
    }
}

fn config_error(name: &str, raw: &str, error: impl std::fmt::Display) -> PairwatchError {
    PairwatchError::Config(format!("{name}='{raw}': {error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    fn default_url() -> Url {
        Url::parse(BINANCE_SPOT_BASE_URL).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = PairwatchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, PairwatchConfig::new(default_url()));
        assert_eq!(config.base_url.as_str(), "https://api.binance.com/");
        assert_eq!(config.pair.reference.as_str(), "ETHUSDT");
        assert_eq!(config.pair.comparison.as_str(), "BTCUSDT");
        assert_eq!(config.thresholds.correlation, 0.6);
        assert_eq!(config.thresholds.percent_change, 1.0);
        assert_eq!(config.run_for, None);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(!config.log_json);
        assert_eq!(config.log_file, Some(PathBuf::from("info.log")));
    }

    #[test]
    fn test_config_from_lookup_overrides() {
        let config = PairwatchConfig::from_lookup(lookup(&[
            ("PAIRWATCH_BASE_URL", "https://testnet.binance.vision"),
            ("PAIRWATCH_REFERENCE", "solusdt"),
            ("PAIRWATCH_COMPARISON", " BTCUSDT "),
            ("PAIRWATCH_CORRELATION_THRESHOLD", "0.75"),
            ("PAIRWATCH_PERCENT_THRESHOLD", "2.5"),
            ("PAIRWATCH_RUN_SECS", "65"),
            ("PAIRWATCH_REQUEST_TIMEOUT_SECS", "3"),
            ("PAIRWATCH_LOG_JSON", "true"),
            ("PAIRWATCH_LOG_FILE", "/var/log/pairwatch.log"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.as_str(), "https://testnet.binance.vision/");
        assert_eq!(config.pair.reference.as_str(), "SOLUSDT");
        assert_eq!(config.pair.comparison.as_str(), "BTCUSDT");
        assert_eq!(
            config.thresholds,
            Thresholds {
                correlation: 0.75,
                percent_change: 2.5
            }
        );
        assert_eq!(config.run_for, Some(Duration::from_secs(65)));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(config.log_json);
        assert_eq!(
            config.log_file,
            Some(PathBuf::from("/var/log/pairwatch.log"))
        );
    }

    #[test]
    fn test_config_log_file_disabled() {
        struct TestCase {
            input: &'static str,
            expected: Option<PathBuf>,
        }

        let tests = vec![
            TestCase {
                // TC0: off
                input: "off",
                expected: None,
            },
            TestCase {
                // TC1: case insensitive none
                input: "NONE",
                expected: None,
            },
            TestCase {
                // TC2: blank falls back to default
                input: "  ",
                expected: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let config =
                PairwatchConfig::from_lookup(lookup(&[("PAIRWATCH_LOG_FILE", test.input)])).unwrap();
            assert_eq!(config.log_file, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_config_zero_run_secs_is_unbounded() {
        let config = PairwatchConfig::from_lookup(lookup(&[("PAIRWATCH_RUN_SECS", "0")])).unwrap();
        assert_eq!(config.run_for, None);
    }

    #[test]
    fn test_config_invalid_values() {
        struct TestCase {
            input: Vec<(&'static str, &'static str)>,
        }

        let tests = vec![
            TestCase {
                // TC0: unparseable threshold
                input: vec![("PAIRWATCH_CORRELATION_THRESHOLD", "high")],
            },
            TestCase {
                // TC1: non-finite threshold
                input: vec![("PAIRWATCH_PERCENT_THRESHOLD", "NaN")],
            },
            TestCase {
                // TC2: negative duration
                input: vec![("PAIRWATCH_RUN_SECS", "-5")],
            },
            TestCase {
                // TC3: invalid url
                input: vec![("PAIRWATCH_BASE_URL", "not a url")],
            },
            TestCase {
                // TC4: identical symbols
                input: vec![("PAIRWATCH_REFERENCE", "BTCUSDT")],
            },
            TestCase {
                // TC5: zero request timeout
                input: vec![("PAIRWATCH_REQUEST_TIMEOUT_SECS", "0")],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = PairwatchConfig::from_lookup(lookup(&test.input));
            assert!(
                matches!(actual, Err(PairwatchError::Config(_))),
                "TC{} failed: {:?}",
                index,
                actual
            );
        }
    }

    #[test]
    fn test_config_builder() {
        let config = PairwatchConfig::new(default_url())
            .with_pair("SOLUSDT", "ETHUSDT")
            .with_thresholds(Thresholds {
                correlation: 0.5,
                percent_change: 0.5,
            })
            .with_run_for(Some(Duration::from_secs(3900)));

        assert_eq!(config.pair.reference.as_str(), "SOLUSDT");
        assert_eq!(config.pair.comparison.as_str(), "ETHUSDT");
        assert_eq!(config.thresholds.correlation, 0.5);
        assert_eq!(config.run_for, Some(Duration::from_secs(3900)));
    }

    #[test]
    fn test_default_samplers() {
        let samplers = PairwatchConfig::new(default_url()).samplers();
        let labels = samplers
            .iter()
            .map(|sampler| sampler.label.as_str())
            .collect::<Vec<_>>();

        assert_eq!(
            labels,
            vec!["since-launch", "1-hour", "1-hour-series", "1-minute"]
        );
        assert_eq!(samplers[0].cadence, Duration::from_secs(15));
        assert_eq!(samplers[1].cadence, Duration::from_secs(3600));
        assert_eq!(samplers[3].interval, TimeDelta::minutes(1));
    }
}
