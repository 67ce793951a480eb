//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables (`DRIP_*`, `TIINGO_API_KEY`).

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;

use crate::market_data::Interval;
use crate::pricing::{ReinvestWindow, DEFAULT_TIERS};
use crate::simulation::{SimulationConfig, DEFAULT_INTRADAY_TIMEOUT, DEFAULT_PREFETCH_CONCURRENCY};

pub const DEFAULT_EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

/// Error types for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config YAML: {0}")]
    YamlParse(#[from] serde_yml::Error),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("TIINGO_API_KEY is required when the provider is tiingo")]
    MissingApiKey,
}

/// Which market data backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Yahoo,
    Tiingo,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Yahoo => f.write_str("yahoo"),
            ProviderKind::Tiingo => f.write_str("tiingo"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yahoo" => Ok(ProviderKind::Yahoo),
            "tiingo" => Ok(ProviderKind::Tiingo),
            other => Err(format!(
                "unknown provider '{}'. Valid values: yahoo, tiingo",
                other
            )),
        }
    }
}

/// On-disk YAML layout. Every key is optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct DripConfigFile {
    pub exchange_timezone: Option<String>,
    pub intraday_interval: Option<String>,
    pub intraday_timeout_secs: Option<u64>,
    pub prefetch_concurrency: Option<usize>,
    pub provider: Option<String>,
    pub reinvest_window_start: Option<String>,
    pub reinvest_window_end: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct DripConfig {
    pub exchange_timezone: Tz,
    pub intraday_interval: Interval,
    pub intraday_timeout: Duration,
    pub prefetch_concurrency: usize,
    pub reinvest_window: ReinvestWindow,
    pub provider: ProviderKind,
    pub tiingo_api_key: Option<String>,
}

impl Default for DripConfig {
    fn default() -> Self {
        Self {
            exchange_timezone: DEFAULT_EXCHANGE_TZ,
            intraday_interval: Interval::OneHour,
            intraday_timeout: DEFAULT_INTRADAY_TIMEOUT,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
            reinvest_window: ReinvestWindow::default(),
            provider: ProviderKind::Yahoo,
            tiingo_api_key: None,
        }
    }
}

impl DripConfig {
    /// Defaults, then `path` if given, then the process environment.
    ///
    /// Not validated: callers apply their own overrides and then call
    /// [`DripConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)?;
            config.apply_yaml(&content)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from YAML content.
    pub fn apply_yaml(&mut self, yaml_content: &str) -> Result<(), ConfigError> {
        let file: DripConfigFile = serde_yml::from_str(yaml_content)?;

        if let Some(tz) = file.exchange_timezone {
            self.exchange_timezone = parse_timezone("exchange_timezone", &tz)?;
        }
        if let Some(interval) = file.intraday_interval {
            self.intraday_interval = parse_with("intraday_interval", &interval)?;
        }
        if let Some(secs) = file.intraday_timeout_secs {
            self.intraday_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = file.prefetch_concurrency {
            self.prefetch_concurrency = n;
        }
        if let Some(provider) = file.provider {
            self.provider = parse_with("provider", &provider)?;
        }
        if let Some(start) = file.reinvest_window_start {
            self.reinvest_window.start = parse_time("reinvest_window_start", &start)?;
        }
        if let Some(end) = file.reinvest_window_end {
            self.reinvest_window.end = parse_time("reinvest_window_end", &end)?;
        }
        Ok(())
    }

    /// Overlay values from environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tz) = lookup("DRIP_EXCHANGE_TZ") {
            self.exchange_timezone = parse_timezone("DRIP_EXCHANGE_TZ", &tz)?;
        }
        if let Some(interval) = lookup("DRIP_INTRADAY_INTERVAL") {
            self.intraday_interval = parse_with("DRIP_INTRADAY_INTERVAL", &interval)?;
        }
        if let Some(secs) = lookup("DRIP_INTRADAY_TIMEOUT_SECS") {
            self.intraday_timeout =
                Duration::from_secs(parse_with("DRIP_INTRADAY_TIMEOUT_SECS", &secs)?);
        }
        if let Some(n) = lookup("DRIP_PREFETCH_CONCURRENCY") {
            self.prefetch_concurrency = parse_with("DRIP_PREFETCH_CONCURRENCY", &n)?;
        }
        if let Some(provider) = lookup("DRIP_PROVIDER") {
            self.provider = parse_with("DRIP_PROVIDER", &provider)?;
        }
        if let Some(key) = lookup("TIINGO_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.tiingo_api_key = Some(key.trim().to_string());
        }
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reinvest_window.start >= self.reinvest_window.end {
            return Err(ConfigError::InvalidValue {
                key: "reinvest_window",
                message: format!(
                    "window start {} must be before end {}",
                    self.reinvest_window.start, self.reinvest_window.end
                ),
            });
        }
        if self.prefetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "prefetch_concurrency",
                message: "must be at least 1".to_string(),
            });
        }
        if self.intraday_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "intraday_timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.provider == ProviderKind::Tiingo && self.tiingo_api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    /// Simulator settings derived from this configuration.
    pub fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig {
            intraday_interval: self.intraday_interval,
            intraday_timeout: self.intraday_timeout,
            prefetch_concurrency: self.prefetch_concurrency,
            reinvest_window: self.reinvest_window,
            tiers: DEFAULT_TIERS.to_vec(),
        }
    }
}

fn parse_with<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            message: format!("'{}': {}", value, e),
        })
}

fn parse_timezone(key: &'static str, value: &str) -> Result<Tz, ConfigError> {
    parse_with::<Tz>(key, value)
}

fn parse_time(key: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| ConfigError::InvalidValue {
        key,
        message: format!("'{}': {} (expected HH:MM)", value, e),
    })
}
