//! Market data types and the provider boundary used by the simulator.
//!
//! The simulator never talks to the network directly. It asks a
//! [`MarketDataProvider`] for one daily history per run and one intraday
//! slice per reinvestment day, so tests can substitute a fake provider that
//! returns fixed bar sequences.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One trading day of price and cash-dividend data, dated in exchange-local time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    /// Cash dividend per share attributed to this day, 0.0 when none.
    pub dividend: f64,
}

/// A single sub-daily bar. Only the opening price is used for reinvestment.
#[derive(Debug, Clone, PartialEq)]
pub struct IntradayBar {
    pub timestamp: DateTime<Tz>,
    pub open: f64,
}

/// A cash dividend derived from the daily history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DividendEvent {
    pub payment_date: NaiveDate,
    pub dividend_per_share: f64,
}

/// Sampling interval for intraday requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interval {
    FifteenMinutes,
    ThirtyMinutes,
    #[default]
    OneHour,
}

impl Interval {
    /// Interval string understood by the Yahoo chart API.
    pub fn as_yahoo_str(&self) -> &'static str {
        match self {
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
        }
    }

    /// `resampleFreq` value understood by the Tiingo IEX endpoint.
    pub fn as_tiingo_str(&self) -> &'static str {
        match self {
            Interval::FifteenMinutes => "15min",
            Interval::ThirtyMinutes => "30min",
            Interval::OneHour => "1hour",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_yahoo_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "15m" | "15min" => Ok(Interval::FifteenMinutes),
            "30m" | "30min" => Ok(Interval::ThirtyMinutes),
            "1h" | "60m" | "1hour" => Ok(Interval::OneHour),
            other => Err(format!(
                "unsupported intraday interval '{}'. Valid values: 15m, 30m, 1h",
                other
            )),
        }
    }
}

/// Errors a [`MarketDataProvider`] may return.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("no data returned for {symbol}")]
    NoData { symbol: String },
    #[error("rate limited by {provider}")]
    RateLimited { provider: &'static str },
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("{provider} request failed: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
    },
}

/// Source of historical daily and intraday prices.
///
/// Ranges are half-open: `end` / `day_end` are excluded. Implementations
/// must be `Send + Sync` so the simulator can issue intraday requests
/// concurrently.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name used in log lines.
    fn name(&self) -> &'static str;

    /// Daily bars in `[start, end)`, including per-day cash dividends.
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError>;

    /// Intraday bars in `[day_start, day_end)` at `interval`.
    ///
    /// An empty vector is a valid answer.
    async fn intraday_history(
        &self,
        symbol: &str,
        day_start: NaiveDate,
        day_end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<IntradayBar>, ProviderError>;
}

/// Sort bars by date and drop duplicate dates, keeping the first occurrence.
///
/// Returns `true` when the input was already strictly ascending.
pub fn normalize_daily_bars(bars: &mut Vec<DailyBar>) -> bool {
    let already_sorted = bars.windows(2).all(|w| w[0].date < w[1].date);
    if !already_sorted {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
    }
    already_sorted
}

/// Every bar with a positive, finite dividend, in date order.
pub fn dividend_events(bars: &[DailyBar]) -> Vec<DividendEvent> {
    bars.iter()
        .filter(|b| b.dividend.is_finite() && b.dividend > 0.0)
        .map(|b| DividendEvent {
            payment_date: b.date,
            dividend_per_share: b.dividend,
        })
        .collect()
}
