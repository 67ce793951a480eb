//! Yahoo Finance market data provider.
//!
//! Daily history comes from the chart API at `1d` with dividend events
//! attached to the bar of the same exchange-local date. Intraday slices use
//! the same endpoint at a sub-daily interval. Yahoo reports timestamps as UTC
//! epoch seconds; they are converted to the configured exchange timezone.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;
use time::OffsetDateTime;

use crate::market_data::{DailyBar, IntradayBar, Interval, MarketDataProvider, ProviderError};

/// Errors from Yahoo Finance operations.
#[derive(Error, Debug)]
pub enum YahooError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error(transparent)]
    Upstream(#[from] yahoo_finance_api::YahooError),
}

impl From<YahooError> for ProviderError {
    fn from(e: YahooError) -> Self {
        match e {
            YahooError::InvalidDate(msg) => ProviderError::InvalidDate(msg),
            YahooError::Upstream(inner) => ProviderError::Upstream {
                provider: "yahoo",
                message: inner.to_string(),
            },
        }
    }
}

/// Midnight of `date` in the exchange timezone `tz`, as a UTC instant.
///
/// Range bounds are taken at local midnight so `[start, end)` covers whole
/// exchange-local days. Where midnight is ambiguous the earlier instant wins.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> Result<OffsetDateTime, YahooError> {
    let local = tz
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| YahooError::InvalidDate(format!("{} has no midnight in {}", date, tz)))?;

    OffsetDateTime::from_unix_timestamp(local.timestamp())
        .map_err(|_| YahooError::InvalidDate(date.to_string()))
}

/// Convert a UTC epoch timestamp to exchange-local time.
pub fn epoch_to_local(timestamp: i64, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.with_timezone(&tz))
}

/// A quote row reduced to the fields the simulator uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawQuote {
    pub timestamp: i64,
    pub open: f64,
    pub close: f64,
}

impl From<&yahoo_finance_api::Quote> for RawQuote {
    fn from(q: &yahoo_finance_api::Quote) -> Self {
        Self {
            timestamp: q.timestamp as i64,
            open: q.open,
            close: q.close,
        }
    }
}

/// A dividend event reduced to its epoch timestamp and amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDividend {
    pub timestamp: i64,
    pub amount: f64,
}

impl From<&yahoo_finance_api::Dividend> for RawDividend {
    fn from(d: &yahoo_finance_api::Dividend) -> Self {
        Self {
            timestamp: d.date as i64,
            amount: d.amount,
        }
    }
}

/// Build daily bars from quotes and attach dividends by exchange-local date.
///
/// A dividend dated on a day without a quote is attached to the next bar;
/// one dated after the last bar is dropped.
pub fn build_daily_bars(quotes: &[RawQuote], dividends: &[RawDividend], tz: Tz) -> Vec<DailyBar> {
    let mut by_date: BTreeMap<NaiveDate, DailyBar> = BTreeMap::new();
    for q in quotes {
        let Some(local) = epoch_to_local(q.timestamp, tz) else {
            tracing::warn!("Skipping quote with invalid timestamp {}", q.timestamp);
            continue;
        };
        let date = local.date_naive();
        by_date.entry(date).or_insert(DailyBar {
            date,
            open: q.open,
            close: q.close,
            dividend: 0.0,
        });
    }

    for d in dividends {
        let Some(local) = epoch_to_local(d.timestamp, tz) else {
            tracing::warn!("Skipping dividend with invalid timestamp {}", d.timestamp);
            continue;
        };
        let date = local.date_naive();
        match by_date.range_mut(date..).next() {
            Some((_, bar)) => bar.dividend += d.amount,
            None => tracing::warn!(
                "Dropping dividend of {} on {}: no trading day on or after it",
                d.amount,
                date
            ),
        }
    }

    by_date.into_values().collect()
}

/// Convert intraday quotes to exchange-local bars.
pub fn build_intraday_bars(quotes: &[RawQuote], tz: Tz) -> Vec<IntradayBar> {
    quotes
        .iter()
        .filter_map(|q| {
            epoch_to_local(q.timestamp, tz).map(|timestamp| IntradayBar {
                timestamp,
                open: q.open,
            })
        })
        .collect()
}

/// Yahoo Finance client implementing [`MarketDataProvider`].
pub struct YahooClient {
    connector: yahoo_finance_api::YahooConnector,
    timezone: Tz,
}

impl YahooClient {
    /// Create a client that reports dates and times in `timezone`.
    pub fn new(timezone: Tz) -> Result<Self, YahooError> {
        Ok(Self {
            connector: yahoo_finance_api::YahooConnector::new()?,
            timezone,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Option<&str>,
    ) -> Result<yahoo_finance_api::YResponse, YahooError> {
        let start_dt = local_midnight(start, self.timezone)?;
        let end_dt = local_midnight(end, self.timezone)?;
        let response = match interval {
            Some(interval) => {
                self.connector
                    .get_quote_history_interval(symbol, start_dt, end_dt, interval)
                    .await?
            }
            None => {
                self.connector
                    .get_quote_history(symbol, start_dt, end_dt)
                    .await?
            }
        };
        Ok(response)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let response = self.fetch(symbol, start, end, None).await?;
        let quotes: Vec<RawQuote> = response
            .quotes()
            .map_err(YahooError::from)?
            .iter()
            .map(RawQuote::from)
            .collect();
        let dividends: Vec<RawDividend> = response
            .dividends()
            .map_err(YahooError::from)?
            .iter()
            .map(RawDividend::from)
            .collect();

        let mut bars = build_daily_bars(&quotes, &dividends, self.timezone);
        bars.retain(|b| b.date >= start && b.date < end);
        tracing::debug!(
            "Yahoo returned {} daily bars and {} dividends for {}",
            bars.len(),
            dividends.len(),
            symbol
        );
        Ok(bars)
    }

    async fn intraday_history(
        &self,
        symbol: &str,
        day_start: NaiveDate,
        day_end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<IntradayBar>, ProviderError> {
        let response = self
            .fetch(symbol, day_start, day_end, Some(interval.as_yahoo_str()))
            .await?;
        let quotes: Vec<RawQuote> = response
            .quotes()
            .map_err(YahooError::from)?
            .iter()
            .map(RawQuote::from)
            .collect();
        Ok(build_intraday_bars(&quotes, self.timezone))
    }
}
