//! Tiingo API client for daily end-of-day prices and IEX intraday bars.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use serde::de::DeserializeOwned;

use super::error::TiingoError;
use super::types::{TiingoDailyPrice, TiingoIntradayPrice};
use crate::market_data::{DailyBar, IntradayBar, Interval, MarketDataProvider, ProviderError};

/// Request timeout for Tiingo API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_BASE_URL: &str = "https://api.tiingo.com";

/// Tiingo REST API client.
pub struct TiingoClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timezone: Tz,
}

impl TiingoClient {
    /// Create a new TiingoClient with default base URL.
    pub fn new(api_key: String, timezone: Tz) -> Result<Self, TiingoError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, timezone)
    }

    /// Create a new TiingoClient with custom base URL (for testing with wiremock).
    pub fn with_base_url(
        base_url: &str,
        api_key: String,
        timezone: Tz,
    ) -> Result<Self, TiingoError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timezone,
        })
    }

    /// Daily records for `[start, end]`, both inclusive.
    ///
    /// Returns `Ok(None)` if the ticker is unknown (404).
    pub async fn daily_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<Vec<TiingoDailyPrice>>, TiingoError> {
        let url = format!("{}/tiingo/daily/{}/prices", self.base_url, ticker);
        let query = [
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
        ];
        self.get_records(&url, &query).await
    }

    /// IEX bars resampled to `interval` for `[start, end]`, both inclusive.
    ///
    /// Returns `Ok(None)` if the ticker is unknown (404).
    pub async fn intraday_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        interval: Interval,
    ) -> Result<Option<Vec<TiingoIntradayPrice>>, TiingoError> {
        let url = format!("{}/iex/{}/prices", self.base_url, ticker);
        let query = [
            ("startDate", start.format("%Y-%m-%d").to_string()),
            ("endDate", end.format("%Y-%m-%d").to_string()),
            ("resampleFreq", interval.as_tiingo_str().to_string()),
            ("columns", "open".to_string()),
        ];
        self.get_records(&url, &query).await
    }

    /// Tiingo quirk: rate limits return HTTP 200 with Content-Type text/plain
    /// instead of a proper 429 status code.
    async fn get_records<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Vec<T>>, TiingoError> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Token {}", self.api_key))
            .query(query)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TiingoError::InvalidApiKey);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TiingoError::RateLimited);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(TiingoError::ParseFailed(format!(
                "HTTP {}: {}",
                status,
                snippet(&body, 200)
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let body = response.text().await.map_err(|e| {
            TiingoError::ParseFailed(format!("Failed to read response body: {}", e))
        })?;

        if content_type.contains("text/plain") || content_type.contains("text/html") {
            let lower = body.to_lowercase();
            if lower.contains("rate limit")
                || lower.contains("too many requests")
                || lower.contains("error")
            {
                return Err(TiingoError::RateLimited);
            }
        }

        let records: Vec<T> = serde_json::from_str(&body).map_err(|e| {
            TiingoError::ParseFailed(format!(
                "Failed to deserialize response: {} | body: {}",
                e,
                snippet(&body, 500)
            ))
        })?;

        Ok(Some(records))
    }
}

fn snippet(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

/// Tiingo EOD dates look like `2024-01-05T00:00:00.000Z`; the calendar part
/// is already the exchange date.
pub fn parse_daily_date(raw: &str) -> Result<NaiveDate, TiingoError> {
    raw.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .ok_or_else(|| TiingoError::ParseFailed(format!("invalid daily date '{}'", raw)))
}

pub fn to_daily_bar(price: &TiingoDailyPrice) -> Result<DailyBar, TiingoError> {
    Ok(DailyBar {
        date: parse_daily_date(&price.date)?,
        open: price.open,
        close: price.close,
        dividend: price.div_cash,
    })
}

/// IEX timestamps are RFC 3339 in UTC.
pub fn to_intraday_bar(price: &TiingoIntradayPrice, tz: Tz) -> Result<IntradayBar, TiingoError> {
    let timestamp = DateTime::parse_from_rfc3339(&price.date)
        .map_err(|e| {
            TiingoError::ParseFailed(format!("invalid intraday timestamp '{}': {}", price.date, e))
        })?
        .with_timezone(&tz);
    Ok(IntradayBar {
        timestamp,
        open: price.open,
    })
}

/// Last day included by an end-exclusive range, if the range is non-empty.
fn inclusive_end(start: NaiveDate, end: NaiveDate) -> Option<NaiveDate> {
    end.checked_sub_days(Days::new(1)).filter(|last| *last >= start)
}

#[async_trait]
impl MarketDataProvider for TiingoClient {
    fn name(&self) -> &'static str {
        "tiingo"
    }

    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let Some(last) = inclusive_end(start, end) else {
            return Ok(Vec::new());
        };
        let records = self
            .daily_prices(symbol, start, last)
            .await?
            .ok_or_else(|| ProviderError::NoData {
                symbol: symbol.to_string(),
            })?;

        let bars = records
            .iter()
            .map(to_daily_bar)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!("Tiingo returned {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    async fn intraday_history(
        &self,
        symbol: &str,
        day_start: NaiveDate,
        day_end: NaiveDate,
        interval: Interval,
    ) -> Result<Vec<IntradayBar>, ProviderError> {
        let Some(last) = inclusive_end(day_start, day_end) else {
            return Ok(Vec::new());
        };
        let Some(records) = self
            .intraday_prices(symbol, day_start, last, interval)
            .await?
        else {
            return Ok(Vec::new());
        };

        let bars = records
            .iter()
            .map(|p| to_intraday_bar(p, self.timezone))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(bars)
    }
}
