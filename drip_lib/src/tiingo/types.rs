//! Response types for Tiingo API.

use serde::Deserialize;

/// A single daily price record from the Tiingo end-of-day API.
///
/// Only the unadjusted `open`/`close` and `divCash` are read, so reinvested
/// cash is computed against the prices actually traded. Other columns in the
/// response are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiingoDailyPrice {
    pub date: String,
    pub open: f64,
    pub close: f64,
    #[serde(default)]
    pub div_cash: f64,
}

/// A resampled IEX bar. Requested with `columns=open`, so only the
/// timestamp and open are present.
#[derive(Debug, Clone, Deserialize)]
pub struct TiingoIntradayPrice {
    pub date: String,
    pub open: f64,
}
