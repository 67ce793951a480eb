//! Error types for the simulation layer.

use chrono::NaiveDate;
use thiserror::Error;

/// Arithmetic failures that indicate bad input or corrupted market data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DivisionError {
    /// A reinvestment price of zero, below zero, or NaN.
    #[error("reinvestment price {price} on {date} is not positive")]
    NonPositivePrice { date: NaiveDate, price: f64 },
    /// Percent return requested against a zero initial investment.
    #[error("initial investment is zero; total return percent is undefined")]
    ZeroInitialInvestment,
}

/// Errors produced by a simulation run.
///
/// Intraday fetch failures never show up here: they are absorbed by the
/// price fallback chain and only logged.
#[derive(Error, Debug)]
pub enum DripError {
    /// The provider returned no daily history for the symbol and range.
    #[error("no market data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },
    #[error(transparent)]
    Division(#[from] DivisionError),
    /// Every price tier came back empty for a reinvestment date.
    #[error("could not resolve a reinvestment price for {date}")]
    UnresolvedPrice { date: NaiveDate },
    /// User-provided input failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
