use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::DripError;

pub const MAX_TICKER_LENGTH: usize = 16;

/// Yahoo-style symbols: `SCHD`, `BRK-B`, `BRK.B`, `^GSPC`, `EURUSD=X`.
const TICKER_PATTERN: &str = r"^[A-Z0-9^][A-Z0-9.\-=^]*$";

fn ticker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TICKER_PATTERN).expect("ticker pattern is a valid regex"))
}

/// Strip ASCII control characters (0x00-0x1F except space 0x20), trim whitespace,
/// and enforce a byte-length limit.
pub fn sanitize_text(input: &str, max_len: usize) -> Result<String, DripError> {
    let sanitized: String = input
        .chars()
        .filter(|c| !c.is_ascii_control() || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string();
    if sanitized.is_empty() {
        return Err(DripError::InvalidInput(
            "input is empty after sanitization".to_string(),
        ));
    }
    if sanitized.len() > max_len {
        return Err(DripError::InvalidInput(format!(
            "input exceeds maximum length of {} bytes",
            max_len
        )));
    }
    Ok(sanitized)
}

/// Validate a ticker symbol and return it upper-cased.
pub fn validate_ticker(input: &str) -> Result<String, DripError> {
    let ticker = sanitize_text(input, MAX_TICKER_LENGTH)?.to_uppercase();
    if !ticker_regex().is_match(&ticker) {
        return Err(DripError::InvalidInput(format!(
            "invalid ticker '{}'. Expected letters, digits and . - = ^ (e.g., SCHD, BRK-B)",
            ticker
        )));
    }
    Ok(ticker)
}

/// Validate a date string in YYYY-MM-DD format.
pub fn validate_date(input: &str) -> Result<NaiveDate, DripError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        DripError::InvalidInput(format!(
            "invalid date '{}'. Expected format: YYYY-MM-DD (e.g., 2020-01-01)",
            trimmed
        ))
    })
}

/// Start must be strictly before end.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), DripError> {
    if start >= end {
        return Err(DripError::InvalidInput(format!(
            "start date {} must be before end date {}",
            start, end
        )));
    }
    Ok(())
}

/// Initial share quantity: finite and not negative.
///
/// Zero is accepted here; the run then fails when the percent return is
/// computed against a zero investment.
pub fn validate_shares(shares: f64) -> Result<f64, DripError> {
    if !shares.is_finite() || shares < 0.0 {
        return Err(DripError::InvalidInput(format!(
            "initial shares must be zero or positive, got {}",
            shares
        )));
    }
    Ok(shares)
}

/// Initial purchase price: finite and not negative. Zero means "use the
/// first day's open" and is mapped to `None`.
pub fn validate_price(price: f64) -> Result<Option<f64>, DripError> {
    if !price.is_finite() || price < 0.0 {
        return Err(DripError::InvalidInput(format!(
            "initial price must be zero or positive, got {}",
            price
        )));
    }
    Ok((price > 0.0).then_some(price))
}
