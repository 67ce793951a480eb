//! CLI subcommand implementations.

pub mod dividends;
pub mod simulate;

use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use drip_lib::validation;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown on stderr while market data is fetched.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Parse `--end`, defaulting to today in the exchange timezone.
pub fn resolve_end_date(end: Option<&str>, tz: Tz) -> Result<NaiveDate> {
    match end {
        Some(raw) => Ok(validation::validate_date(raw)?),
        None => Ok(Utc::now().with_timezone(&tz).date_naive()),
    }
}
