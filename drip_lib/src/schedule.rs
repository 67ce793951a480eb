//! Reinvestment date resolution.
//!
//! A dividend is reinvested on the first business day strictly after it is
//! paid. Only weekends are skipped; exchange holidays are not modelled, so a
//! resolved date may land on a closed market and rely on the price fallback.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// The next Monday-to-Friday date strictly after `date`.
///
/// Returns `None` only at the end of chrono's representable range.
pub fn next_business_day(date: NaiveDate) -> Option<NaiveDate> {
    let step = match date.weekday() {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    date.checked_add_days(Days::new(step))
}

/// Reinvestment date for a dividend paid on `payment_date`, or `None` when
/// that date falls after `end` and the event must be skipped.
pub fn reinvestment_date(payment_date: NaiveDate, end: NaiveDate) -> Option<NaiveDate> {
    next_business_day(payment_date).filter(|d| *d <= end)
}
