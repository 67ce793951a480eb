//! Reinvestment price resolution and share purchase arithmetic.
//!
//! Prices are resolved through an ordered list of [`PriceTier`] strategies,
//! each returning an optional price. The first tier that yields a value wins:
//!
//! 1. `IntradayWindow`: opening price of the first intraday bar inside the
//!    reinvestment window (12:00 to 13:00 exchange-local by default)
//! 2. `ExactClose`: daily close on the reinvestment date
//! 3. `AsOfClose`: most recent daily close at or before the reinvestment date

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::error::DivisionError;
use crate::market_data::{DailyBar, IntradayBar};

/// Half-open exchange-local time window `[start, end)` used to pick the
/// intraday reinvestment bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReinvestWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for ReinvestWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(12, 0, 0).expect("valid time"),
            end: NaiveTime::from_hms_opt(13, 0, 0).expect("valid time"),
        }
    }
}

impl ReinvestWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }
}

/// One strategy in the price fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    IntradayWindow,
    ExactClose,
    AsOfClose,
}

impl PriceTier {
    /// Short label for tabular output.
    pub fn label(&self) -> &'static str {
        match self {
            PriceTier::IntradayWindow => "intraday",
            PriceTier::ExactClose => "close",
            PriceTier::AsOfClose => "as-of close",
        }
    }

    /// Price this tier can offer for `ctx`, if any. Non-finite prices are
    /// treated as missing; non-positive prices are passed through so the
    /// purchase step can reject them.
    pub fn resolve(&self, ctx: &PriceContext<'_>) -> Option<f64> {
        let price = match self {
            PriceTier::IntradayWindow => ctx.intraday.and_then(|bars| {
                bars.iter()
                    .find(|b| {
                        b.timestamp.date_naive() == ctx.date
                            && ctx.window.contains(b.timestamp.time())
                            && b.open.is_finite()
                    })
                    .map(|b| b.open)
            }),
            PriceTier::ExactClose => ctx
                .daily
                .binary_search_by_key(&ctx.date, |b| b.date)
                .ok()
                .map(|idx| ctx.daily[idx].close),
            PriceTier::AsOfClose => {
                let idx = ctx.daily.partition_point(|b| b.date <= ctx.date);
                idx.checked_sub(1).map(|i| ctx.daily[i].close)
            }
        };
        price.filter(|p| p.is_finite())
    }
}

/// Default tier order, highest precision first.
pub const DEFAULT_TIERS: [PriceTier; 3] = [
    PriceTier::IntradayWindow,
    PriceTier::ExactClose,
    PriceTier::AsOfClose,
];

/// Inputs available to the tiers for one reinvestment date.
#[derive(Debug, Clone, Copy)]
pub struct PriceContext<'a> {
    pub date: NaiveDate,
    /// Intraday bars for `date`, or `None` when the fetch failed or timed out.
    pub intraday: Option<&'a [IntradayBar]>,
    /// Daily history, strictly ascending by date.
    pub daily: &'a [DailyBar],
    pub window: ReinvestWindow,
}

/// A price together with the tier that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPrice {
    pub price: f64,
    pub source: PriceTier,
}

/// Walk `tiers` in order and return the first price found.
pub fn resolve_price(tiers: &[PriceTier], ctx: &PriceContext<'_>) -> Option<ResolvedPrice> {
    tiers.iter().find_map(|tier| {
        tier.resolve(ctx).map(|price| ResolvedPrice {
            price,
            source: *tier,
        })
    })
}

/// Fractional shares bought with `cash` at `price`.
///
/// Fails when `price` is zero, negative or NaN: a non-positive price means the
/// market data is corrupt and the run cannot continue.
pub fn shares_purchased(cash: f64, price: f64, date: NaiveDate) -> Result<f64, DivisionError> {
    if price.is_nan() || price <= 0.0 {
        return Err(DivisionError::NonPositivePrice { date, price });
    }
    Ok(cash / price)
}
