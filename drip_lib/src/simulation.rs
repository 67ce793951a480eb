//! DRIP simulation: the dividend event loop and its result types.
//!
//! A run fetches the daily history once, derives dividend events, resolves a
//! reinvestment date and price for each, and threads a running share balance
//! through the events in date order. Each event's cash depends on the share
//! count produced by every earlier event, so the recurrence itself is strictly
//! sequential. Intraday slices have no such dependency and are prefetched with
//! bounded concurrency before the loop runs.

use std::time::Duration;

use chrono::NaiveDate;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{DivisionError, DripError};
use crate::market_data::{
    dividend_events, normalize_daily_bars, DailyBar, DividendEvent, IntradayBar, Interval,
    MarketDataProvider,
};
use crate::metrics::SummaryMetrics;
use crate::pricing::{
    resolve_price, shares_purchased, PriceContext, PriceTier, ReinvestWindow, ResolvedPrice,
    DEFAULT_TIERS,
};
use crate::schedule::{next_business_day, reinvestment_date};
use crate::validation;

/// Default per-request timeout for intraday fetches.
pub const DEFAULT_INTRADAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of intraday slices fetched concurrently.
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 4;

/// Tunables for a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub intraday_interval: Interval,
    /// A timed-out intraday request counts as "no intraday data".
    pub intraday_timeout: Duration,
    /// 1 fetches intraday slices one at a time.
    pub prefetch_concurrency: usize,
    pub reinvest_window: ReinvestWindow,
    pub tiers: Vec<PriceTier>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            intraday_interval: Interval::OneHour,
            intraday_timeout: DEFAULT_INTRADAY_TIMEOUT,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
            reinvest_window: ReinvestWindow::default(),
            tiers: DEFAULT_TIERS.to_vec(),
        }
    }
}

/// What the caller wants simulated.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRequest {
    pub symbol: String,
    pub start: NaiveDate,
    /// Evaluation end date. Daily history excludes it; a reinvestment that
    /// resolves exactly to it is still processed.
    pub end: NaiveDate,
    pub initial_shares: f64,
    /// `None` or zero uses the open of the first daily bar.
    pub initial_price: Option<f64>,
}

impl SimulationRequest {
    pub fn new(symbol: &str, start: NaiveDate, end: NaiveDate, initial_shares: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            end,
            initial_shares,
            initial_price: None,
        }
    }

    pub fn with_initial_price(mut self, price: f64) -> Self {
        self.initial_price = Some(price);
        self
    }

    /// Validated copy with a normalized symbol and zero prices mapped to `None`.
    fn validated(&self) -> Result<Self, DripError> {
        let symbol = validation::validate_ticker(&self.symbol)?;
        validation::validate_date_range(self.start, self.end)?;
        let initial_shares = validation::validate_shares(self.initial_shares)?;
        let initial_price = match self.initial_price {
            Some(p) => validation::validate_price(p)?,
            None => None,
        };
        Ok(Self {
            symbol,
            start: self.start,
            end: self.end,
            initial_shares,
            initial_price,
        })
    }
}

/// A dividend that will be reinvested, with its resolved reinvestment date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlannedReinvestment {
    pub event: DividendEvent,
    pub reinvest_date: NaiveDate,
}

/// A dividend dropped because its reinvestment date falls after the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SkippedDividend {
    pub dividend_date: NaiveDate,
    pub dividend_per_share: f64,
    /// `None` only when the next business day is not representable.
    pub reinvest_date: Option<NaiveDate>,
}

/// Split events into those reinvested inside `[.., end]` and those skipped.
pub fn plan_reinvestments(
    events: &[DividendEvent],
    end: NaiveDate,
) -> (Vec<PlannedReinvestment>, Vec<SkippedDividend>) {
    let mut planned = Vec::with_capacity(events.len());
    let mut skipped = Vec::new();

    for event in events {
        match reinvestment_date(event.payment_date, end) {
            Some(reinvest_date) => planned.push(PlannedReinvestment {
                event: *event,
                reinvest_date,
            }),
            None => skipped.push(SkippedDividend {
                dividend_date: event.payment_date,
                dividend_per_share: event.dividend_per_share,
                reinvest_date: next_business_day(event.payment_date),
            }),
        }
    }

    (planned, skipped)
}

/// One reinvested dividend, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub dividend_date: NaiveDate,
    pub dividend_per_share: f64,
    pub total_cash_received: f64,
    pub reinvest_date: NaiveDate,
    pub reinvest_price: f64,
    pub price_source: PriceTier,
    pub shares_purchased: f64,
    pub new_share_total: f64,
    /// Position marked at the reinvestment price, not the final price.
    pub position_value_at_reinvest_price: f64,
}

/// Running share balance and ledger for a single run.
#[derive(Debug, Clone)]
pub struct SimulationState {
    current_shares: f64,
    ledger: Vec<TransactionRecord>,
}

impl SimulationState {
    pub fn new(initial_shares: f64) -> Self {
        Self {
            current_shares: initial_shares,
            ledger: Vec::new(),
        }
    }

    pub fn current_shares(&self) -> f64 {
        self.current_shares
    }

    pub fn ledger(&self) -> &[TransactionRecord] {
        &self.ledger
    }

    /// Reinvest one dividend. Cash accrues on the balance held immediately
    /// before this event.
    pub fn reinvest(
        &mut self,
        plan: &PlannedReinvestment,
        resolved: ResolvedPrice,
    ) -> Result<(), DivisionError> {
        let total_cash_received = plan.event.dividend_per_share * self.current_shares;
        let shares = shares_purchased(total_cash_received, resolved.price, plan.reinvest_date)?;
        self.current_shares += shares;

        self.ledger.push(TransactionRecord {
            dividend_date: plan.event.payment_date,
            dividend_per_share: plan.event.dividend_per_share,
            total_cash_received,
            reinvest_date: plan.reinvest_date,
            reinvest_price: resolved.price,
            price_source: resolved.source,
            shares_purchased: shares,
            new_share_total: self.current_shares,
            position_value_at_reinvest_price: self.current_shares * resolved.price,
        });
        Ok(())
    }

    fn into_ledger(self) -> Vec<TransactionRecord> {
        self.ledger
    }
}

/// Outcome of a simulation run. All amounts are raw numbers; formatting is
/// left to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_shares: f64,
    /// Caller-supplied price, or the first daily open.
    pub initial_price: f64,
    pub final_shares: f64,
    /// Close of the last daily bar.
    pub final_price: f64,
    pub final_value: f64,
    pub initial_investment: f64,
    pub total_return_amount: f64,
    pub total_return_percent: f64,
    pub total_dividends_reinvested: f64,
    pub ledger: Vec<TransactionRecord>,
    pub skipped: Vec<SkippedDividend>,
}

/// Runs DRIP simulations against a [`MarketDataProvider`].
pub struct Simulator<'a, P: ?Sized> {
    provider: &'a P,
    config: SimulationConfig,
}

impl<'a, P: MarketDataProvider + ?Sized> Simulator<'a, P> {
    pub fn new(provider: &'a P, config: SimulationConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Daily history for `[start, end)`, sorted and de-duplicated.
    ///
    /// A provider error or an empty history is reported as `DataUnavailable`.
    pub async fn fetch_daily(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, DripError> {
        let mut bars = self
            .provider
            .daily_history(symbol, start, end)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Daily history from {} for {} failed: {}",
                    self.provider.name(),
                    symbol,
                    e
                );
                DripError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }
            })?;

        if bars.is_empty() {
            return Err(DripError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no daily bars between {} and {}", start, end),
            });
        }

        if !normalize_daily_bars(&mut bars) {
            tracing::warn!(
                "Daily history for {} was out of order or had duplicate dates; normalized to {} bars",
                symbol,
                bars.len()
            );
        }
        Ok(bars)
    }

    /// Intraday bars for `date`, or `None` when the request failed or timed out.
    async fn fetch_intraday(&self, symbol: &str, date: NaiveDate) -> Option<Vec<IntradayBar>> {
        let day_end = next_business_day(date)?;
        let request = self.provider.intraday_history(
            symbol,
            date,
            day_end,
            self.config.intraday_interval,
        );

        match tokio::time::timeout(self.config.intraday_timeout, request).await {
            Ok(Ok(bars)) => {
                tracing::debug!("Fetched {} intraday bars for {} on {}", bars.len(), symbol, date);
                Some(bars)
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "Intraday fetch for {} on {} failed, falling back to daily close: {}",
                    symbol,
                    date,
                    e
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Intraday fetch for {} on {} timed out after {:?}, falling back to daily close",
                    symbol,
                    date,
                    self.config.intraday_timeout
                );
                None
            }
        }
    }

    /// Run the simulation described by `request`.
    pub async fn run(&self, request: &SimulationRequest) -> Result<SimulationResult, DripError> {
        let request = request.validated()?;
        let symbol = request.symbol.as_str();

        let daily = self.fetch_daily(symbol, request.start, request.end).await?;
        let (first, last) = match (daily.first(), daily.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(DripError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "empty daily history".to_string(),
                })
            }
        };
        let initial_price = request.initial_price.unwrap_or(first.open);

        let events = dividend_events(&daily);
        let (planned, skipped) = plan_reinvestments(&events, request.end);
        for s in &skipped {
            tracing::warn!(
                "Skipping dividend of {} paid {}: reinvestment date is after end date {}",
                s.dividend_per_share,
                s.dividend_date,
                request.end
            );
        }

        // Order-preserving, so results line up with `planned`.
        let intraday: Vec<Option<Vec<IntradayBar>>> = stream::iter(planned.iter())
            .map(move |plan| self.fetch_intraday(symbol, plan.reinvest_date))
            .buffered(self.config.prefetch_concurrency.max(1))
            .collect()
            .await;

        let mut state = SimulationState::new(request.initial_shares);
        for (plan, bars) in planned.iter().zip(intraday.iter()) {
            let ctx = PriceContext {
                date: plan.reinvest_date,
                intraday: bars.as_deref(),
                daily: &daily,
                window: self.config.reinvest_window,
            };
            let resolved = resolve_price(&self.config.tiers, &ctx).ok_or(
                DripError::UnresolvedPrice {
                    date: plan.reinvest_date,
                },
            )?;
            if resolved.source != PriceTier::IntradayWindow {
                tracing::debug!(
                    "No intraday price for {} on {}; using {} {}",
                    symbol,
                    plan.reinvest_date,
                    resolved.source.label(),
                    resolved.price
                );
            }
            state.reinvest(plan, resolved)?;
        }

        let final_shares = state.current_shares();
        let metrics = SummaryMetrics::compute(
            request.initial_shares,
            initial_price,
            final_shares,
            last.close,
        )?;
        let ledger = state.into_ledger();
        let total_dividends_reinvested = ledger.iter().map(|r| r.total_cash_received).sum();

        tracing::info!(
            "Simulated {} from {} to {}: {} reinvestments, {} skipped, total return {:.2}%",
            symbol,
            request.start,
            request.end,
            ledger.len(),
            skipped.len(),
            metrics.total_return_percent
        );

        Ok(SimulationResult {
            symbol: request.symbol.clone(),
            start: request.start,
            end: request.end,
            initial_shares: request.initial_shares,
            initial_price,
            final_shares,
            final_price: last.close,
            final_value: metrics.final_value,
            initial_investment: metrics.initial_investment,
            total_return_amount: metrics.total_return_amount,
            total_return_percent: metrics.total_return_percent,
            total_dividends_reinvested,
            ledger,
            skipped,
        })
    }
}

/// Run a simulation with the default configuration.
pub async fn run_simulation<P: MarketDataProvider + ?Sized>(
    provider: &P,
    request: &SimulationRequest,
) -> Result<SimulationResult, DripError> {
    Simulator::new(provider, SimulationConfig::default())
        .run(request)
        .await
}
