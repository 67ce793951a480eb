use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, TimeZone};
use chrono_tz::America::New_York;
use drip_lib::{
    run_simulation, DailyBar, DivisionError, DripError, IntradayBar, Interval,
    MarketDataProvider, PriceTier, ProviderError, SimulationConfig, SimulationRequest, Simulator,
};

// ============================================================================
// Fake provider
// ============================================================================

#[derive(Default)]
struct FakeProvider {
    daily: Vec<DailyBar>,
    daily_error: Option<String>,
    intraday: HashMap<NaiveDate, Vec<IntradayBar>>,
    intraday_error: bool,
    intraday_delay: Option<Duration>,
    intraday_delays: HashMap<NaiveDate, Duration>,
    daily_calls: AtomicUsize,
    intraday_calls: Mutex<Vec<NaiveDate>>,
}

impl FakeProvider {
    fn with_daily(daily: Vec<DailyBar>) -> Self {
        Self {
            daily,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        self.daily_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.daily_error {
            return Err(ProviderError::Upstream {
                provider: "fake",
                message: format!("{} for {}", message, symbol),
            });
        }
        Ok(self
            .daily
            .iter()
            .filter(|b| b.date >= start && b.date < end)
            .cloned()
            .collect())
    }

    async fn intraday_history(
        &self,
        _symbol: &str,
        day_start: NaiveDate,
        _day_end: NaiveDate,
        _interval: Interval,
    ) -> Result<Vec<IntradayBar>, ProviderError> {
        self.intraday_calls.lock().unwrap().push(day_start);
        let delay = self
            .intraday_delays
            .get(&day_start)
            .copied()
            .or(self.intraday_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.intraday_error {
            return Err(ProviderError::RateLimited { provider: "fake" });
        }
        Ok(self.intraday.get(&day_start).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn bar(y: i32, m: u32, d: u32, open: f64, close: f64, dividend: f64) -> DailyBar {
    DailyBar {
        date: date(y, m, d),
        open,
        close,
        dividend,
    }
}

fn intraday(y: i32, m: u32, d: u32, h: u32, min: u32, open: f64) -> IntradayBar {
    IntradayBar {
        timestamp: New_York.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
        open,
    }
}

/// Three bars with a $1.00 dividend on Friday 2024-01-05.
fn january_bars() -> Vec<DailyBar> {
    vec![
        bar(2024, 1, 2, 80.0, 81.0, 0.0),
        bar(2024, 1, 5, 82.0, 83.0, 1.0),
        bar(2024, 1, 8, 84.0, 85.0, 0.0),
    ]
}

fn january_request() -> SimulationRequest {
    SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 9), 100.0)
        .with_initial_price(80.0)
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn end_to_end_exact_close_returns_seven_and_a_half_percent() {
    let provider = FakeProvider::with_daily(january_bars());
    let result = run_simulation(&provider, &january_request()).await.unwrap();

    assert_eq!(result.ledger.len(), 1);
    let record = &result.ledger[0];
    assert_eq!(record.dividend_date, date(2024, 1, 5));
    assert_eq!(record.reinvest_date, date(2024, 1, 8));
    assert_eq!(record.price_source, PriceTier::ExactClose);
    assert!((record.total_cash_received - 100.0).abs() < 1e-9);
    assert!((record.reinvest_price - 85.0).abs() < 1e-9);
    assert!((record.shares_purchased - 100.0 / 85.0).abs() < 1e-9);

    assert!((result.final_shares - 101.176_470_588).abs() < 1e-6);
    assert_eq!(result.final_price, 85.0);
    assert!((result.final_value - 8600.0).abs() < 1e-6);
    assert!((result.initial_investment - 8000.0).abs() < 1e-9);
    assert!((result.total_return_amount - 600.0).abs() < 1e-6);
    assert!((result.total_return_percent - 7.5).abs() < 1e-9);
    assert!((result.total_dividends_reinvested - 100.0).abs() < 1e-9);
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn intraday_bar_inside_window_wins_over_close() {
    let mut provider = FakeProvider::with_daily(january_bars());
    provider.intraday.insert(
        date(2024, 1, 8),
        vec![
            intraday(2024, 1, 8, 11, 15, 90.0),
            intraday(2024, 1, 8, 12, 15, 84.5),
            intraday(2024, 1, 8, 13, 15, 70.0),
        ],
    );

    let result = run_simulation(&provider, &january_request()).await.unwrap();

    let record = &result.ledger[0];
    assert_eq!(record.price_source, PriceTier::IntradayWindow);
    assert!((record.reinvest_price - 84.5).abs() < 1e-9);
    assert!((record.shares_purchased - 100.0 / 84.5).abs() < 1e-9);
    // final valuation still uses the last daily close
    assert_eq!(result.final_price, 85.0);
}

#[tokio::test]
async fn intraday_outside_window_falls_back_to_close() {
    let mut provider = FakeProvider::with_daily(january_bars());
    provider.intraday.insert(
        date(2024, 1, 8),
        vec![
            intraday(2024, 1, 8, 9, 30, 90.0),
            intraday(2024, 1, 8, 13, 0, 70.0),
        ],
    );

    let result = run_simulation(&provider, &january_request()).await.unwrap();
    assert_eq!(result.ledger[0].price_source, PriceTier::ExactClose);
    assert_eq!(result.ledger[0].reinvest_price, 85.0);
}

#[tokio::test]
async fn no_dividends_leaves_position_unchanged() {
    let provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 2, 80.0, 81.0, 0.0),
        bar(2024, 1, 5, 82.0, 83.0, 0.0),
        bar(2024, 1, 8, 84.0, 85.0, 0.0),
    ]);

    let result = run_simulation(&provider, &january_request()).await.unwrap();

    assert!(result.ledger.is_empty());
    assert_eq!(result.final_shares, 100.0);
    assert!((result.final_value - 8500.0).abs() < 1e-9);
    assert!((result.total_return_percent - 6.25).abs() < 1e-9);
    assert!(provider.intraday_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dividend_reinvested_after_end_is_skipped() {
    // Friday dividend, end date Saturday: Monday reinvestment is out of range
    let provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 2, 80.0, 81.0, 0.0),
        bar(2024, 1, 5, 82.0, 83.0, 1.0),
    ]);
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 6), 100.0)
        .with_initial_price(80.0);

    let result = run_simulation(&provider, &request).await.unwrap();

    assert!(result.ledger.is_empty());
    assert_eq!(result.final_shares, 100.0);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].dividend_date, date(2024, 1, 5));
    assert_eq!(result.skipped[0].reinvest_date, Some(date(2024, 1, 8)));
    assert_eq!(result.total_dividends_reinvested, 0.0);
}

#[tokio::test]
async fn reinvestment_on_end_date_is_processed_at_as_of_close() {
    // Daily history excludes the end date, so 2024-01-08 resolves to the prior close
    let provider = FakeProvider::with_daily(january_bars());
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 8), 100.0)
        .with_initial_price(80.0);

    let result = run_simulation(&provider, &request).await.unwrap();

    assert_eq!(result.ledger.len(), 1);
    assert_eq!(result.ledger[0].reinvest_date, date(2024, 1, 8));
    assert_eq!(result.ledger[0].price_source, PriceTier::AsOfClose);
    assert_eq!(result.ledger[0].reinvest_price, 83.0);
    assert_eq!(result.final_price, 83.0);
}

#[tokio::test]
async fn holiday_reinvestment_uses_previous_close() {
    // 2024-01-15 is a market holiday; no bar exists for it
    let provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 11, 80.0, 80.5, 0.0),
        bar(2024, 1, 12, 81.0, 81.5, 0.25),
        bar(2024, 1, 16, 82.0, 82.5, 0.0),
    ]);
    let request = SimulationRequest::new("SCHD", date(2024, 1, 11), date(2024, 1, 17), 40.0);

    let result = run_simulation(&provider, &request).await.unwrap();

    assert_eq!(result.initial_price, 80.0);
    let record = &result.ledger[0];
    assert_eq!(record.reinvest_date, date(2024, 1, 15));
    assert_eq!(record.price_source, PriceTier::AsOfClose);
    assert_eq!(record.reinvest_price, 81.5);
    assert!((record.total_cash_received - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn shares_never_decrease_across_many_dividends() {
    let provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 2, 50.0, 50.0, 0.0),
        bar(2024, 1, 3, 50.0, 51.0, 0.4),
        bar(2024, 1, 4, 51.0, 52.0, 0.0),
        bar(2024, 1, 10, 52.0, 53.0, 0.4),
        bar(2024, 1, 11, 53.0, 54.0, 0.0),
        bar(2024, 1, 19, 54.0, 55.0, 0.4),
        bar(2024, 1, 22, 55.0, 56.0, 0.0),
    ]);
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 23), 250.0);

    let result = run_simulation(&provider, &request).await.unwrap();

    assert_eq!(result.ledger.len(), 3);
    let mut previous = result.initial_shares;
    for record in &result.ledger {
        assert!(record.new_share_total >= previous);
        assert!(record.shares_purchased > 0.0);
        previous = record.new_share_total;
    }
    assert_eq!(result.final_shares, previous);
    // Friday 2024-01-19 rolls to Monday 2024-01-22
    assert_eq!(result.ledger[2].reinvest_date, date(2024, 1, 22));
    // later events accrue on the larger balance
    assert!(result.ledger[1].total_cash_received > result.ledger[0].total_cash_received);
}

#[tokio::test]
async fn unsorted_history_is_normalized() {
    let mut bars = january_bars();
    bars.reverse();
    bars.push(bar(2024, 1, 5, 82.0, 83.0, 1.0));
    let provider = FakeProvider::with_daily(bars);

    let result = run_simulation(&provider, &january_request()).await.unwrap();

    assert_eq!(result.ledger.len(), 1);
    assert!((result.total_return_percent - 7.5).abs() < 1e-9);
}

// ============================================================================
// Fallback chain
// ============================================================================

#[tokio::test]
async fn intraday_error_falls_back_to_close() {
    let mut provider = FakeProvider::with_daily(january_bars());
    provider.intraday_error = true;

    let result = run_simulation(&provider, &january_request()).await.unwrap();

    assert_eq!(result.ledger[0].price_source, PriceTier::ExactClose);
    assert!((result.total_return_percent - 7.5).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn intraday_timeout_falls_back_to_close() {
    let mut provider = FakeProvider::with_daily(january_bars());
    provider
        .intraday
        .insert(date(2024, 1, 8), vec![intraday(2024, 1, 8, 12, 30, 10.0)]);
    provider.intraday_delay = Some(Duration::from_secs(60));

    let config = SimulationConfig {
        intraday_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let result = Simulator::new(&provider, config)
        .run(&january_request())
        .await
        .unwrap();

    assert_eq!(result.ledger[0].price_source, PriceTier::ExactClose);
    assert_eq!(result.ledger[0].reinvest_price, 85.0);
}

#[tokio::test]
async fn every_tier_empty_is_unresolved() {
    let provider = FakeProvider::with_daily(january_bars());
    let config = SimulationConfig {
        tiers: vec![PriceTier::IntradayWindow],
        ..Default::default()
    };

    let err = Simulator::new(&provider, config)
        .run(&january_request())
        .await
        .unwrap_err();

    assert!(matches!(err, DripError::UnresolvedPrice { date: d } if d == date(2024, 1, 8)));
}

#[tokio::test]
async fn sequential_prefetch_preserves_event_order() {
    let provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 2, 50.0, 50.0, 0.0),
        bar(2024, 1, 3, 50.0, 51.0, 0.4),
        bar(2024, 1, 4, 51.0, 52.0, 0.0),
        bar(2024, 1, 10, 52.0, 53.0, 0.4),
        bar(2024, 1, 11, 53.0, 54.0, 0.0),
    ]);
    let config = SimulationConfig {
        prefetch_concurrency: 1,
        ..Default::default()
    };
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 12), 10.0);

    let result = Simulator::new(&provider, config).run(&request).await.unwrap();

    assert_eq!(
        *provider.intraday_calls.lock().unwrap(),
        vec![date(2024, 1, 4), date(2024, 1, 11)]
    );
    assert_eq!(result.ledger[0].reinvest_date, date(2024, 1, 4));
    assert_eq!(result.ledger[1].reinvest_date, date(2024, 1, 11));
}

#[tokio::test(start_paused = true)]
async fn concurrent_prefetch_applies_slices_in_date_order() {
    let mut provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 2, 50.0, 50.0, 0.0),
        bar(2024, 1, 3, 50.0, 51.0, 1.0),
        bar(2024, 1, 4, 51.0, 52.0, 0.0),
        bar(2024, 1, 10, 52.0, 53.0, 1.0),
        bar(2024, 1, 11, 53.0, 54.0, 0.0),
        bar(2024, 1, 16, 54.0, 55.0, 1.0),
        bar(2024, 1, 17, 55.0, 56.0, 0.0),
    ]);
    // Earlier slices finish last.
    let prices = [
        (date(2024, 1, 4), 40.0, 3),
        (date(2024, 1, 11), 50.0, 2),
        (date(2024, 1, 17), 25.0, 1),
    ];
    for (day, price, delay_secs) in prices {
        provider.intraday.insert(day, vec![intraday(2024, 1, day.day(), 12, 0, price)]);
        provider.intraday_delays.insert(day, Duration::from_secs(delay_secs));
    }
    let config = SimulationConfig {
        prefetch_concurrency: 4,
        ..Default::default()
    };
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 19), 10.0);

    let result = Simulator::new(&provider, config).run(&request).await.unwrap();

    assert_eq!(result.ledger.len(), 3);
    let mut shares_before = 10.0;
    for (record, (day, price, _)) in result.ledger.iter().zip(prices) {
        assert_eq!(record.reinvest_date, day);
        assert_eq!(record.price_source, PriceTier::IntradayWindow);
        assert_eq!(record.reinvest_price, price);
        assert!((record.total_cash_received - shares_before).abs() < 1e-9);
        assert!((record.new_share_total - (shares_before + shares_before / price)).abs() < 1e-9);
        shares_before = record.new_share_total;
    }
    assert!((result.final_shares - shares_before).abs() < 1e-9);
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn empty_history_is_data_unavailable() {
    let provider = FakeProvider::with_daily(Vec::new());

    let err = run_simulation(&provider, &january_request()).await.unwrap_err();

    assert!(matches!(err, DripError::DataUnavailable { symbol, .. } if symbol == "SCHD"));
}

#[tokio::test]
async fn provider_error_is_data_unavailable() {
    let provider = FakeProvider {
        daily_error: Some("connection reset".to_string()),
        ..Default::default()
    };

    let err = run_simulation(&provider, &january_request()).await.unwrap_err();

    match err {
        DripError::DataUnavailable { reason, .. } => assert!(reason.contains("connection reset")),
        other => panic!("expected DataUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn zero_shares_is_zero_initial_investment() {
    let provider = FakeProvider::with_daily(january_bars());
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 9), 0.0)
        .with_initial_price(80.0);

    let err = run_simulation(&provider, &request).await.unwrap_err();

    assert!(matches!(
        err,
        DripError::Division(DivisionError::ZeroInitialInvestment)
    ));
}

#[tokio::test]
async fn zero_close_aborts_with_division_error() {
    let provider = FakeProvider::with_daily(vec![
        bar(2024, 1, 2, 80.0, 81.0, 0.0),
        bar(2024, 1, 5, 82.0, 83.0, 1.0),
        bar(2024, 1, 8, 84.0, 0.0, 0.0),
    ]);

    let err = run_simulation(&provider, &january_request()).await.unwrap_err();

    assert!(matches!(
        err,
        DripError::Division(DivisionError::NonPositivePrice { price, .. }) if price == 0.0
    ));
}

#[tokio::test]
async fn invalid_request_fails_before_fetch() {
    let provider = FakeProvider::with_daily(january_bars());
    let request = SimulationRequest::new("SCHD", date(2024, 1, 2), date(2024, 1, 9), -5.0);

    let err = run_simulation(&provider, &request).await.unwrap_err();

    assert!(matches!(err, DripError::InvalidInput(_)));
    assert_eq!(provider.daily_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn lowercase_symbol_is_normalized() {
    let provider = FakeProvider::with_daily(january_bars());
    let request = SimulationRequest::new("schd", date(2024, 1, 2), date(2024, 1, 9), 100.0)
        .with_initial_price(80.0);

    let result = run_simulation(&provider, &request).await.unwrap();
    assert_eq!(result.symbol, "SCHD");
}
