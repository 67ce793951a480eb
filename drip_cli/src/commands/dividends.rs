//! The `dividends` subcommand: lists the dividend events in a range with
//! their reinvestment dates, without running the simulation.

use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use drip_lib::market_data::dividend_events;
use drip_lib::simulation::plan_reinvestments;
use drip_lib::{validation, DripConfig, MarketDataProvider, Simulator};
use serde::Serialize;

use super::{resolve_end_date, spinner};
use crate::output::{
    print_dividends_csv, print_dividends_markdown, print_dividends_table, print_json,
    OutputFormat, NO_DIVIDENDS_NOTICE,
};

/// Arguments for the `dividends` subcommand.
#[derive(Args)]
pub struct DividendsArgs {
    /// Ticker symbol (e.g., SCHD)
    #[arg(long, default_value = "SCHD")]
    pub ticker: String,

    /// Range start (YYYY-MM-DD)
    #[arg(long, default_value = "2020-01-01")]
    pub start: String,

    /// Range end (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub end: Option<String>,
}

/// A dividend event and what the simulator would do with it.
#[derive(Debug, Clone, Serialize)]
pub struct DividendScheduleEntry {
    pub dividend_date: NaiveDate,
    pub dividend_per_share: f64,
    pub reinvest_date: Option<NaiveDate>,
    pub reinvested: bool,
}

pub async fn run(
    args: &DividendsArgs,
    provider: &dyn MarketDataProvider,
    config: &DripConfig,
    format: &OutputFormat,
) -> Result<()> {
    let ticker = validation::validate_ticker(&args.ticker)?;
    let start = validation::validate_date(&args.start)?;
    let end = resolve_end_date(args.end.as_deref(), config.exchange_timezone)?;
    validation::validate_date_range(start, end)?;

    let simulator = Simulator::new(provider, config.simulation_config());
    let pb = spinner(&format!("Fetching dividend history for {}...", ticker));
    let daily = simulator.fetch_daily(&ticker, start, end).await;
    pb.finish_and_clear();
    let daily = daily?;

    let (planned, skipped) = plan_reinvestments(&dividend_events(&daily), end);
    let mut entries: Vec<DividendScheduleEntry> = planned
        .iter()
        .map(|p| DividendScheduleEntry {
            dividend_date: p.event.payment_date,
            dividend_per_share: p.event.dividend_per_share,
            reinvest_date: Some(p.reinvest_date),
            reinvested: true,
        })
        .chain(skipped.iter().map(|s| DividendScheduleEntry {
            dividend_date: s.dividend_date,
            dividend_per_share: s.dividend_per_share,
            reinvest_date: s.reinvest_date,
            reinvested: false,
        }))
        .collect();
    entries.sort_by_key(|e| e.dividend_date);

    if entries.is_empty() {
        eprintln!("{}", NO_DIVIDENDS_NOTICE);
        return Ok(());
    }

    let total: f64 = entries.iter().map(|e| e.dividend_per_share).sum();
    eprintln!(
        "{} dividend(s) for {} totalling ${:.4}/share",
        entries.len(),
        ticker,
        total
    );

    match format {
        OutputFormat::Table => print_dividends_table(&entries),
        OutputFormat::Markdown => print_dividends_markdown(&entries),
        OutputFormat::Csv => print_dividends_csv(&entries)?,
        OutputFormat::Json => print_json(&entries),
    }

    Ok(())
}
