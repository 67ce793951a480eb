//! The `simulate` subcommand: runs a DRIP backtest and prints the summary,
//! input recap and reinvestment ledger.

use anyhow::Result;
use clap::Args;
use drip_lib::{validation, DripConfig, MarketDataProvider, SimulationRequest, Simulator};

use super::{resolve_end_date, spinner};
use crate::output::{
    print_json, print_simulation_csv, print_simulation_markdown, print_simulation_table,
    OutputFormat,
};

/// Arguments for the `simulate` subcommand.
#[derive(Args)]
pub struct SimulateArgs {
    /// Ticker symbol (e.g., SCHD, VYM, BRK-B)
    #[arg(long, default_value = "SCHD")]
    pub ticker: String,

    /// Initial purchase date (YYYY-MM-DD)
    #[arg(long, default_value = "2020-01-01")]
    pub start: String,

    /// Evaluation end date (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub end: Option<String>,

    /// Initial share quantity
    #[arg(long, default_value_t = 100.0)]
    pub shares: f64,

    /// Initial purchase price per share; 0 uses the market open on the start date
    #[arg(long, default_value_t = 0.0)]
    pub price: f64,
}

pub async fn run(
    args: &SimulateArgs,
    provider: &dyn MarketDataProvider,
    config: &DripConfig,
    format: &OutputFormat,
) -> Result<()> {
    let ticker = validation::validate_ticker(&args.ticker)?;
    let start = validation::validate_date(&args.start)?;
    let end = resolve_end_date(args.end.as_deref(), config.exchange_timezone)?;

    let request =
        SimulationRequest::new(&ticker, start, end, args.shares).with_initial_price(args.price);
    let simulator = Simulator::new(provider, config.simulation_config());

    let pb = spinner(&format!(
        "Fetching market data for {} from {}...",
        ticker,
        provider.name()
    ));
    let outcome = simulator.run(&request).await;
    pb.finish_and_clear();
    let result = outcome?;

    if !result.skipped.is_empty() {
        eprintln!(
            "{} dividend(s) skipped: reinvestment date falls after {}",
            result.skipped.len(),
            result.end
        );
    }

    match format {
        OutputFormat::Table => print_simulation_table(&result),
        OutputFormat::Markdown => print_simulation_markdown(&result),
        OutputFormat::Csv => print_simulation_csv(&result)?,
        OutputFormat::Json => print_json(&result),
    }

    Ok(())
}
