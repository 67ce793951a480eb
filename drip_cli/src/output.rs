use anyhow::Result;
use drip_lib::{SimulationResult, TransactionRecord};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::commands::dividends::DividendScheduleEntry;

pub const NO_DIVIDENDS_NOTICE: &str = "No dividends found for this period.";

#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => anyhow::bail!(
                "unknown output format '{}'. Valid values: table, json, csv, markdown",
                other
            ),
        }
    }
}

#[derive(Tabled, Serialize)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    #[serde(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Tabled, Serialize)]
struct ParameterRow {
    #[tabled(rename = "Parameter")]
    #[serde(rename = "Parameter")]
    parameter: String,
    #[tabled(rename = "Value")]
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Tabled, Serialize)]
struct LedgerRow {
    #[tabled(rename = "Dividend Date")]
    #[serde(rename = "Dividend Date")]
    dividend_date: String,
    #[tabled(rename = "Dividend/Share")]
    #[serde(rename = "Dividend/Share")]
    dividend_per_share: String,
    #[tabled(rename = "Total Div Amount")]
    #[serde(rename = "Total Div Amount")]
    total_cash: String,
    #[tabled(rename = "Reinvest Date")]
    #[serde(rename = "Reinvest Date")]
    reinvest_date: String,
    #[tabled(rename = "Reinvest Price")]
    #[serde(rename = "Reinvest Price")]
    reinvest_price: String,
    #[tabled(rename = "Price Source")]
    #[serde(rename = "Price Source")]
    price_source: String,
    #[tabled(rename = "Shares Purchased")]
    #[serde(rename = "Shares Purchased")]
    shares_purchased: String,
    #[tabled(rename = "New Share Total")]
    #[serde(rename = "New Share Total")]
    new_share_total: String,
    #[tabled(rename = "Total Value")]
    #[serde(rename = "Total Value")]
    position_value: String,
}

#[derive(Tabled, Serialize)]
struct DividendRow {
    #[tabled(rename = "Dividend Date")]
    #[serde(rename = "Dividend Date")]
    dividend_date: String,
    #[tabled(rename = "Dividend/Share")]
    #[serde(rename = "Dividend/Share")]
    dividend_per_share: String,
    #[tabled(rename = "Reinvest Date")]
    #[serde(rename = "Reinvest Date")]
    reinvest_date: String,
    #[tabled(rename = "Status")]
    #[serde(rename = "Status")]
    status: String,
}

// -- Row builders --

fn build_summary_rows(result: &SimulationResult) -> Vec<SummaryRow> {
    vec![
        SummaryRow {
            metric: "Initial Investment".to_string(),
            value: format_money(result.initial_investment),
        },
        SummaryRow {
            metric: "Ending Share Value".to_string(),
            value: format_money(result.final_value),
        },
        SummaryRow {
            metric: "Total Return ($)".to_string(),
            value: format_money(result.total_return_amount),
        },
        SummaryRow {
            metric: "Total Return (%)".to_string(),
            value: format!("{:.2}%", result.total_return_percent),
        },
    ]
}

fn build_parameter_rows(result: &SimulationResult) -> Vec<ParameterRow> {
    let row = |parameter: &str, value: String| ParameterRow {
        parameter: parameter.to_string(),
        value,
    };
    vec![
        row("Ticker", result.symbol.clone()),
        row("Start Date", result.start.to_string()),
        row("End Date", result.end.to_string()),
        row("Initial Shares", result.initial_shares.to_string()),
        row("Initial Buy Price", format!("${:.2}", result.initial_price)),
        row(
            "Final Share Balance",
            format!("{:.4} shares", result.final_shares),
        ),
    ]
}

fn build_ledger_rows(ledger: &[TransactionRecord]) -> Vec<LedgerRow> {
    ledger
        .iter()
        .map(|r| LedgerRow {
            dividend_date: r.dividend_date.to_string(),
            dividend_per_share: format!("${:.4}", r.dividend_per_share),
            total_cash: format!("${:.2}", r.total_cash_received),
            reinvest_date: r.reinvest_date.to_string(),
            reinvest_price: format!("${:.2}", r.reinvest_price),
            price_source: r.price_source.label().to_string(),
            shares_purchased: format!("{:.4}", r.shares_purchased),
            new_share_total: format!("{:.4}", r.new_share_total),
            position_value: format!("${:.2}", r.position_value_at_reinvest_price),
        })
        .collect()
}

fn build_dividend_rows(entries: &[DividendScheduleEntry]) -> Vec<DividendRow> {
    entries
        .iter()
        .map(|e| DividendRow {
            dividend_date: e.dividend_date.to_string(),
            dividend_per_share: format!("${:.4}", e.dividend_per_share),
            reinvest_date: e
                .reinvest_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            status: if e.reinvested {
                "reinvest".to_string()
            } else {
                "skipped (after end date)".to_string()
            },
        })
        .collect()
}

// -- Table output --

pub fn print_simulation_table(result: &SimulationResult) {
    println!("Investment Summary");
    println!("{}", Table::new(build_summary_rows(result)));
    println!();
    println!("Input Parameters");
    println!("{}", Table::new(build_parameter_rows(result)));
    println!();
    println!("Dividend Reinvestment Log (DRIP)");
    if result.ledger.is_empty() {
        println!("{}", NO_DIVIDENDS_NOTICE);
    } else {
        println!("{}", Table::new(build_ledger_rows(&result.ledger)));
    }
}

pub fn print_dividends_table(entries: &[DividendScheduleEntry]) {
    println!("{}", Table::new(build_dividend_rows(entries)));
}

// -- Markdown output --

fn markdown<T: Tabled>(rows: Vec<T>) -> String {
    let mut table = Table::new(rows);
    table.with(Style::markdown());
    table.to_string()
}

pub fn print_simulation_markdown(result: &SimulationResult) {
    println!("### Investment Summary\n");
    println!("{}\n", markdown(build_summary_rows(result)));
    println!("### Input Parameters\n");
    println!("{}\n", markdown(build_parameter_rows(result)));
    println!("### Dividend Reinvestment Log (DRIP)\n");
    if result.ledger.is_empty() {
        println!("{}", NO_DIVIDENDS_NOTICE);
    } else {
        println!("{}", markdown(build_ledger_rows(&result.ledger)));
    }
}

pub fn print_dividends_markdown(entries: &[DividendScheduleEntry]) {
    println!("{}", markdown(build_dividend_rows(entries)));
}

// -- CSV output --

/// CSV carries the ledger only; the summary goes to stderr.
pub fn print_simulation_csv(result: &SimulationResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in build_ledger_rows(&result.ledger) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    eprintln!(
        "{}: {} -> {} ({:.2}%)",
        result.symbol,
        format_money(result.initial_investment),
        format_money(result.final_value),
        result.total_return_percent
    );
    Ok(())
}

pub fn print_dividends_csv(entries: &[DividendScheduleEntry]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in build_dividend_rows(entries) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

// -- JSON output --

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

/// Dollar amount with thousands separators, e.g. `$8,600.00` or `-$12.50`.
fn format_money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}${}.{}", sign, grouped, cents)
}
