mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use drip_lib::{DripConfig, MarketDataProvider, ProviderKind, TiingoClient, YahooClient};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "drip")]
#[command(about = "Backtest a dividend reinvestment plan (DRIP) against historical prices")]
struct Cli {
    /// Output format: table, json, csv, markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Market data provider: yahoo or tiingo (overrides config and DRIP_PROVIDER)
    #[arg(long, global = true)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate reinvesting every dividend and report total return
    Simulate(commands::simulate::SimulateArgs),
    /// List dividend events and their reinvestment dates
    Dividends(commands::dividends::DividendsArgs),
}

fn build_provider(config: &DripConfig) -> Result<Box<dyn MarketDataProvider>> {
    let provider: Box<dyn MarketDataProvider> = match config.provider {
        ProviderKind::Yahoo => Box::new(YahooClient::new(config.exchange_timezone)?),
        ProviderKind::Tiingo => {
            let api_key = config
                .tiingo_api_key
                .clone()
                .ok_or_else(|| anyhow!("TIINGO_API_KEY is required when the provider is tiingo"))?;
            Box::new(TiingoClient::new(api_key, config.exchange_timezone)?)
        }
    };
    Ok(provider)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("drip=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = OutputFormat::parse(&cli.output)?;

    let mut config = DripConfig::load(cli.config.as_deref())?;
    if let Some(provider) = &cli.provider {
        config.provider = provider.parse::<ProviderKind>().map_err(|e| anyhow!(e))?;
    }
    config.validate()?;
    tracing::debug!(
        "Using {} provider, exchange timezone {}",
        config.provider,
        config.exchange_timezone
    );

    let provider = build_provider(&config)?;

    match &cli.command {
        Commands::Simulate(args) => {
            commands::simulate::run(args, provider.as_ref(), &config, &format).await?
        }
        Commands::Dividends(args) => {
            commands::dividends::run(args, provider.as_ref(), &config, &format).await?
        }
    }

    Ok(())
}
