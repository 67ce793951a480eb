//! Library layer for the DRIP backtester: dividend reinvestment simulation,
//! price resolution, and market data providers.
//!
//! The simulator is a pure async function of a [`MarketDataProvider`] and a
//! [`SimulationRequest`]. Yahoo Finance and Tiingo adapters are provided.

pub mod config;
pub mod error;
pub mod market_data;
pub mod metrics;
pub mod pricing;
pub mod schedule;
pub mod simulation;
pub mod tiingo;
pub mod validation;
pub mod yahoo;

pub use config::{ConfigError, DripConfig, ProviderKind};
pub use error::{DivisionError, DripError};
pub use market_data::{
    DailyBar, DividendEvent, IntradayBar, Interval, MarketDataProvider, ProviderError,
};
pub use metrics::SummaryMetrics;
pub use pricing::{PriceTier, ReinvestWindow, ResolvedPrice, DEFAULT_TIERS};
pub use simulation::{
    run_simulation, SimulationConfig, SimulationRequest, SimulationResult, Simulator,
    SkippedDividend, TransactionRecord,
};
pub use tiingo::{TiingoClient, TiingoError};
pub use yahoo::{YahooClient, YahooError};
