//! Hermes Runner - process entry points
//!
//! ```text
//!   CONF.yml ──▶ Settings ──▶ Bootstrap ──┬──▶ MarketDataSession ──▶ collectors ──▶ db/
//!                  │            │          └──▶ TradeSession
//!                  ▼            ▼
//!              logging      ContractRegistry (catalog + today)
//!
//!   SIGINT / SIGTERM ──▶ ShutdownSignal ──▶ stop()
//! ```
//!
//! - **Settings**: YAML loading, defaults and derived paths
//! - **Logging**: env_logger with a daily file tee
//! - **Bootstrap**: registry, collectors and session construction
//! - **App**: md / trade / query run modes and signal handling

pub mod app;
pub mod bootstrap;
pub mod logging;
pub mod settings;

pub use app::{
    DEFAULT_QUERY_LIMIT, install_signal_handlers, run_market_data, run_query, run_trade, wait_for_shutdown,
};
pub use bootstrap::Bootstrap;
pub use logging::init_logging;
pub use settings::{DEFAULT_CONFIG_FILE, Settings, load_config, load_config_from_str};
