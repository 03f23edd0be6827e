//! Bootstrap - everything a session needs before it can start
//!
//! Resolves the server entry, creates the working directories, loads the
//! product catalog and derives today's contracts, then builds controllers
//! on top of that.

use std::sync::Arc;

use chrono::NaiveDate;
use hermes_clock::Clock;
use hermes_core::MarketDataRecord;
use hermes_gateway::messages::DepthMarketData;
use hermes_gateway::{ApiKind, GatewayFactory, SimulatorFactory, SimulatorScript};
use hermes_registry::{ConfigError, ContractRegistry, ExchangeFilter, ProductCatalog};
use hermes_session::{MarketData, MarketDataSession, SessionConfig, SessionError, ShutdownSignal, Trade, TradeSession};
use hermes_storage::{BufferedCollector, StorageError, open_collector};
use log::info;

use crate::settings::{ServerConfig, Settings};

/// Resolved settings plus today's contract registry
pub struct Bootstrap {
    settings: Settings,
    server: ServerConfig,
    today: NaiveDate,
    registry: Arc<ContractRegistry>,
}

impl Bootstrap {
    pub fn new(settings: Settings, platform: &str, environment: &str, clock: &dyn Clock) -> Result<Self, ConfigError> {
        settings.validate()?;
        let server = settings.server(platform, environment)?.clone();
        settings.ensure_directories()?;

        let today = clock.today();
        let catalog_path = settings.catalog_path();
        let catalog = ProductCatalog::load(&catalog_path)?;
        let registry = ContractRegistry::generate(&catalog, today)?;
        let months = registry.months();
        info!(
            "Bootstrap for {platform}/{environment} on {today} ({}): {} contracts across {} exchanges, speculative {} delivery {}",
            clock.name(),
            registry.len(),
            registry.exchanges().len(),
            months.speculative.suffix(),
            months.delivery.suffix()
        );

        Ok(Self {
            settings,
            server,
            today,
            registry: Arc::new(registry),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn registry(&self) -> &Arc<ContractRegistry> {
        &self.registry
    }

    /// Connection parameters for one front
    pub fn session_config(&self, api: ApiKind) -> SessionConfig {
        SessionConfig::new(self.server.front_address(api), self.server.credentials())
            .with_stream_path(self.settings.stream_prefix(self.today))
            .with_production_mode(self.settings.app.is_production_mode)
            .with_handshake_timeout(self.settings.handshake_timeout())
            .with_request_timeout(self.settings.request_timeout())
    }

    /// One collector per selected exchange
    pub fn collectors(&self, filter: &ExchangeFilter) -> Result<Vec<BufferedCollector>, StorageError> {
        let storage = self.settings.storage();
        filter
            .resolve(&self.registry)
            .iter()
            .map(|exchange| open_collector(&storage, exchange, self.registry.clone()))
            .collect()
    }

    pub fn market_data_session(
        &self,
        factory: &dyn GatewayFactory,
        filter: ExchangeFilter,
        shutdown: ShutdownSignal,
    ) -> Result<MarketDataSession, SessionError> {
        let collectors = self.collectors(&filter)?;
        info!("Market data session for {filter}: {} collectors", collectors.len());
        let variant = MarketData::new(self.registry.clone(), filter, collectors);
        MarketDataSession::new(self.session_config(ApiKind::MarketData), factory, variant, shutdown)
    }

    pub fn trade_session(&self, factory: &dyn GatewayFactory, shutdown: ShutdownSignal) -> Result<TradeSession, SessionError> {
        TradeSession::new(self.session_config(ApiKind::Trade), factory, Trade::new(), shutdown)
    }

    /// In-process front trading today, one opening tick per speculative
    /// contract
    pub fn simulator(&self) -> SimulatorFactory {
        let trading_day = self.today.format("%Y%m%d").to_string();
        let ticks = self
            .registry
            .speculative()
            .into_iter()
            .map(|code| {
                DepthMarketData::new(MarketDataRecord::new(code).with_time(&trading_day, "09:00:00", 0))
            })
            .collect();
        SimulatorFactory::new(SimulatorScript::new().with_trading_day(&trading_day).with_ticks(ticks))
    }
}
