//! Market-data session: login, subscribe, capture ticks into per-exchange
//! collectors

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hermes_core::MarketDataRecord;
use hermes_gateway::messages::{DepthMarketData, GatewayEvent, GatewayRequest, LoginInfo, Response, SpecificInstrument};
use hermes_gateway::{ApiKind, Completion};
use hermes_registry::{ContractRegistry, ExchangeFilter};
use hermes_storage::{BufferedCollector, CollectorStats};
use indexmap::IndexMap;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, MutexGuard};

use crate::controller::SessionController;
use crate::dispatch::{SessionCore, SessionVariant};
use crate::state::SessionState;

/// Longest wait for a collector held by the delivery thread, on teardown
/// and stats reads
const COLLECTOR_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Market-data behaviour of a session
pub struct MarketData {
    registry: Arc<ContractRegistry>,
    filter: ExchangeFilter,
    /// One collector per exchange; each lock serialises its buffer
    collectors: IndexMap<String, Mutex<BufferedCollector>>,
    expected: AtomicUsize,
    answered: AtomicUsize,
    confirmed: AtomicUsize,
    ticks: AtomicUsize,
    dropped: AtomicUsize,
}

impl MarketData {
    /// Collectors are keyed by their name, which is their exchange
    pub fn new(registry: Arc<ContractRegistry>, filter: ExchangeFilter, collectors: Vec<BufferedCollector>) -> Self {
        let collectors = collectors
            .into_iter()
            .map(|c| (c.name().to_string(), Mutex::new(c)))
            .collect();
        Self {
            registry,
            filter,
            collectors,
            expected: AtomicUsize::new(0),
            answered: AtomicUsize::new(0),
            confirmed: AtomicUsize::new(0),
            ticks: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    pub fn filter(&self) -> &ExchangeFilter {
        &self.filter
    }

    /// Instruments this session subscribes to
    pub fn instruments(&self) -> Vec<String> {
        self.registry.subscription_list(&self.filter)
    }

    /// Subscriptions confirmed without error
    pub fn confirmed(&self) -> usize {
        self.confirmed.load(Ordering::SeqCst)
    }

    /// Ticks received, stored or not
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Ticks refused by routing
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Stats of every collector not stuck in a flush
    pub fn collector_stats(&self) -> Vec<(String, CollectorStats)> {
        self.collectors
            .iter()
            .filter_map(|(exchange, c)| Some((exchange.clone(), lock_bounded(exchange, c)?.stats().clone())))
            .collect()
    }

    /// Write every buffered record now
    pub fn flush_all(&self) {
        for (exchange, collector) in &self.collectors {
            if let Err(e) = collector.lock().flush() {
                error!("[md] flush of {exchange} collector failed: {e}");
            }
        }
    }

    fn on_subscribed(&self, core: &SessionCore<Self>, response: Response<SpecificInstrument>) {
        let instrument = response
            .payload
            .as_ref()
            .map(|s| s.instrument_id.clone())
            .unwrap_or_default();
        match response.error() {
            Some(info) => warn!(
                "[md] subscription to {instrument} rejected: [{}] {}",
                info.error_id, info.error_msg
            ),
            None => {
                self.confirmed.fetch_add(1, Ordering::SeqCst);
                debug!("[md] subscribed to {instrument}");
            }
        }

        let answered = self.answered.fetch_add(1, Ordering::SeqCst) + 1;
        let expected = self.expected.load(Ordering::SeqCst);
        if answered == expected && core.state() == SessionState::Subscribing {
            info!("[md] subscribed {} of {expected} instruments", self.confirmed());
            core.set_state(SessionState::Active);
        }
        core.table().deliver_response(response);
    }

    /// Push path: route the tick to its exchange's collector
    ///
    /// Blocks while that collector flushes.
    fn on_depth(&self, depth: DepthMarketData) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        let record = MarketDataRecord::from(depth);
        let exchange = match self.registry.route_record(&record) {
            Ok(partition) => partition.exchange.clone(),
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                warn!("[md] dropping tick: {e}");
                return;
            }
        };
        let Some(collector) = self.collectors.get(&exchange) else {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            warn!("[md] no collector for exchange {exchange}, dropping tick");
            return;
        };

        let mut collector = collector.lock();
        match collector.add(record) {
            Ok(Some(report)) => debug!("[md] {exchange} flushed {} records", report.written),
            Ok(None) => {}
            Err(e) => error!(
                "[md] {exchange} flush of {} records failed, will retry on next tick: {e}",
                collector.buffered()
            ),
        }
    }
}

impl SessionVariant for MarketData {
    const API: ApiKind = ApiKind::MarketData;
    const NAME: &'static str = "md";
    const AUTHENTICATE: bool = false;

    fn on_login(&self, core: &SessionCore<Self>, _login: &LoginInfo) {
        let instruments = self.instruments();
        self.expected.store(instruments.len(), Ordering::SeqCst);
        self.answered.store(0, Ordering::SeqCst);
        self.confirmed.store(0, Ordering::SeqCst);
        let request = GatewayRequest::SubscribeMarketData { instruments };

        if self.expected.load(Ordering::SeqCst) == 0 {
            warn!("[md] exchange filter {} selects no instruments", self.filter);
            core.set_state(SessionState::Active);
            if let Err(e) = core.request(&request, core.config().handshake_timeout, Completion::Count(0)) {
                warn!("[md] empty subscribe request failed: {e}");
            }
            return;
        }

        let expected = self.expected.load(Ordering::SeqCst);
        info!("[md] subscribing to {expected} instruments");
        core.handshake_step(SessionState::Subscribing, request, Completion::Count(expected));
    }

    fn on_event(&self, core: &SessionCore<Self>, event: GatewayEvent) {
        match event {
            GatewayEvent::SubscribeMarketData(response) => self.on_subscribed(core, response),
            GatewayEvent::MarketData(depth) => self.on_depth(depth),
            other => debug!("[md] ignoring {:?} callback", other.kind()),
        }
    }

    fn on_shutdown(&self) {
        for (exchange, collector) in &self.collectors {
            let Some(mut collector) = lock_bounded(exchange, collector) else {
                continue;
            };
            if let Err(e) = collector.close() {
                error!("[md] closing {exchange} collector failed: {e}");
            }
        }
    }
}

fn lock_bounded<'a>(exchange: &str, collector: &'a Mutex<BufferedCollector>) -> Option<MutexGuard<'a, BufferedCollector>> {
    let guard = collector.try_lock_for(COLLECTOR_LOCK_TIMEOUT);
    if guard.is_none() {
        warn!("[md] {exchange} collector still busy after {COLLECTOR_LOCK_TIMEOUT:?}, skipped");
    }
    guard
}

pub type MarketDataSession = SessionController<MarketData>;

impl SessionController<MarketData> {
    /// Instruments requested in the subscribe step
    pub fn subscribed_instruments(&self) -> Vec<String> {
        self.variant().instruments()
    }
}
