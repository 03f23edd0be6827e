//! Market-data session against the simulated front: handshake, capture,
//! failure paths and teardown

use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use hermes_core::{Credentials, MarketDataRecord};
use hermes_gateway::messages::DepthMarketData;
use hermes_gateway::{GatewayEvent, GatewayRequest, RequestKind, SimulatorFactory, SimulatorScript};
use hermes_registry::{ContractRegistry, ExchangeFilter, ProductCatalog};
use hermes_session::{
    HandshakeError, JOIN_TIMEOUT, MarketData, MarketDataSession, SessionConfig, SessionError, SessionState,
    ShutdownSignal,
};
use hermes_storage::{
    BackendKind, BufferedCollector, SaveReport, StorageBackend, StorageSettings, open_collector, open_reader,
};
use tempfile::TempDir;

fn registry() -> Arc<ContractRegistry> {
    let catalog = ProductCatalog::new()
        .with_exchange("SHFE", &["rb", "ag"])
        .with_exchange("DCE", &["m"]);
    Arc::new(ContractRegistry::generate(&catalog, NaiveDate::from_ymd_opt(2025, 12, 15).unwrap()).unwrap())
}

fn config() -> SessionConfig {
    SessionConfig::new("tcp://127.0.0.1:41213", Credentials::new("9999", "000001", "secret"))
        .with_production_mode(false)
        .with_handshake_timeout(Duration::from_millis(400))
}

fn tick(instrument: &str, price: f64, millis: i32) -> DepthMarketData {
    DepthMarketData::new(
        MarketDataRecord::new(instrument)
            .with_last(price, 1)
            .with_time("20251215", "10:15:00", millis)
            .with_top_of_book(price - 1.0, 5, price + 1.0, 7),
    )
}

fn variant(registry: Arc<ContractRegistry>, filter: ExchangeFilter, settings: &StorageSettings) -> MarketData {
    let collectors = filter
        .resolve(&registry)
        .iter()
        .map(|exchange| open_collector(settings, exchange, registry.clone()).unwrap())
        .collect();
    MarketData::new(registry, filter, collectors)
}

async fn wait_until(mut done: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

#[tokio::test]
async fn test_handshake_subscribes_and_stores_ticks() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let settings = StorageSettings::new(BackendKind::Sqlite, dir.path()).with_buffer_size(2);
    let registry = registry();

    let ticks = vec![
        tick("rb2601", 3100.0, 0),
        tick("ag2512", 7400.0, 0),
        tick("rb2601", 3101.0, 500),
        tick("rb2601", 3102.0, 0),
        tick("ag2512", 7401.0, 500),
    ];
    let factory = SimulatorFactory::new(SimulatorScript::new().with_ticks(ticks));
    let session = MarketDataSession::new(
        config(),
        &factory,
        variant(registry.clone(), ExchangeFilter::only(["SHFE"]), &settings),
        ShutdownSignal::new(),
    )
    .unwrap();

    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert!(session.is_healthy());
    assert_eq!(
        session.subscribed_instruments(),
        vec!["rb2601", "rb2512", "ag2601", "ag2512"]
    );

    let md = session.variant();
    assert!(wait_until(|| md.ticks() == 5, Duration::from_secs(2)).await);
    assert_eq!(md.confirmed(), 4);

    // routed nowhere: not in the catalog
    let gateway = factory.last().unwrap();
    gateway.inject(GatewayEvent::MarketData(tick("i2601", 800.0, 0)));
    assert!(wait_until(|| md.dropped() == 1, Duration::from_secs(2)).await);

    session.stop().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(gateway.is_released());

    let stats = md.collector_stats();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].0, "SHFE");
    assert_eq!(stats[0].1.written, 5);

    let mut reader = open_reader(BackendKind::Sqlite, &settings.backend_dir(), "SHFE").unwrap();
    assert_eq!(reader.list_tables().unwrap(), vec!["ag2512", "rb2601"]);
    let rb = reader.load("rb2601", None).unwrap();
    assert_eq!(rb.len(), 3);
    assert_eq!(rb[2].last_price, 3102.0);
}

#[tokio::test]
async fn test_filter_without_catalog_exchange_goes_active_empty() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let settings = StorageSettings::new(BackendKind::Csv, dir.path());
    let factory = SimulatorFactory::new(SimulatorScript::new());
    let session = MarketDataSession::new(
        config(),
        &factory,
        variant(registry(), ExchangeFilter::only(["CZCE"]), &settings),
        ShutdownSignal::new(),
    )
    .unwrap();

    session.start().await.unwrap();
    assert_eq!(session.state(), SessionState::Active);
    assert!(session.subscribed_instruments().is_empty());

    let gateway = factory.last().unwrap();
    assert!(wait_until(|| gateway.sent_requests().len() == 2, Duration::from_secs(1)).await);
    let sent = gateway.sent_requests();
    assert_eq!(
        sent[1].1,
        GatewayRequest::SubscribeMarketData {
            instruments: Vec::new()
        }
    );
    session.stop().await;
}

#[tokio::test]
async fn test_login_rejection_is_fatal() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let settings = StorageSettings::new(BackendKind::Csv, dir.path());
    let factory = SimulatorFactory::new(SimulatorScript::new().rejecting(RequestKind::Login, 3, "invalid login"));
    let shutdown = ShutdownSignal::new();
    let session = MarketDataSession::new(
        config(),
        &factory,
        variant(registry(), ExchangeFilter::All, &settings),
        shutdown.clone(),
    )
    .unwrap();

    let err = session.start().await.unwrap_err();
    assert!(err.is_fatal());
    match err {
        SessionError::Handshake(HandshakeError::Rejected {
            step,
            error_id,
            message,
            ..
        }) => {
            assert_eq!(step, RequestKind::Login);
            assert_eq!(error_id, 3);
            assert_eq!(message, "invalid login");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.state(), SessionState::Failed);
    assert!(shutdown.is_triggered());
    assert!(!session.is_healthy());

    // nothing past login was attempted
    let sent = factory.last().unwrap().sent_requests();
    assert_eq!(sent.len(), 1);
    session.stop().await;
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_silent_subscribe_times_out() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let settings = StorageSettings::new(BackendKind::Csv, dir.path());
    let factory = SimulatorFactory::new(SimulatorScript::new().silent_on(RequestKind::SubscribeMarketData));
    let session = MarketDataSession::new(
        config(),
        &factory,
        variant(registry(), ExchangeFilter::All, &settings),
        ShutdownSignal::new(),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    let err = session.start().await.unwrap_err();
    assert!(started.elapsed() < config().start_timeout() + Duration::from_millis(200));
    match err {
        SessionError::Handshake(HandshakeError::TimedOut { state, .. }) => {
            assert_eq!(state, SessionState::Subscribing);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.shutdown_signal().is_triggered());
}

#[tokio::test]
async fn test_disconnect_before_login_fails_start() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let settings = StorageSettings::new(BackendKind::Csv, dir.path());
    let factory = SimulatorFactory::new(SimulatorScript::new().without_connect());
    let session = MarketDataSession::new(
        config(),
        &factory,
        variant(registry(), ExchangeFilter::All, &settings),
        ShutdownSignal::new(),
    )
    .unwrap();

    // queued now, delivered once the front starts
    factory
        .last()
        .unwrap()
        .inject(GatewayEvent::FrontDisconnected { reason: 0x2001 });

    let err = session.start().await.unwrap_err();
    match err {
        SessionError::Handshake(HandshakeError::Disconnected { reason }) => assert_eq!(reason, 0x2001),
        other => panic!("unexpected error: {other}"),
    }
    assert!(
        HandshakeError::Disconnected { reason: 0x2001 }
            .to_string()
            .contains("heartbeat receive timeout")
    );
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!session.core().is_logged_in());
}

#[tokio::test]
async fn test_stop_is_idempotent_and_start_only_once() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let settings = StorageSettings::new(BackendKind::Columnar, dir.path());
    let factory = SimulatorFactory::new(SimulatorScript::new());
    let session = MarketDataSession::new(
        config(),
        &factory,
        variant(registry(), ExchangeFilter::only(["DCE"]), &settings),
        ShutdownSignal::new(),
    )
    .unwrap();

    session.start().await.unwrap();
    assert!(matches!(session.start().await, Err(SessionError::AlreadyStarted)));

    session.stop().await;
    session.stop().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(factory.last().unwrap().is_released());
    assert!(session.shutdown_signal().is_triggered());
    assert_eq!(factory.created(), 1);
}

/// Backend whose first save blocks until `resume` fires or is dropped
struct StalledBackend {
    entered: mpsc::Sender<()>,
    resume: mpsc::Receiver<()>,
}

impl StorageBackend for StalledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn save(&mut self, records: &[MarketDataRecord]) -> hermes_storage::Result<SaveReport> {
        let _ = self.entered.send(());
        let _ = self.resume.recv();
        Ok(SaveReport {
            written: records.len(),
            partitions: 1,
            rejected: Vec::new(),
        })
    }

    fn load(&mut self, _table: &str, _limit: Option<usize>) -> hermes_storage::Result<Vec<MarketDataRecord>> {
        Ok(Vec::new())
    }

    fn list_tables(&mut self) -> hermes_storage::Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn close(&mut self) -> hermes_storage::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_stop_is_bounded_while_a_flush_is_stuck() {
    let _ = env_logger::try_init();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    let backend = StalledBackend {
        entered: entered_tx,
        resume: resume_rx,
    };
    let collector = BufferedCollector::new("SHFE", Box::new(backend), 1).unwrap();
    let variant = MarketData::new(registry(), ExchangeFilter::only(["SHFE"]), vec![collector]);

    let factory = SimulatorFactory::new(SimulatorScript::new().with_ticks(vec![tick("rb2601", 3100.0, 0)]));
    let session = MarketDataSession::new(config(), &factory, variant, ShutdownSignal::new()).unwrap();
    session.start().await.unwrap();

    // the delivery thread is now parked inside save
    let entered = tokio::task::spawn_blocking(move || entered_rx.recv_timeout(Duration::from_secs(2)))
        .await
        .unwrap();
    assert!(entered.is_ok());

    let started = Instant::now();
    session.stop().await;
    let elapsed = started.elapsed();
    assert!(elapsed < JOIN_TIMEOUT * 3, "stop took {elapsed:?}");
    assert!(factory.last().unwrap().is_released());
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(session.variant().collector_stats().is_empty());

    drop(resume_tx);
}
