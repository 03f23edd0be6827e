//! Settings file to stored ticks: bootstrap, market-data run, query, trade run

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use hermes_clock::FixedClock;
use hermes_registry::{ConfigError, ExchangeFilter};
use hermes_runner::{Bootstrap, Settings, load_config, run_market_data, run_query, run_trade};
use hermes_session::ShutdownSignal;
use hermes_storage::BackendKind;
use tempfile::TempDir;

const CATALOG: &str = r#"
SHFE:
  products:
    - "rb # rebar"
    - "ag # silver"
DCE:
  products:
    - "m # soybean meal"
"#;

fn write_settings(root: &Path) -> Settings {
    let conf = format!(
        r#"
APP_CONFIG:
  is_production_mode: false
  log_level: DEBUG
  root_path: {root}
  handshake_timeout_secs: 2
  request_timeout_secs: 1
  data_collection:
    db_type: sqlite
    buffer_size: 2
CTP_SERVER:
  SIMNOW:
    simulation:
      broker_id: "9999"
      investor_id: "000001"
      password: secret
      app_id: client_hermes_1.0
      auth_code: "0000000000000000"
      md_server: tcp://127.0.0.1:30011
      trader_server: tcp://127.0.0.1:30001
"#,
        root = root.display()
    );
    let conf_path = root.join("CONF.yml");
    fs::write(&conf_path, conf).unwrap();
    fs::create_dir_all(root.join("conf")).unwrap();
    fs::write(root.join("conf").join("instrument.yml"), CATALOG).unwrap();
    load_config(&conf_path).unwrap()
}

fn bootstrap(root: &Path) -> Bootstrap {
    let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 12, 15).unwrap());
    Bootstrap::new(write_settings(root), "SIMNOW", "simulation", &clock).unwrap()
}

fn query(bootstrap: &Bootstrap, container: &str, table: Option<&str>) -> Vec<String> {
    let dir = bootstrap.settings().storage().backend_dir();
    let mut out = Vec::new();
    let printed = run_query(BackendKind::Sqlite, &dir, container, table, 10, &mut out).unwrap();
    let lines: Vec<String> = String::from_utf8(out).unwrap().lines().map(str::to_string).collect();
    assert_eq!(printed, lines.len());
    lines
}

#[test]
fn test_bootstrap_prepares_working_tree() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let bootstrap = bootstrap(dir.path());

    for sub in ["logs", "conf", "streams", "db/sqlite3"] {
        assert!(dir.path().join(sub).is_dir(), "{sub} missing");
    }
    assert_eq!(bootstrap.registry().len(), 6);
    assert_eq!(bootstrap.registry().speculative(), vec!["rb2601", "ag2601", "m2601"]);
    assert_eq!(bootstrap.server().broker_id, "9999");

    let md = bootstrap.session_config(hermes_gateway::ApiKind::MarketData);
    assert_eq!(md.front_address, "tcp://127.0.0.1:30011");
    assert_eq!(md.handshake_timeout, Duration::from_secs(2));
}

#[test]
fn test_unknown_server_is_rejected() {
    let dir = TempDir::new().unwrap();
    let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 12, 15).unwrap());
    let result = Bootstrap::new(write_settings(dir.path()), "SIMNOW", "7x24", &clock);
    assert!(matches!(result, Err(ConfigError::UnknownServer { .. })));
}

#[tokio::test]
async fn test_market_data_run_then_query() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let bootstrap = bootstrap(dir.path());
    let factory = bootstrap.simulator();

    let shutdown = ShutdownSignal::new();
    run_market_data(
        &bootstrap,
        &factory,
        ExchangeFilter::All,
        shutdown.clone(),
        Some(Duration::from_millis(300)),
    )
    .await
    .unwrap();
    assert!(shutdown.reason().unwrap().contains("elapsed"));

    assert_eq!(query(&bootstrap, "SHFE", None), vec!["ag2601", "rb2601"]);
    assert_eq!(query(&bootstrap, "DCE", None), vec!["m2601"]);

    let rows = query(&bootstrap, "SHFE", Some("rb2601"));
    assert_eq!(rows.len(), 1);
    let record: serde_json::Value = serde_json::from_str(&rows[0]).unwrap();
    assert_eq!(record["InstrumentID"], "rb2601");
}

#[tokio::test]
async fn test_trade_run_logs_in_and_stops() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let bootstrap = bootstrap(dir.path());
    let factory = bootstrap.simulator();

    let shutdown = ShutdownSignal::new();
    run_trade(&bootstrap, &factory, shutdown.clone(), Some(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(shutdown.is_triggered());

    let gateway = factory.last().unwrap();
    assert!(gateway.sent_requests().len() >= 3);
}
