//! Registry built from a catalog file on disk

use chrono::NaiveDate;
use hermes_clock::{Clock, FixedClock};
use hermes_registry::{ConfigError, ContractRegistry, ExchangeFilter, ProductCatalog};
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = r#"
SHFE:
  products:
    - "rb # rebar"
    - "cu # copper"
DCE:
  products:
    - "m # soybean meal"
CZCE:
  products:
    - "SA # soda ash"
"#;

fn write_catalog(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("instrument.yml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_registry_from_catalog_file() {
    let _ = env_logger::try_init();
    let dir = TempDir::new().unwrap();
    let catalog = ProductCatalog::load(write_catalog(&dir, CATALOG)).unwrap();

    let clock = FixedClock::on(NaiveDate::from_ymd_opt(2025, 12, 8).unwrap());
    let registry = ContractRegistry::generate(&catalog, clock.today()).unwrap();

    assert_eq!(registry.len(), 8);
    assert_eq!(registry.exchange_of("SA2601"), Some("CZCE"));
    assert_eq!(registry.exchange_of("cu2512"), Some("SHFE"));

    let filter: ExchangeFilter = "DCE,CZCE".parse().unwrap();
    assert_eq!(registry.subscription_list(&filter), vec!["m2601", "m2512", "SA2601", "SA2512"]);
}

#[test]
fn test_missing_catalog_file() {
    let dir = TempDir::new().unwrap();
    let err = ProductCatalog::load(dir.path().join("absent.yml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn test_catalog_with_blank_product_fails() {
    let dir = TempDir::new().unwrap();
    let catalog = ProductCatalog::load(write_catalog(&dir, "SHFE:\n  products:\n    - \"# nothing\"\n")).unwrap();
    let err = ContractRegistry::generate(&catalog, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).unwrap_err();
    assert!(matches!(err, ConfigError::EmptyAbbreviation { .. }));
}
