//! Application settings (`CONF.yml`)
//!
//! ```yaml
//! APP_CONFIG:
//!   is_production_mode: true
//!   log_level: INFO
//!   root_path: mytrade
//!   sub_folders: { log: logs, config: conf, stream: streams, db: db }
//!   data_collection:
//!     db_type: hdf5
//!     buffer_size: 128
//! CTP_SERVER:
//!   SIMNOW:
//!     simulation:
//!       broker_id: "9999"
//!       investor_id: "000001"
//!       password: secret
//!       md_server: tcp://182.254.243.31:30011
//!       trader_server: tcp://182.254.243.31:30001
//! ```
//!
//! Every key has a default except the server entries.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use hermes_core::Credentials;
use hermes_gateway::ApiKind;
use hermes_registry::ConfigError;
use hermes_storage::{BackendKind, DEFAULT_BUFFER_SIZE, StorageSettings};
use indexmap::IndexMap;
use log::{LevelFilter, info};
use serde::{Deserialize, Deserializer};

type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_CONFIG_FILE: &str = "CONF.yml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(rename = "APP_CONFIG", default)]
    pub app: AppConfig,
    /// platform -> environment -> server entry
    #[serde(rename = "CTP_SERVER", default)]
    pub servers: IndexMap<String, IndexMap<String, ServerConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub is_production_mode: bool,
    pub log_level: String,
    pub root_path: PathBuf,
    pub sub_folders: SubFolders,
    /// Product catalog, relative to the config folder
    pub instrument_catalog: String,
    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub data_collection: DataCollection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            is_production_mode: true,
            log_level: "INFO".to_string(),
            root_path: PathBuf::from("mytrade"),
            sub_folders: SubFolders::default(),
            instrument_catalog: "instrument.yml".to_string(),
            handshake_timeout_secs: 10,
            request_timeout_secs: 5,
            data_collection: DataCollection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubFolders {
    pub log: String,
    pub config: String,
    pub stream: String,
    pub db: String,
}

impl Default for SubFolders {
    fn default() -> Self {
        Self {
            log: "logs".to_string(),
            config: "conf".to_string(),
            stream: "streams".to_string(),
            db: "db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataCollection {
    pub db_type: BackendKind,
    pub buffer_size: usize,
    pub collector_count: usize,
    /// Relative paths are taken from the root path
    pub db_path: Option<PathBuf>,
}

impl Default for DataCollection {
    fn default() -> Self {
        Self {
            db_type: BackendKind::Columnar,
            buffer_size: DEFAULT_BUFFER_SIZE,
            collector_count: 1,
            db_path: None,
        }
    }
}

/// One front pair with its account
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(deserialize_with = "text")]
    pub broker_id: String,
    #[serde(deserialize_with = "text")]
    pub investor_id: String,
    #[serde(deserialize_with = "text")]
    pub password: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default, deserialize_with = "text")]
    pub auth_code: String,
    pub md_server: String,
    #[serde(alias = "trade_server")]
    pub trader_server: String,
}

impl ServerConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.broker_id, &self.investor_id, &self.password).with_app(&self.app_id, &self.auth_code)
    }

    pub fn front_address(&self, api: ApiKind) -> &str {
        match api {
            ApiKind::MarketData => &self.md_server,
            ApiKind::Trade => &self.trader_server,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("broker_id", &self.broker_id)
            .field("investor_id", &self.investor_id)
            .field("app_id", &self.app_id)
            .field("md_server", &self.md_server)
            .field("trader_server", &self.trader_server)
            .finish_non_exhaustive()
    }
}

/// Ids and codes are often written unquoted, so accept numbers too
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Text::deserialize(deserializer)? {
        Text::Str(s) => s,
        Text::Int(i) => i.to_string(),
        Text::Float(f) => f.to_string(),
    })
}

/// Load settings from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Load settings from a YAML string
pub fn load_config_from_str(yaml: &str) -> Result<Settings> {
    let settings: Settings = serde_yaml::from_str(yaml)?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.level_filter()?;
        let app = &self.app;
        if app.data_collection.buffer_size == 0 {
            return Err(invalid("data_collection.buffer_size", "must be greater than zero"));
        }
        if app.data_collection.collector_count == 0 {
            return Err(invalid("data_collection.collector_count", "must be greater than zero"));
        }
        if app.handshake_timeout_secs == 0 {
            return Err(invalid("handshake_timeout_secs", "must be greater than zero"));
        }
        if app.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        match self.app.log_level.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LevelFilter::Debug),
            "INFO" => Ok(LevelFilter::Info),
            "WARN" | "WARNING" => Ok(LevelFilter::Warn),
            "ERROR" => Ok(LevelFilter::Error),
            _ => Err(ConfigError::UnknownLogLevel(self.app.log_level.clone())),
        }
    }

    pub fn server(&self, platform: &str, environment: &str) -> Result<&ServerConfig> {
        self.servers
            .get(platform)
            .and_then(|envs| envs.get(environment))
            .ok_or_else(|| ConfigError::UnknownServer {
                platform: platform.to_string(),
                environment: environment.to_string(),
            })
    }

    pub fn root(&self) -> &Path {
        &self.app.root_path
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root().join(&self.app.sub_folders.log)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root().join(&self.app.sub_folders.config)
    }

    pub fn stream_dir(&self) -> PathBuf {
        self.root().join(&self.app.sub_folders.stream)
    }

    /// `<root>/<stream>/<YYYYMMDD>_`, the flow-file prefix handed to the gateway
    pub fn stream_prefix(&self, today: NaiveDate) -> PathBuf {
        self.stream_dir().join(format!("{}_", today.format("%Y%m%d")))
    }

    /// `<root>/<log>/<YYYYMMDD>_ctp.log`
    pub fn log_file(&self, today: NaiveDate) -> PathBuf {
        self.log_dir().join(format!("{}_ctp.log", today.format("%Y%m%d")))
    }

    pub fn db_path(&self) -> PathBuf {
        match &self.app.data_collection.db_path {
            Some(path) => self.root().join(path),
            None => self.root().join(&self.app.sub_folders.db),
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.config_dir().join(&self.app.instrument_catalog)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.app.handshake_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.app.request_timeout_secs)
    }

    pub fn storage(&self) -> StorageSettings {
        let collection = &self.app.data_collection;
        StorageSettings::new(collection.db_type, self.db_path()).with_buffer_size(collection.buffer_size)
    }

    /// Create the root, log, config, stream and storage directories
    pub fn ensure_directories(&self) -> Result<()> {
        let storage = self.storage();
        for dir in [
            self.root().to_path_buf(),
            self.log_dir(),
            self.config_dir(),
            self.stream_dir(),
            storage.backend_dir(),
        ] {
            if dir.is_dir() {
                continue;
            }
            fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            info!("Created directory {}", dir.display());
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
