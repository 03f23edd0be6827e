//! Error types for the registry crate

use thiserror::Error;

/// Malformed catalog or settings; fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Empty product abbreviation in exchange {exchange} (entry {entry:?})")]
    EmptyAbbreviation { exchange: String, entry: String },

    #[error("Invalid product abbreviation '{abbreviation}' in exchange {exchange}")]
    InvalidAbbreviation { exchange: String, abbreviation: String },

    #[error("Product '{abbreviation}' listed under both {first} and {second}")]
    DuplicateProduct {
        abbreviation: String,
        first: String,
        second: String,
    },

    #[error("Exchange {0} is not in the product catalog")]
    UnknownExchange(String),

    #[error("Exchange filter is empty")]
    EmptyFilter,

    #[error("Unknown log level '{0}' (expected DEBUG, INFO, WARN or ERROR)")]
    UnknownLogLevel(String),

    #[error("No server configured for platform {platform}, environment {environment}")]
    UnknownServer { platform: String, environment: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

/// A record that cannot be mapped to a storage partition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("Record has no InstrumentID")]
    MissingInstrumentId,

    #[error("Instrument {0} is not a registered contract")]
    UnknownInstrument(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
