use std::fmt;
use std::str::FromStr;

use hermes_core::MarketDataRecord;
use hermes_registry::RoutingError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, StorageError};

/// Physical storage variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// One CSV file per instrument under `exchange/symbol/`
    Csv,
    /// One SQLite table per instrument
    Sqlite,
    /// One Parquet container per collector, one row group per instrument batch
    Columnar,
}

impl BackendKind {
    /// Directory under the storage base path
    pub fn dir_name(&self) -> &'static str {
        match self {
            BackendKind::Csv => "csv",
            BackendKind::Sqlite => "sqlite3",
            BackendKind::Columnar => "parquet",
        }
    }

    /// Container file extension; CSV has no single container
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            BackendKind::Csv => None,
            BackendKind::Sqlite => Some("sqlite3"),
            BackendKind::Columnar => Some("parquet"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(BackendKind::Csv),
            "sqlite" | "sqlite3" => Ok(BackendKind::Sqlite),
            // hdf5 is the historical name of the columnar store
            "parquet" | "columnar" | "hdf5" => Ok(BackendKind::Columnar),
            other => Err(StorageError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl Serialize for BackendKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.dir_name())
    }
}

impl<'de> Deserialize<'de> for BackendKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Outcome of one `save` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Records persisted
    pub written: usize,
    /// Distinct instruments written
    pub partitions: usize,
    /// Records refused by routing, not persisted
    pub rejected: Vec<RoutingError>,
}

impl SaveReport {
    pub fn merge(&mut self, other: SaveReport) {
        self.written += other.written;
        self.partitions += other.partitions;
        self.rejected.extend(other.rejected);
    }
}

/// Durable per-instrument record store
pub trait StorageBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Persist a batch spanning any number of instruments
    ///
    /// Records without an `InstrumentID` or with an unregistered instrument
    /// are reported in [`SaveReport::rejected`]. All routable records are
    /// written, or none are.
    fn save(&mut self, records: &[MarketDataRecord]) -> Result<SaveReport>;

    /// Last `limit` records of a table in insertion order (`None` = all)
    fn load(&mut self, table: &str, limit: Option<usize>) -> Result<Vec<MarketDataRecord>>;

    /// Instrument tables present, sorted
    fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Release the underlying resources; later calls fail with `Closed`
    fn close(&mut self) -> Result<()>;
}

/// Instrument and exchange ids are plain alphanumerics; anything else
/// could name a path or identifier outside the backend
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Keep only the last `limit` items
pub(crate) fn tail<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    match limit {
        Some(limit) if rows.len() > limit => rows.split_off(rows.len() - limit),
        _ => rows,
    }
}
