//! Backend and collector construction from storage settings

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hermes_registry::ContractRegistry;
use log::info;
use serde::{Deserialize, Serialize};

use crate::backend::{BackendKind, StorageBackend, validate_name};
use crate::backends::{ColumnarBackend, CsvBackend, SqliteBackend};
use crate::collector::BufferedCollector;
use crate::error::{Result, StorageError};

pub const DEFAULT_BUFFER_SIZE: usize = 128;

/// Resolved storage parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    pub kind: BackendKind,
    pub buffer_size: usize,
    /// Base directory; each kind writes under its own sub-directory
    pub base_path: PathBuf,
}

impl StorageSettings {
    pub fn new(kind: BackendKind, base_path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            buffer_size: DEFAULT_BUFFER_SIZE,
            base_path: base_path.into(),
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// `<base>/csv`, `<base>/sqlite3` or `<base>/parquet`
    pub fn backend_dir(&self) -> PathBuf {
        self.base_path.join(self.kind.dir_name())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(StorageError::InvalidBufferSize);
        }
        Ok(())
    }
}

/// Container path for one collector, `None` for CSV which writes into `dir`
pub fn container_path(kind: BackendKind, dir: &Path, container: &str) -> PathBuf {
    match kind.extension() {
        Some(ext) => dir.join(format!("{container}.{ext}")),
        None => dir.to_path_buf(),
    }
}

/// Open a writable backend for one container
pub fn open_backend(
    kind: BackendKind,
    dir: &Path,
    container: &str,
    registry: Arc<ContractRegistry>,
) -> Result<Box<dyn StorageBackend>> {
    let path = container_path(kind, dir, container);
    let backend: Box<dyn StorageBackend> = match kind {
        BackendKind::Csv => Box::new(CsvBackend::open(path, registry)?),
        BackendKind::Sqlite => Box::new(SqliteBackend::open(path, registry)?),
        BackendKind::Columnar => Box::new(ColumnarBackend::open(path, registry)?),
    };
    Ok(backend)
}

/// Open an existing container for reading
pub fn open_reader(kind: BackendKind, dir: &Path, container: &str) -> Result<Box<dyn StorageBackend>> {
    if kind != BackendKind::Csv {
        validate_name(container)?;
    }
    let path = container_path(kind, dir, container);
    let backend: Box<dyn StorageBackend> = match kind {
        BackendKind::Csv => Box::new(CsvBackend::open_read_only(path)),
        BackendKind::Sqlite => Box::new(SqliteBackend::open_read_only(path)?),
        BackendKind::Columnar => Box::new(ColumnarBackend::open_read_only(path)),
    };
    Ok(backend)
}

/// Collector named after its container, backed by a fresh backend
pub fn open_collector(
    settings: &StorageSettings,
    container: &str,
    registry: Arc<ContractRegistry>,
) -> Result<BufferedCollector> {
    settings.validate()?;
    let dir = settings.backend_dir();
    let backend = open_backend(settings.kind, &dir, container, registry)?;
    info!(
        "Opened {} collector {} at {} (buffer {})",
        settings.kind,
        container,
        container_path(settings.kind, &dir, container).display(),
        settings.buffer_size
    );
    BufferedCollector::new(container, backend, settings.buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_paths() {
        let dir = Path::new("/data/db/sqlite3");
        assert_eq!(
            container_path(BackendKind::Sqlite, dir, "SHFE"),
            PathBuf::from("/data/db/sqlite3/SHFE.sqlite3")
        );
        assert_eq!(
            container_path(BackendKind::Columnar, Path::new("db/parquet"), "DCE"),
            PathBuf::from("db/parquet/DCE.parquet")
        );
        assert_eq!(container_path(BackendKind::Csv, Path::new("db/csv"), "DCE"), PathBuf::from("db/csv"));
    }

    #[test]
    fn test_reader_container_must_be_an_exchange_id() {
        let dir = tempfile::TempDir::new().unwrap();
        for kind in [BackendKind::Sqlite, BackendKind::Columnar] {
            assert!(matches!(
                open_reader(kind, dir.path(), "../SHFE"),
                Err(StorageError::InvalidName(_))
            ));
        }
        // csv reads the whole directory and ignores the container
        assert!(open_reader(BackendKind::Csv, dir.path(), "").is_ok());
    }

    #[test]
    fn test_settings_dirs_and_validation() {
        let settings = StorageSettings::new(BackendKind::Columnar, "mytrade/db");
        assert_eq!(settings.backend_dir(), PathBuf::from("mytrade/db/parquet"));
        assert_eq!(settings.buffer_size, 128);
        assert!(matches!(
            settings.with_buffer_size(0).validate(),
            Err(StorageError::InvalidBufferSize)
        ));
    }
}
