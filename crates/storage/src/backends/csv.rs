//! Row-file store: `<root>/<exchange>/<symbol>/<instrument>.csv`
//!
//! Header is written only when a file is created; later batches append.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hermes_core::{MarketDataRecord, symbol_prefix};
use hermes_registry::{ContractRegistry, Partition};
use log::{debug, error, warn};

use crate::backend::{BackendKind, SaveReport, StorageBackend, tail, validate_name};
use crate::error::{Result, StorageError};
use crate::routing::{PartitionGroup, partition_batch};

const EXTENSION: &str = "csv";

/// File touched by an in-flight save and how to undo it
struct Touched {
    path: PathBuf,
    /// Length before the save, `None` if the save created the file
    previous_len: Option<u64>,
}

pub struct CsvBackend {
    root: PathBuf,
    registry: Option<Arc<ContractRegistry>>,
    closed: bool,
}

impl CsvBackend {
    pub fn open(root: impl Into<PathBuf>, registry: Arc<ContractRegistry>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            registry: Some(registry),
            closed: false,
        })
    }

    /// Open for `load`/`list_tables` only
    pub fn open_read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            registry: None,
            closed: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partition_path(&self, partition: &Partition) -> PathBuf {
        self.root
            .join(&partition.exchange)
            .join(&partition.symbol)
            .join(format!("{}.{}", partition.instrument, EXTENSION))
    }

    /// Existing file for a table, searched across exchange directories
    fn find_table(&self, table: &str) -> Result<Option<PathBuf>> {
        validate_name(table)?;
        if !self.root.is_dir() {
            return Ok(None);
        }
        let file_name = format!("{table}.{EXTENSION}");
        for entry in fs::read_dir(&self.root)? {
            let candidate = entry?.path().join(symbol_prefix(table)).join(&file_name);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn append_group(&self, group: &PartitionGroup<'_>, touched: &mut Vec<Touched>) -> Result<()> {
        let path = self.partition_path(group.partition);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let previous_len = fs::metadata(&path).ok().map(|m| m.len());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        touched.push(Touched {
            path: path.clone(),
            previous_len,
        });

        let needs_headers = previous_len.unwrap_or(0) == 0;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_headers)
            .from_writer(file);
        for record in &group.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        debug!("Appended {} rows to {}", group.records.len(), path.display());
        Ok(())
    }

    fn roll_back(touched: &[Touched]) {
        for file in touched.iter().rev() {
            let undone = match file.previous_len {
                Some(len) => OpenOptions::new()
                    .write(true)
                    .open(&file.path)
                    .and_then(|f| f.set_len(len)),
                None => fs::remove_file(&file.path),
            };
            if let Err(e) = undone {
                error!("Failed to roll back {}: {e}", file.path.display());
            }
        }
    }
}

impl StorageBackend for CsvBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Csv
    }

    fn save(&mut self, records: &[MarketDataRecord]) -> Result<SaveReport> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let registry = self.registry.as_ref().ok_or(StorageError::ReadOnly)?;
        let batch = partition_batch(records, registry);

        let mut touched = Vec::with_capacity(batch.groups.len());
        for group in &batch.groups {
            if let Err(e) = self.append_group(group, &mut touched) {
                warn!("CSV save failed on {}, rolling back {} files", group.partition.instrument, touched.len());
                Self::roll_back(&touched);
                return Err(e);
            }
        }

        Ok(SaveReport {
            written: batch.routed(),
            partitions: batch.groups.len(),
            rejected: batch.rejected,
        })
    }

    fn load(&mut self, table: &str, limit: Option<usize>) -> Result<Vec<MarketDataRecord>> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let path = self
            .find_table(table)?
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;

        let mut reader = csv::Reader::from_reader(File::open(&path)?);
        let rows = reader
            .deserialize::<MarketDataRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tail(rows, limit))
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let mut tables = Vec::new();
        if !self.root.is_dir() {
            return Ok(tables);
        }
        for exchange in fs::read_dir(&self.root)? {
            let exchange = exchange?.path();
            if !exchange.is_dir() {
                continue;
            }
            for symbol in fs::read_dir(&exchange)? {
                let symbol = symbol?.path();
                if !symbol.is_dir() {
                    continue;
                }
                for file in fs::read_dir(&symbol)? {
                    let file = file?.path();
                    if file.extension().is_some_and(|ext| ext == EXTENSION) {
                        if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                            tables.push(stem.to_string());
                        }
                    }
                }
            }
        }
        tables.sort();
        tables.dedup();
        Ok(tables)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
