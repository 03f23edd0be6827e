//! Columnar store: one Parquet container directory per collector
//!
//! Parquet files are immutable, so every save appends a new part file
//! (`<EX>.parquet/part-00000001.parquet`, ...) holding one row group per
//! instrument. A part is written under a `.tmp` name and renamed into place
//! once complete; readers only see finished parts. Earlier parts are never
//! touched again.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use hermes_core::{ColumnType, FieldValue, MarketDataRecord};
use hermes_registry::ContractRegistry;
use log::{debug, warn};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::backend::{BackendKind, SaveReport, StorageBackend, tail, validate_name};
use crate::error::{Result, StorageError};
use crate::routing::partition_batch;

/// Arrow schema mirroring [`MarketDataRecord::COLUMNS`]
pub fn market_data_schema() -> SchemaRef {
    let fields = MarketDataRecord::COLUMNS
        .iter()
        .map(|(name, ty)| {
            let data_type = match ty {
                ColumnType::Text => DataType::Utf8,
                ColumnType::Integer => DataType::Int64,
                ColumnType::Real => DataType::Float64,
            };
            Field::new(*name, data_type, false)
        })
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}

pub struct ColumnarBackend {
    /// Container directory holding `part-<seq>.parquet` files
    path: PathBuf,
    schema: SchemaRef,
    registry: Option<Arc<ContractRegistry>>,
    next_part: u64,
    closed: bool,
}

impl ColumnarBackend {
    pub fn open(path: impl Into<PathBuf>, registry: Arc<ContractRegistry>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        let next_part = list_parts(&path)?.last().map_or(1, |(seq, _)| seq + 1);
        Ok(Self {
            path,
            schema: market_data_schema(),
            registry: Some(registry),
            next_part,
            closed: false,
        })
    }

    pub fn open_read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema: market_data_schema(),
            registry: None,
            next_part: 1,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Part files in write order
    pub fn parts(&self) -> Result<Vec<PathBuf>> {
        Ok(list_parts(&self.path)?.into_iter().map(|(_, path)| path).collect())
    }

    fn part_path(&self, seq: u64) -> PathBuf {
        self.path.join(format!("{PART_PREFIX}{seq:08}.{PART_EXTENSION}"))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }

    /// All batches in the container, part by part, re-tagged with our schema
    fn read_batches(&self) -> Result<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        for part in self.parts()? {
            let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&part)?)?.build()?;
            for batch in reader {
                let batch = batch?;
                check_layout(&batch)?;
                batches.push(RecordBatch::try_new(self.schema.clone(), batch.columns().to_vec())?);
            }
        }
        Ok(batches)
    }

    fn build_batch(&self, records: &[&MarketDataRecord]) -> Result<RecordBatch> {
        let mut columns: Vec<Vec<FieldValue>> = MarketDataRecord::COLUMNS
            .iter()
            .map(|_| Vec::with_capacity(records.len()))
            .collect();
        for record in records {
            for (column, value) in columns.iter_mut().zip(record.to_fields()) {
                column.push(value);
            }
        }

        let arrays = MarketDataRecord::COLUMNS
            .iter()
            .zip(columns)
            .map(|((name, ty), values)| to_array(name, *ty, values))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordBatch::try_new(self.schema.clone(), arrays)?)
    }

    /// Write one new part; it only becomes visible once fully written
    fn write_part(&self, seq: u64, batches: &[RecordBatch]) -> Result<PathBuf> {
        let part = self.part_path(seq);
        let mut temp = part.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let written = (|| -> Result<()> {
            let mut writer = ArrowWriter::try_new(File::create(&temp)?, self.schema.clone(), None)?;
            for batch in batches {
                writer.write(batch)?;
                // one row group per instrument
                writer.flush()?;
            }
            writer.close()?;
            Ok(())
        })();

        match written.and_then(|()| Ok(fs::rename(&temp, &part)?)) {
            Ok(()) => Ok(part),
            Err(e) => {
                if temp.exists() {
                    if let Err(cleanup) = fs::remove_file(&temp) {
                        warn!("Could not remove {}: {cleanup}", temp.display());
                    }
                }
                Err(e)
            }
        }
    }
}

const PART_PREFIX: &str = "part-";
const PART_EXTENSION: &str = "parquet";

fn part_seq(name: &str) -> Option<u64> {
    name.strip_prefix(PART_PREFIX)?
        .strip_suffix(PART_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// `(seq, path)` of every finished part, ascending; unfinished `.tmp` files
/// are skipped
fn list_parts(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(seq) = entry.file_name().to_str().and_then(part_seq) {
            parts.push((seq, entry.path()));
        }
    }
    parts.sort_by_key(|(seq, _)| *seq);
    Ok(parts)
}

fn check_layout(batch: &RecordBatch) -> Result<()> {
    let schema = batch.schema();
    let expected = market_data_schema();
    let matches = schema.fields().len() == expected.fields().len()
        && schema
            .fields()
            .iter()
            .zip(expected.fields().iter())
            .all(|(a, b)| a.name() == b.name() && a.data_type() == b.data_type());
    if matches {
        Ok(())
    } else {
        Err(StorageError::Schema(format!(
            "container has {} columns that do not match the market data layout",
            schema.fields().len()
        )))
    }
}

fn to_array(name: &str, ty: ColumnType, values: Vec<FieldValue>) -> Result<ArrayRef> {
    let mismatch = |found: &FieldValue| StorageError::Schema(format!("{name}: expected {ty:?}, found {found:?}"));
    let array: ArrayRef = match ty {
        ColumnType::Text => Arc::new(StringArray::from(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Text(s) => Ok(s),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnType::Integer => Arc::new(Int64Array::from(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Integer(i) => Ok(i),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
        ColumnType::Real => Arc::new(Float64Array::from(
            values
                .into_iter()
                .map(|v| match v {
                    FieldValue::Real(f) => Ok(f),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<Vec<_>>>()?,
        )),
    };
    Ok(array)
}

fn field_at(column: &ArrayRef, ty: ColumnType, row: usize) -> Result<FieldValue> {
    let wrong = || StorageError::Schema(format!("column is not {ty:?}"));
    Ok(match ty {
        ColumnType::Text => {
            let values = column.as_any().downcast_ref::<StringArray>().ok_or_else(wrong)?;
            FieldValue::Text(values.value(row).to_string())
        }
        ColumnType::Integer => {
            let values = column.as_any().downcast_ref::<Int64Array>().ok_or_else(wrong)?;
            FieldValue::Integer(values.value(row))
        }
        ColumnType::Real => {
            let values = column.as_any().downcast_ref::<Float64Array>().ok_or_else(wrong)?;
            FieldValue::Real(values.value(row))
        }
    })
}

fn instrument_column(batch: &RecordBatch) -> Result<&StringArray> {
    batch
        .column(MarketDataRecord::INSTRUMENT_COLUMN)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StorageError::Schema("InstrumentID is not a string column".into()))
}

impl StorageBackend for ColumnarBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Columnar
    }

    fn save(&mut self, records: &[MarketDataRecord]) -> Result<SaveReport> {
        self.ensure_open()?;
        let registry = self.registry.clone().ok_or(StorageError::ReadOnly)?;
        let batch = partition_batch(records, &registry);
        let report = SaveReport {
            written: batch.routed(),
            partitions: batch.groups.len(),
            rejected: Vec::new(),
        };
        if batch.groups.is_empty() {
            return Ok(SaveReport {
                rejected: batch.rejected,
                ..report
            });
        }

        let fresh = batch
            .groups
            .iter()
            .map(|group| self.build_batch(&group.records))
            .collect::<Result<Vec<_>>>()?;
        let part = self.write_part(self.next_part, &fresh)?;
        self.next_part += 1;
        debug!(
            "Wrote {} rows in {} row groups to {}",
            report.written,
            report.partitions,
            part.display()
        );

        Ok(SaveReport {
            rejected: batch.rejected,
            ..report
        })
    }

    fn load(&mut self, table: &str, limit: Option<usize>) -> Result<Vec<MarketDataRecord>> {
        self.ensure_open()?;
        validate_name(table)?;
        let mut rows = Vec::new();
        for batch in self.read_batches()? {
            let instruments = instrument_column(&batch)?;
            for row in 0..batch.num_rows() {
                if instruments.is_null(row) || instruments.value(row) != table {
                    continue;
                }
                let fields = MarketDataRecord::COLUMNS
                    .iter()
                    .enumerate()
                    .map(|(i, (_, ty))| field_at(batch.column(i), *ty, row))
                    .collect::<Result<Vec<_>>>()?;
                rows.push(MarketDataRecord::from_fields(fields)?);
            }
        }
        if rows.is_empty() {
            return Err(StorageError::TableNotFound(table.to_string()));
        }
        Ok(tail(rows, limit))
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut tables = BTreeSet::new();
        for batch in self.read_batches()? {
            let instruments = instrument_column(&batch)?;
            for row in 0..batch.num_rows() {
                tables.insert(instruments.value(row).to_string());
            }
        }
        Ok(tables.into_iter().collect())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
