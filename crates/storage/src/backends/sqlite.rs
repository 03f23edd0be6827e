//! Relational store: one SQLite table per instrument, created on first insert

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hermes_core::{FieldValue, MarketDataRecord};
use hermes_registry::ContractRegistry;
use log::debug;
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{Connection, OpenFlags, params, params_from_iter};

use crate::backend::{BackendKind, SaveReport, StorageBackend, validate_name};
use crate::error::{Result, StorageError};
use crate::routing::partition_batch;

pub struct SqliteBackend {
    path: PathBuf,
    conn: Option<Connection>,
    registry: Option<Arc<ContractRegistry>>,
}

impl SqliteBackend {
    pub fn open(path: impl Into<PathBuf>, registry: Arc<ContractRegistry>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        debug!("Opened SQLite store {}", path.display());
        Ok(Self {
            path,
            conn: Some(conn),
            registry: Some(registry),
        })
    }

    pub fn open_read_only(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            path,
            conn: Some(conn),
            registry: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(StorageError::Closed)
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list() -> String {
    MarketDataRecord::COLUMNS
        .iter()
        .map(|(name, _)| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_table_sql(table: &str) -> String {
    let columns = MarketDataRecord::COLUMNS
        .iter()
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({columns})", quote_ident(table))
}

fn insert_sql(table: &str) -> String {
    let placeholders = (1..=MarketDataRecord::COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) VALUES ({placeholders})", quote_ident(table), column_list())
}

fn to_sql(field: FieldValue) -> Value {
    match field {
        FieldValue::Text(s) => Value::Text(s),
        FieldValue::Integer(i) => Value::Integer(i),
        FieldValue::Real(f) => Value::Real(f),
    }
}

fn from_sql(value: ValueRef<'_>, index: usize) -> rusqlite::Result<FieldValue> {
    match value {
        ValueRef::Text(bytes) => Ok(FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Integer(i) => Ok(FieldValue::Integer(i)),
        ValueRef::Real(f) => Ok(FieldValue::Real(f)),
        ValueRef::Null => Err(rusqlite::Error::InvalidColumnType(
            index,
            MarketDataRecord::COLUMNS[index].0.to_string(),
            Type::Null,
        )),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            index,
            MarketDataRecord::COLUMNS[index].0.to_string(),
            Type::Blob,
        )),
    }
}

impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn save(&mut self, records: &[MarketDataRecord]) -> Result<SaveReport> {
        let registry = self.registry.clone().ok_or(StorageError::ReadOnly)?;
        let conn = self.conn.as_mut().ok_or(StorageError::Closed)?;
        let batch = partition_batch(records, &registry);

        // dropped without commit on any error, which rolls everything back
        let tx = conn.transaction()?;
        for group in &batch.groups {
            let table = &group.partition.instrument;
            tx.execute_batch(&create_table_sql(table))?;
            let mut insert = tx.prepare_cached(&insert_sql(table))?;
            for record in &group.records {
                insert.execute(params_from_iter(record.to_fields().into_iter().map(to_sql)))?;
            }
        }
        tx.commit()?;

        Ok(SaveReport {
            written: batch.routed(),
            partitions: batch.groups.len(),
            rejected: batch.rejected,
        })
    }

    fn load(&mut self, table: &str, limit: Option<usize>) -> Result<Vec<MarketDataRecord>> {
        validate_name(table)?;
        let conn = self.conn()?;
        if !Self::table_exists(conn, table)? {
            return Err(StorageError::TableNotFound(table.to_string()));
        }

        // newest first, then reversed back into insertion order
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid DESC LIMIT ?1",
            column_list(),
            quote_ident(table)
        );
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit], |row| {
                (0..MarketDataRecord::COLUMNS.len())
                    .map(|i| from_sql(row.get_ref(i)?, i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut records = rows
            .into_iter()
            .map(MarketDataRecord::from_fields)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        records.reverse();
        Ok(records)
    }

    fn list_tables(&mut self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            debug!("Closed SQLite store {}", self.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hermes_registry::ProductCatalog;
    use tempfile::TempDir;

    fn registry() -> Arc<ContractRegistry> {
        let catalog = ProductCatalog::new().with_exchange("SHFE", &["rb", "ag"]);
        Arc::new(ContractRegistry::generate(&catalog, NaiveDate::from_ymd_opt(2025, 12, 2).unwrap()).unwrap())
    }

    fn tick(instrument: &str, price: f64, volume: i32) -> MarketDataRecord {
        MarketDataRecord::new(instrument)
            .with_last(price, volume)
            .with_time("20251202", "21:00:00", 500)
            .with_top_of_book(price - 1.0, 3, price + 1.0, 4)
    }

    #[test]
    fn test_table_per_instrument_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("SHFE.sqlite3"), registry()).unwrap();

        let batch = vec![tick("rb2601", 3500.0, 1), tick("ag2601", 7000.0, 2), tick("rb2601", 3502.0, 3)];
        let report = backend.save(&batch).unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(report.partitions, 2);

        assert_eq!(backend.list_tables().unwrap(), vec!["ag2601", "rb2601"]);
        assert_eq!(backend.load("rb2601", None).unwrap(), vec![batch[0].clone(), batch[2].clone()]);
        assert_eq!(backend.load("rb2601", Some(1)).unwrap(), vec![batch[2].clone()]);
    }

    #[test]
    fn test_reopen_read_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("SHFE.sqlite3");
        let mut backend = SqliteBackend::open(&path, registry()).unwrap();
        backend.save(&[tick("ag2512", 7010.0, 5)]).unwrap();
        backend.close().unwrap();
        assert!(matches!(backend.list_tables(), Err(StorageError::Closed)));

        let mut reader = SqliteBackend::open_read_only(&path).unwrap();
        assert_eq!(reader.load("ag2512", Some(10)).unwrap().len(), 1);
        assert!(matches!(reader.load("rb2601", None), Err(StorageError::TableNotFound(_))));
        assert!(matches!(reader.save(&[tick("ag2512", 1.0, 1)]), Err(StorageError::ReadOnly)));
    }

    #[test]
    fn test_failed_insert_rolls_back_whole_batch() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("SHFE.sqlite3"), registry()).unwrap();
        // a view with the instrument's name makes CREATE TABLE IF NOT EXISTS fail
        backend
            .conn()
            .unwrap()
            .execute_batch("CREATE VIEW \"ag2601\" AS SELECT 1")
            .unwrap();

        let result = backend.save(&[tick("rb2601", 3500.0, 1), tick("ag2601", 7000.0, 1)]);
        assert!(result.is_err());
        assert!(matches!(backend.load("rb2601", None), Err(StorageError::TableNotFound(_))));
    }

    #[test]
    fn test_load_refuses_non_instrument_names() {
        let dir = TempDir::new().unwrap();
        let mut backend = SqliteBackend::open(dir.path().join("SHFE.sqlite3"), registry()).unwrap();
        backend.save(&[tick("rb2601", 3500.0, 1)]).unwrap();
        assert!(matches!(
            backend.load("rb2601\" UNION SELECT", None),
            Err(StorageError::InvalidName(_))
        ));
        assert!(matches!(backend.load("sqlite_master", None), Err(StorageError::InvalidName(_))));
        assert_eq!(backend.load("rb2601", None).unwrap().len(), 1);
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert!(create_table_sql("rb2601").starts_with("CREATE TABLE IF NOT EXISTS \"rb2601\" (\"InstrumentID\" TEXT"));
    }
}
