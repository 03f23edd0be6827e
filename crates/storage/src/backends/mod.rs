//! Storage backend implementations

pub mod columnar;
pub mod csv;
pub mod sqlite;

pub use columnar::{ColumnarBackend, market_data_schema};
pub use self::csv::CsvBackend;
pub use sqlite::SqliteBackend;
