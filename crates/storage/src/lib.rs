//! Hermes Storage
//!
//! Durable, per-instrument persistence of market-data snapshots.
//!
//! ## Pipeline
//!
//! ```text
//! push ──► BufferedCollector ──(buffer_size reached / close)──► StorageBackend::save
//!                                                                     │
//!                                        partition_batch (registry) ◄─┘
//!                                                 │
//!                     ┌───────────────────────────┼────────────────────────────┐
//!                     ▼                           ▼                            ▼
//!        csv/<EX>/<sym>/<code>.csv    sqlite3/<EX>.sqlite3 (table/code)  parquet/<EX>.parquet/
//!                                                                        part-<seq>.parquet per save
//! ```
//!
//! Every backend writes a batch all-or-nothing and refuses records the
//! registry cannot route.

pub mod backend;
pub mod backends;
pub mod collector;
pub mod error;
pub mod factory;
pub mod routing;

pub use backend::{BackendKind, SaveReport, StorageBackend, validate_name};
pub use backends::{ColumnarBackend, CsvBackend, SqliteBackend};
pub use collector::{BufferedCollector, CollectorStats};
pub use error::{Result, StorageError};
pub use factory::{DEFAULT_BUFFER_SIZE, StorageSettings, container_path, open_backend, open_collector, open_reader};
pub use routing::{PartitionGroup, PartitionedBatch, partition_batch};
