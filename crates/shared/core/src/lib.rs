//! Hermes Core Domain
//!
//! Pure domain types for the Hermes futures gateway client.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod contract;
pub mod credentials;
pub mod fields;
pub mod market_data;
pub mod values;

// Re-export commonly used types at crate root
pub use contract::{ContractRecord, ContractRole, YearMonth, symbol_prefix};
pub use credentials::Credentials;
pub use fields::{ColumnType, FieldError, FieldValue};
pub use market_data::MarketDataRecord;
pub use values::{Price, RequestId, Timestamp, Volume};
