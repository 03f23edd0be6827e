//! Hermes Contract Registry
//!
//! Derives the currently tradable futures contracts from a static product
//! catalog and the calendar date, and routes instrument codes to their
//! storage partition.
//!
//! ```text
//! instrument.yml ──► ProductCatalog ──┐
//!                                     ├──► ContractRegistry ──► route("rb2601")
//! today ──────────► contract_months ──┘         │                 = SHFE / rb / rb2601
//!                                               └──► subscription_list(filter)
//! ```
//!
//! The registry is an explicit value: the session that owns it passes it by
//! reference to the storage pipeline.

pub mod catalog;
pub mod error;
pub mod filter;
pub mod registry;

pub use catalog::{ExchangeEntry, Product, ProductCatalog};
pub use error::{ConfigError, RoutingError};
pub use filter::ExchangeFilter;
pub use registry::{ContractMonths, ContractRegistry, Partition, contract_months};
