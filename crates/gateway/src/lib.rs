//! Hermes Gateway
//!
//! Gateway layer between the vendor trading front and the session logic.
//! Provides:
//! - The gateway port (`GatewayApi`, `GatewayFactory`, `EventSink`)
//! - A closed, typed set of callback events and requests
//! - Request correlation (`RequestIdAllocator`, `RendezvousTable`)
//! - A scripted in-process front for tests and dry runs
//!
//! ## Architecture
//!
//! ```text
//! Vendor front (native binding / simulator)
//!         │ callbacks on the front's own thread
//!    ┌────▼─────┐
//!    │EventSink │ ─── replies ───► RendezvousTable ───► waiting control thread
//!    └────┬─────┘
//!         │ pushes (market data, order/trade updates)
//!    ┌────▼─────┐
//!    │ Session  │
//!    └──────────┘
//! ```

pub mod adapters;
pub mod error;
pub mod handle;
pub mod messages;
pub mod port;
pub mod rendezvous;
pub mod request_id;

// Re-export commonly used types
pub use adapters::{SimulatedGateway, SimulatorFactory, SimulatorScript};
pub use error::{GatewayError, RendezvousError, WaitError};
pub use handle::{GatewayHandle, RELEASE_JOIN_TIMEOUT};
pub use messages::{GatewayEvent, GatewayRequest, RequestKind, Response, ResponsePayload, RspInfo};
pub use port::{ApiKind, EventSink, GatewayApi, GatewayFactory, ResumeType};
pub use rendezvous::{Completion, Delivery, RendezvousTable, ResponseBatch, ResponsePart, Waiter};
pub use request_id::RequestIdAllocator;
