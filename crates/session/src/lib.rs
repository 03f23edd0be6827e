//! Hermes Session
//!
//! Drives one gateway session from connect to shutdown.
//!
//! ```text
//!   gateway thread                         control task
//!   ──────────────                         ────────────
//!   FrontConnected ─┐
//!   Authenticate  ──┤  SessionCore          SessionController::start()
//!   Login         ──┼─▶ (EventSink) ──────▶   awaits each handshake waiter
//!   Subscribe     ──┤     │                     until Active
//!   MarketData    ──┘     │
//!                         ├─▶ RendezvousTable ◀── query / insert_order
//!                         └─▶ BufferedCollector (per exchange)
//! ```
//!
//! Two variants share the state machine: [`MarketData`] subscribes and
//! stores ticks, [`Trade`] authenticates first and serves queries and
//! order entry.

pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod shutdown;
pub mod state;
pub mod variants;

pub use config::SessionConfig;
pub use controller::{JOIN_TIMEOUT, POLL_INTERVAL, SessionController};
pub use dispatch::{SessionCore, SessionVariant};
pub use error::{HandshakeError, Result, SessionError};
pub use shutdown::ShutdownSignal;
pub use state::SessionState;
pub use variants::{MarketData, MarketDataSession, OrderRequest, Trade, TradeSession};
