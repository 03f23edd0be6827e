//! Port onto the vendor gateway binding
//!
//! A native binding implements [`GatewayApi`] and [`GatewayFactory`]; the
//! session code only ever talks to these traits.

use std::path::Path;
use std::sync::Arc;

use hermes_core::RequestId;

use crate::error::GatewayError;
use crate::messages::{GatewayEvent, GatewayRequest};

/// Which front a handle talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKind {
    MarketData,
    Trade,
}

/// Replay mode for private/public topic streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResumeType {
    /// Replay from the start of the trading day
    Restart,
    /// Resume from the last received sequence
    Resume,
    /// Only messages after login
    Quick,
}

/// Receiver of callback deliveries
///
/// Called on the gateway's own delivery thread.
pub trait EventSink: Send + Sync {
    fn on_event(&self, event: GatewayEvent);
}

/// Operations of a created gateway instance
pub trait GatewayApi: Send + Sync {
    /// Front address, must be set before `init`
    fn register_front(&self, address: &str);

    fn register_sink(&self, sink: Arc<dyn EventSink>);

    /// Topic replay modes; only meaningful on trade fronts
    fn subscribe_topics(&self, _private: ResumeType, _public: ResumeType) {}

    /// Start connecting; callbacks begin after this
    fn init(&self);

    /// Block until the gateway's internal threads exit
    fn join(&self) -> i32;

    /// Stop delivery and free the instance
    fn release(&self);

    /// Send a request; `0` means accepted for sending
    fn send_request(&self, request: &GatewayRequest, request_id: RequestId) -> i32;

    fn name(&self) -> &str {
        "gateway"
    }
}

/// Creates gateway instances (`createHandle`)
pub trait GatewayFactory: Send + Sync {
    fn create(
        &self,
        kind: ApiKind,
        stream_path: &Path,
        production_mode: bool,
    ) -> Result<Arc<dyn GatewayApi>, GatewayError>;
}
