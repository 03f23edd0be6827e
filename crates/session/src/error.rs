//! Error types for gateway sessions

use std::time::Duration;

use hermes_core::RequestId;
use hermes_gateway::messages::describe_disconnect;
use hermes_gateway::{GatewayError, RendezvousError, RequestKind};
use hermes_registry::{ConfigError, RoutingError};
use hermes_storage::StorageError;
use thiserror::Error;

use crate::state::SessionState;

/// Why a session never became active
///
/// Always fatal: the session requests process shutdown when it sees one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("{step} rejected (request {request_id}): [{error_id}] {message}")]
    Rejected {
        step: RequestKind,
        request_id: RequestId,
        error_id: i32,
        message: String,
    },

    #[error("{step} response to request {request_id} carried no payload")]
    MissingPayload { step: RequestKind, request_id: RequestId },

    #[error("no progress while {state} for {timeout:?}")]
    TimedOut { state: SessionState, timeout: Duration },

    #[error("front disconnected during handshake: {reason:#06x} {}", describe_disconnect(*.reason))]
    Disconnected { reason: i32 },

    #[error("handshake cancelled: {0}")]
    Cancelled(String),

    #[error("{step} could not be sent: {message}")]
    SendFailed { step: RequestKind, message: String },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("{kind} request {request_id} timed out after {timeout:?}")]
    QueryTimeout {
        request_id: RequestId,
        kind: RequestKind,
        timeout: Duration,
    },

    #[error("Order {order_ref} (request {request_id}) timed out after {timeout:?}")]
    OrderTimeout {
        request_id: RequestId,
        order_ref: String,
        timeout: Duration,
    },

    #[error("{kind} request {request_id} rejected: [{error_id}] {message}")]
    Rejected {
        request_id: RequestId,
        kind: RequestKind,
        error_id: i32,
        message: String,
    },

    #[error("{kind} request {request_id} completed without the expected reply")]
    MissingReply { request_id: RequestId, kind: RequestKind },

    #[error("Session shut down while waiting for {kind} request {request_id}")]
    Shutdown { request_id: RequestId, kind: RequestKind },

    #[error("Session is {0}, not active")]
    NotReady(SessionState),

    #[error("Session already started")]
    AlreadyStarted,

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Rendezvous error: {0}")]
    Rendezvous(#[from] RendezvousError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Errors after which the process should exit
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Handshake(_) | SessionError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        let handshake = SessionError::from(HandshakeError::Disconnected { reason: 0x1001 });
        assert!(handshake.is_fatal());
        assert!(handshake.to_string().contains("0x1001"));

        let timeout = SessionError::QueryTimeout {
            request_id: 104,
            kind: RequestKind::QueryPosition,
            timeout: Duration::from_secs(5),
        };
        assert!(!timeout.is_fatal());
        assert!(!SessionError::NotReady(SessionState::LoggingIn).is_fatal());
    }
}
