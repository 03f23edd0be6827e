//! Error types for the gateway crate

use std::time::Duration;

use hermes_core::RequestId;
use thiserror::Error;

use crate::messages::RequestKind;

/// Gateway-level errors (handle and factory operations)
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Send of {kind} request {request_id} failed with code {code}")]
    SendFailed {
        kind: RequestKind,
        request_id: RequestId,
        code: i32,
    },

    #[error("Gateway handle already released")]
    Released,

    #[error("Failed to create gateway: {0}")]
    Create(String),

    #[error("Rendezvous error: {0}")]
    Rendezvous(#[from] RendezvousError),
}

/// Registration errors of the rendezvous table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RendezvousError {
    #[error("Request {0} already has a pending waiter")]
    DuplicateRequest(RequestId),
}

/// Why a waiter returned without a reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    #[error("No reply to {kind} request {request_id} within {timeout:?}")]
    TimedOut {
        request_id: RequestId,
        kind: RequestKind,
        timeout: Duration,
    },

    #[error("Wait for {kind} request {request_id} cancelled by shutdown")]
    Cancelled { request_id: RequestId, kind: RequestKind },

    #[error("Pending {kind} request {request_id} dropped before completion")]
    Abandoned { request_id: RequestId, kind: RequestKind },
}

impl WaitError {
    pub fn request_id(&self) -> RequestId {
        match self {
            WaitError::TimedOut { request_id, .. }
            | WaitError::Cancelled { request_id, .. }
            | WaitError::Abandoned { request_id, .. } => *request_id,
        }
    }
}
