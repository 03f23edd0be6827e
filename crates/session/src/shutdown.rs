//! Process-wide exit request

use std::sync::{Arc, OnceLock};

use log::info;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Shared exit request, settable from signal handlers and sessions
///
/// Cloning shares the same underlying token. The first reason given is
/// kept and logged; later triggers only re-cancel.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; returns true for the first request
    pub fn trigger(&self, reason: impl Into<String>) -> bool {
        let first = self.reason.set(reason.into()).is_ok();
        if first {
            info!("Shutdown requested: {}", self.reason().unwrap_or_default());
        }
        self.token.cancel();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once shutdown has been requested
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
