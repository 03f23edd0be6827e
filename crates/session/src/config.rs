use std::path::PathBuf;
use std::time::Duration;

use hermes_core::Credentials;
use hermes_gateway::messages::request::{HANDSHAKE_TIMEOUT, REQUEST_TIMEOUT};

/// Connection parameters for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Front address, e.g. `tcp://180.168.146.187:10211`
    pub front_address: String,
    pub credentials: Credentials,
    /// Prefix for the gateway's flow files
    pub stream_path: PathBuf,
    pub production_mode: bool,
    /// Bound on each handshake step
    pub handshake_timeout: Duration,
    /// Bound on queries and order inserts
    pub request_timeout: Duration,
}

impl SessionConfig {
    pub fn new(front_address: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            front_address: front_address.into(),
            credentials,
            stream_path: PathBuf::from("streams/"),
            production_mode: true,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_stream_path(mut self, stream_path: impl Into<PathBuf>) -> Self {
        self.stream_path = stream_path.into();
        self
    }

    pub fn with_production_mode(mut self, production_mode: bool) -> Self {
        self.production_mode = production_mode;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Upper bound on the whole of `start()`
    pub fn start_timeout(&self) -> Duration {
        self.handshake_timeout * 2
    }
}
