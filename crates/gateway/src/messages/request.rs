use std::fmt;
use std::time::Duration;

use hermes_core::Credentials;
use serde::{Deserialize, Serialize};

use super::trade::InputOrder;

/// Deadline for each handshake step
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for queries and order inserts
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Kind of request awaiting a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Authenticate,
    Login,
    QueryInstrument,
    QueryPosition,
    SubscribeMarketData,
    OrderInsert,
}

impl RequestKind {
    /// Part of the authenticate -> login -> subscribe sequence
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            RequestKind::Authenticate | RequestKind::Login | RequestKind::SubscribeMarketData
        )
    }

    pub fn default_timeout(&self) -> Duration {
        if self.is_handshake() {
            HANDSHAKE_TIMEOUT
        } else {
            REQUEST_TIMEOUT
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Authenticate => "authenticate",
            RequestKind::Login => "login",
            RequestKind::QueryInstrument => "query-instrument",
            RequestKind::QueryPosition => "query-position",
            RequestKind::SubscribeMarketData => "subscribe-market-data",
            RequestKind::OrderInsert => "order-insert",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateRequest {
    pub broker_id: String,
    pub user_id: String,
    pub app_id: String,
    pub auth_code: String,
}

impl From<&Credentials> for AuthenticateRequest {
    fn from(creds: &Credentials) -> Self {
        Self {
            broker_id: creds.broker_id.clone(),
            user_id: creds.user_id.clone(),
            app_id: creds.app_id.clone(),
            auth_code: creds.auth_code.clone(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub broker_id: String,
    pub user_id: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("broker_id", &self.broker_id)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl From<&Credentials> for LoginRequest {
    fn from(creds: &Credentials) -> Self {
        Self {
            broker_id: creds.broker_id.clone(),
            user_id: creds.user_id.clone(),
            password: creds.password.clone(),
        }
    }
}

/// Empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryInstrumentRequest {
    pub exchange_id: String,
    pub instrument_id: String,
}

/// Empty instrument matches every position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPositionRequest {
    pub broker_id: String,
    pub investor_id: String,
    pub instrument_id: String,
}

/// Every request the front accepts
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayRequest {
    Authenticate(AuthenticateRequest),
    Login(LoginRequest),
    QueryInstrument(QueryInstrumentRequest),
    QueryPosition(QueryPositionRequest),
    SubscribeMarketData { instruments: Vec<String> },
    OrderInsert(InputOrder),
}

impl GatewayRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            GatewayRequest::Authenticate(_) => RequestKind::Authenticate,
            GatewayRequest::Login(_) => RequestKind::Login,
            GatewayRequest::QueryInstrument(_) => RequestKind::QueryInstrument,
            GatewayRequest::QueryPosition(_) => RequestKind::QueryPosition,
            GatewayRequest::SubscribeMarketData { .. } => RequestKind::SubscribeMarketData,
            GatewayRequest::OrderInsert(_) => RequestKind::OrderInsert,
        }
    }
}
