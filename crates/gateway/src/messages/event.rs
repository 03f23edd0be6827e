use std::fmt;

use super::market_data::{DepthMarketData, SpecificInstrument};
use super::response::{Response, RspInfo};
use super::trade::{AuthenticateInfo, InputOrder, InstrumentInfo, LoginInfo, OrderInfo, PositionInfo, TradeInfo};
use hermes_core::RequestId;

/// Every callback the front can deliver
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    FrontConnected,
    FrontDisconnected { reason: i32 },
    HeartbeatWarning { elapsed_secs: i32 },
    ResponseError {
        info: RspInfo,
        request_id: RequestId,
        is_last: bool,
    },
    Authenticate(Response<AuthenticateInfo>),
    Login(Response<LoginInfo>),
    QueryInstrument(Response<InstrumentInfo>),
    QueryPosition(Response<PositionInfo>),
    SubscribeMarketData(Response<SpecificInstrument>),
    MarketData(DepthMarketData),
    OrderInsert(Response<InputOrder>),
    OrderUpdate(OrderInfo),
    TradeUpdate(TradeInfo),
}

/// Discriminant of [`GatewayEvent`], used for dispatch logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    FrontConnected,
    FrontDisconnected,
    HeartbeatWarning,
    ResponseError,
    Authenticate,
    Login,
    QueryInstrument,
    QueryPosition,
    SubscribeMarketData,
    MarketData,
    OrderInsert,
    OrderUpdate,
    TradeUpdate,
}

impl GatewayEvent {
    pub fn kind(&self) -> CallbackKind {
        match self {
            GatewayEvent::FrontConnected => CallbackKind::FrontConnected,
            GatewayEvent::FrontDisconnected { .. } => CallbackKind::FrontDisconnected,
            GatewayEvent::HeartbeatWarning { .. } => CallbackKind::HeartbeatWarning,
            GatewayEvent::ResponseError { .. } => CallbackKind::ResponseError,
            GatewayEvent::Authenticate(_) => CallbackKind::Authenticate,
            GatewayEvent::Login(_) => CallbackKind::Login,
            GatewayEvent::QueryInstrument(_) => CallbackKind::QueryInstrument,
            GatewayEvent::QueryPosition(_) => CallbackKind::QueryPosition,
            GatewayEvent::SubscribeMarketData(_) => CallbackKind::SubscribeMarketData,
            GatewayEvent::MarketData(_) => CallbackKind::MarketData,
            GatewayEvent::OrderInsert(_) => CallbackKind::OrderInsert,
            GatewayEvent::OrderUpdate(_) => CallbackKind::OrderUpdate,
            GatewayEvent::TradeUpdate(_) => CallbackKind::TradeUpdate,
        }
    }

    /// Request this event answers, for reply callbacks
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            GatewayEvent::ResponseError { request_id, .. } => Some(*request_id),
            GatewayEvent::Authenticate(r) => Some(r.request_id),
            GatewayEvent::Login(r) => Some(r.request_id),
            GatewayEvent::QueryInstrument(r) => Some(r.request_id),
            GatewayEvent::QueryPosition(r) => Some(r.request_id),
            GatewayEvent::SubscribeMarketData(r) => Some(r.request_id),
            GatewayEvent::OrderInsert(r) => Some(r.request_id),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Human-readable meaning of a front-disconnect reason code
pub fn describe_disconnect(reason: i32) -> &'static str {
    match reason {
        0x1001 => "network read failure",
        0x1002 => "network write failure",
        0x2001 => "heartbeat receive timeout",
        0x2002 => "heartbeat send failure",
        0x2003 => "malformed packet received",
        _ => "unknown reason",
    }
}
