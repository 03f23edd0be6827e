//! Typed gateway messages
//!
//! Every callback the vendor front can deliver is one variant of the closed
//! [`GatewayEvent`] enum; every request it accepts is one variant of
//! [`GatewayRequest`]. Optional vendor fields are explicit `Option`s.

pub mod event;
pub mod market_data;
pub mod request;
pub mod response;
pub mod trade;

pub use event::{CallbackKind, GatewayEvent, describe_disconnect};
pub use market_data::{DepthMarketData, SpecificInstrument};
pub use request::{
    AuthenticateRequest, GatewayRequest, LoginRequest, QueryInstrumentRequest, QueryPositionRequest,
    RequestKind,
};
pub use response::{Response, ResponsePayload, RspInfo};
pub use trade::{
    AuthenticateInfo, ContingentCondition, Direction, ForceCloseReason, HedgeFlag, InputOrder,
    InstrumentInfo, LoginInfo, OffsetFlag, OrderInfo, OrderPriceType, OrderStatus, PositionInfo,
    TimeCondition, TradeInfo, VolumeCondition,
};
