use hermes_core::RequestId;
use serde::{Deserialize, Serialize};

use super::market_data::SpecificInstrument;
use super::trade::{AuthenticateInfo, InputOrder, InstrumentInfo, LoginInfo, OrderInfo, PositionInfo};

/// Vendor response status attached to replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspInfo {
    pub error_id: i32,
    pub error_msg: String,
}

impl RspInfo {
    pub fn ok() -> Self {
        Self {
            error_id: 0,
            error_msg: String::new(),
        }
    }

    pub fn error(error_id: i32, error_msg: impl Into<String>) -> Self {
        Self {
            error_id,
            error_msg: error_msg.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_id != 0
    }
}

/// One part of a (possibly multi-part) reply to a request
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub payload: Option<T>,
    pub info: Option<RspInfo>,
    pub request_id: RequestId,
    /// Terminal flag of the batch
    pub is_last: bool,
}

impl<T> Response<T> {
    pub fn ok(payload: T, request_id: RequestId, is_last: bool) -> Self {
        Self {
            payload: Some(payload),
            info: Some(RspInfo::ok()),
            request_id,
            is_last,
        }
    }

    /// Terminal reply without payload (e.g. a query with no rows)
    pub fn empty(request_id: RequestId) -> Self {
        Self {
            payload: None,
            info: None,
            request_id,
            is_last: true,
        }
    }

    pub fn rejected(info: RspInfo, request_id: RequestId) -> Self {
        Self {
            payload: None,
            info: Some(info),
            request_id,
            is_last: true,
        }
    }

    /// Builder: attach the echoed request payload to a reply
    pub fn with_payload(mut self, payload: T) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Error status, if the vendor flagged one
    pub fn error(&self) -> Option<&RspInfo> {
        self.info.as_ref().filter(|info| info.is_error())
    }
}

/// Payloads the rendezvous table collects for a waiting request
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Authenticate(AuthenticateInfo),
    Login(LoginInfo),
    Instrument(InstrumentInfo),
    Position(PositionInfo),
    Subscribed(SpecificInstrument),
    OrderInsert(InputOrder),
    /// Order-update push that confirmed an insert
    OrderAccepted(OrderInfo),
}

macro_rules! payload_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ResponsePayload {
                fn from(value: $ty) -> Self {
                    ResponsePayload::$variant(value)
                }
            }

            impl TryFrom<ResponsePayload> for $ty {
                type Error = ResponsePayload;

                fn try_from(payload: ResponsePayload) -> Result<Self, Self::Error> {
                    match payload {
                        ResponsePayload::$variant(value) => Ok(value),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

payload_variant! {
    Authenticate => AuthenticateInfo,
    Login => LoginInfo,
    Instrument => InstrumentInfo,
    Position => PositionInfo,
    Subscribed => SpecificInstrument,
    OrderInsert => InputOrder,
    OrderAccepted => OrderInfo,
}
