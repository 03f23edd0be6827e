//! Trade-front payloads: login results, query rows, orders and fills.
//!
//! Flag enums carry the single-character codes the vendor front expects.

use serde::{Deserialize, Serialize};

macro_rules! vendor_flag {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $variant:ident = $code:literal ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name { $( $variant ),* }

        impl $name {
            /// Vendor wire code
            pub fn as_char(&self) -> char {
                match self { $( $name::$variant => $code ),* }
            }

            pub fn from_char(code: char) -> Option<Self> {
                match code { $( $code => Some($name::$variant), )* _ => None }
            }
        }
    };
}

vendor_flag! {
    pub enum Direction { Buy = '0', Sell = '1' }
}

vendor_flag! {
    pub enum OffsetFlag { Open = '0', Close = '1', ForceClose = '2', CloseToday = '3', CloseYesterday = '4' }
}

vendor_flag! {
    pub enum HedgeFlag { Speculation = '1', Arbitrage = '2', Hedge = '3' }
}

vendor_flag! {
    pub enum ForceCloseReason { NotForceClose = '0', LackDeposit = '1' }
}

vendor_flag! {
    pub enum ContingentCondition { Immediately = '1', Touch = '2' }
}

vendor_flag! {
    pub enum OrderPriceType { AnyPrice = '1', LimitPrice = '2' }
}

vendor_flag! {
    /// IOC: immediate or cancel, GFD: good for day
    pub enum TimeCondition { Ioc = '1', Gfd = '3' }
}

vendor_flag! {
    pub enum VolumeCondition { Any = '1', Min = '2', Complete = '3' }
}

vendor_flag! {
    pub enum OrderStatus {
        AllTraded = '0',
        PartTradedQueueing = '1',
        PartTradedNotQueueing = '2',
        NoTradeQueueing = '3',
        NoTradeNotQueueing = '4',
        Canceled = '5',
        Unknown = 'a',
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateInfo {
    pub broker_id: String,
    pub user_id: String,
    pub app_id: String,
}

/// Result of a successful login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub trading_day: String,
    pub login_time: String,
    pub broker_id: String,
    pub user_id: String,
    pub front_id: i32,
    pub session_id: i32,
    pub max_order_ref: String,
}

/// One row of an instrument query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub instrument_id: String,
    pub exchange_id: String,
    pub instrument_name: String,
    pub product_id: String,
    pub delivery_year: i32,
    pub delivery_month: i32,
    pub volume_multiple: i32,
    pub price_tick: f64,
    pub expire_date: String,
    pub is_trading: bool,
}

/// One row of a position query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub instrument_id: String,
    pub exchange_id: String,
    /// '2' long, '3' short
    pub posi_direction: char,
    pub position: i32,
    pub yd_position: i32,
    pub today_position: i32,
    pub open_cost: f64,
    pub position_profit: f64,
    pub use_margin: f64,
}

/// Order insert request, also echoed back on rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputOrder {
    pub broker_id: String,
    pub investor_id: String,
    pub exchange_id: String,
    pub instrument_id: String,
    pub order_ref: String,
    pub direction: Direction,
    pub comb_offset_flag: OffsetFlag,
    pub comb_hedge_flag: HedgeFlag,
    pub order_price_type: OrderPriceType,
    pub limit_price: f64,
    pub volume_total_original: i32,
    pub time_condition: TimeCondition,
    pub volume_condition: VolumeCondition,
    pub min_volume: i32,
    pub contingent_condition: ContingentCondition,
    pub force_close_reason: ForceCloseReason,
    pub is_auto_suspend: bool,
}

/// Order-update push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub order_sys_id: String,
    pub front_id: i32,
    pub session_id: i32,
    pub direction: Direction,
    pub limit_price: f64,
    pub volume_total_original: i32,
    pub volume_traded: i32,
    pub order_status: OrderStatus,
    pub status_msg: String,
    pub insert_time: String,
}

/// Trade-update (fill) push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInfo {
    pub instrument_id: String,
    pub exchange_id: String,
    pub order_ref: String,
    pub order_sys_id: String,
    pub trade_id: String,
    pub direction: Direction,
    pub offset_flag: OffsetFlag,
    pub price: f64,
    pub volume: i32,
    pub trade_time: String,
}
