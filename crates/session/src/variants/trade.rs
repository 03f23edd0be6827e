//! Trade session: authenticate, login, queries and order entry

use std::time::Duration;

use dashmap::DashMap;
use hermes_core::{Credentials, Price, RequestId, Volume};
use hermes_gateway::messages::{
    ContingentCondition, Direction, ForceCloseReason, GatewayEvent, GatewayRequest, HedgeFlag, InputOrder,
    InstrumentInfo, LoginInfo, OffsetFlag, OrderInfo, OrderPriceType, PositionInfo, QueryInstrumentRequest,
    QueryPositionRequest, TimeCondition, VolumeCondition,
};
use hermes_gateway::{ApiKind, Completion, GatewayApi, RequestKind, ResponsePart, ResumeType};
use log::{debug, error, info};
use parking_lot::Mutex;

use crate::controller::SessionController;
use crate::dispatch::{SessionCore, SessionVariant};
use crate::error::{Result, SessionError};
use crate::state::SessionState;

/// Order entry parameters the caller chooses
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub exchange_id: String,
    pub instrument_id: String,
    pub direction: Direction,
    pub offset: OffsetFlag,
    pub price_type: OrderPriceType,
    pub limit_price: Price,
    pub volume: Volume,
    pub time_condition: TimeCondition,
    pub volume_condition: VolumeCondition,
    pub min_volume: Volume,
}

impl OrderRequest {
    /// Good-for-day limit order, any volume
    pub fn limit(
        exchange_id: impl Into<String>,
        instrument_id: impl Into<String>,
        direction: Direction,
        offset: OffsetFlag,
        price: Price,
        volume: Volume,
    ) -> Self {
        Self {
            exchange_id: exchange_id.into(),
            instrument_id: instrument_id.into(),
            direction,
            offset,
            price_type: OrderPriceType::LimitPrice,
            limit_price: price,
            volume,
            time_condition: TimeCondition::Gfd,
            volume_condition: VolumeCondition::Any,
            min_volume: 1,
        }
    }

    pub fn with_time_condition(mut self, condition: TimeCondition) -> Self {
        self.time_condition = condition;
        self
    }

    pub fn with_volume_condition(mut self, condition: VolumeCondition, min_volume: Volume) -> Self {
        self.volume_condition = condition;
        self.min_volume = min_volume;
        self
    }

    fn into_input(self, credentials: &Credentials, order_ref: String) -> InputOrder {
        InputOrder {
            broker_id: credentials.broker_id.clone(),
            investor_id: credentials.user_id.clone(),
            exchange_id: self.exchange_id,
            instrument_id: self.instrument_id,
            order_ref,
            direction: self.direction,
            comb_offset_flag: self.offset,
            comb_hedge_flag: HedgeFlag::Speculation,
            order_price_type: self.price_type,
            limit_price: self.limit_price,
            volume_total_original: self.volume,
            time_condition: self.time_condition,
            volume_condition: self.volume_condition,
            min_volume: self.min_volume,
            contingent_condition: ContingentCondition::Immediately,
            force_close_reason: ForceCloseReason::NotForceClose,
            is_auto_suspend: false,
        }
    }
}

/// An order reference is only unique within one front session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OrderKey {
    front_id: i32,
    session_id: i32,
    order_ref: String,
}

impl OrderKey {
    fn of(order: &OrderInfo) -> Self {
        Self {
            front_id: order.front_id,
            session_id: order.session_id,
            order_ref: order.order_ref.clone(),
        }
    }
}

/// Trade behaviour of a session
#[derive(Default)]
pub struct Trade {
    order_ref: Mutex<u64>,
    login: Mutex<Option<LoginInfo>>,
    /// insert request waiting for its first order update
    pending_orders: DashMap<OrderKey, RequestId>,
}

impl Trade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login_info(&self) -> Option<LoginInfo> {
        self.login.lock().clone()
    }

    /// Reference the next insert will carry
    pub fn next_order_ref(&self) -> u64 {
        *self.order_ref.lock()
    }

    pub fn pending_orders(&self) -> usize {
        self.pending_orders.len()
    }

    /// Key an order sent by this login
    fn own_key(&self, order_ref: &str) -> Option<OrderKey> {
        self.login.lock().as_ref().map(|login| OrderKey {
            front_id: login.front_id,
            session_id: login.session_id,
            order_ref: order_ref.to_string(),
        })
    }

    fn on_order_update(&self, core: &SessionCore<Self>, order: OrderInfo) {
        info!(
            "[td] order {} {} {:?} {}@{} status {:?} traded {}/{}: {}",
            order.order_ref,
            order.instrument_id,
            order.direction,
            order.volume_total_original,
            order.limit_price,
            order.order_status,
            order.volume_traded,
            order.volume_total_original,
            order.status_msg
        );
        match self.pending_orders.remove(&OrderKey::of(&order)) {
            Some((_, request_id)) => {
                core.table()
                    .deliver(request_id, ResponsePart::Payload(order.into()), true);
            }
            None => debug!(
                "[td] order {} of front {} session {} matches no pending insert",
                order.order_ref, order.front_id, order.session_id
            ),
        }
    }
}

impl SessionVariant for Trade {
    const API: ApiKind = ApiKind::Trade;
    const NAME: &'static str = "td";
    const AUTHENTICATE: bool = true;

    fn prepare(&self, api: &dyn GatewayApi) {
        api.subscribe_topics(ResumeType::Quick, ResumeType::Quick);
    }

    fn on_login(&self, core: &SessionCore<Self>, login: &LoginInfo) {
        *self.order_ref.lock() = 1;
        info!(
            "[td] trading day {}, front {}, session {}, max order ref {}",
            login.trading_day, login.front_id, login.session_id, login.max_order_ref
        );
        *self.login.lock() = Some(login.clone());
        core.set_state(SessionState::Active);
    }

    fn on_event(&self, core: &SessionCore<Self>, event: GatewayEvent) {
        match event {
            GatewayEvent::QueryInstrument(response) => {
                core.table().deliver_response(response);
            }
            GatewayEvent::QueryPosition(response) => {
                core.table().deliver_response(response);
            }
            GatewayEvent::OrderInsert(response) => {
                if let Some(key) = response.payload.as_ref().and_then(|order| self.own_key(&order.order_ref)) {
                    self.pending_orders.remove(&key);
                }
                if let Some(info) = response.error() {
                    error!(
                        "[td] order insert rejected (request {}): [{}] {}",
                        response.request_id, info.error_id, info.error_msg
                    );
                }
                core.table().deliver_response(response);
            }
            GatewayEvent::OrderUpdate(order) => self.on_order_update(core, order),
            GatewayEvent::TradeUpdate(trade) => info!(
                "[td] trade {} order {} {} {:?} {:?} {}@{} at {}",
                trade.trade_id.trim(),
                trade.order_ref,
                trade.instrument_id,
                trade.direction,
                trade.offset_flag,
                trade.volume,
                trade.price,
                trade.trade_time
            ),
            other => debug!("[td] ignoring {:?} callback", other.kind()),
        }
    }
}

pub type TradeSession = SessionController<Trade>;

impl SessionController<Trade> {
    /// Empty ids match everything
    pub async fn query_instrument(&self, exchange_id: &str, instrument_id: &str) -> Result<Vec<InstrumentInfo>> {
        let request = GatewayRequest::QueryInstrument(QueryInstrumentRequest {
            exchange_id: exchange_id.to_string(),
            instrument_id: instrument_id.to_string(),
        });
        let batch = self.call(&request, Completion::UntilLast).await?;
        Ok(batch.payloads_of())
    }

    /// Empty instrument returns every position
    pub async fn query_position(&self, instrument_id: &str) -> Result<Vec<PositionInfo>> {
        let credentials = &self.core().config().credentials;
        let request = GatewayRequest::QueryPosition(QueryPositionRequest {
            broker_id: credentials.broker_id.clone(),
            investor_id: credentials.user_id.clone(),
            instrument_id: instrument_id.to_string(),
        });
        let batch = self.call(&request, Completion::UntilLast).await?;
        Ok(batch.payloads_of())
    }

    /// Send an order and wait for the front to accept or reject it
    pub async fn insert_order(&self, order: OrderRequest) -> Result<OrderInfo> {
        self.ensure_active()?;
        let core = self.core();
        let variant = core.variant();
        let timeout = core.config().request_timeout;

        let (waiter, key) = {
            let mut next = variant.order_ref.lock();
            let order_ref = next.to_string();
            let key = variant
                .own_key(&order_ref)
                .ok_or(SessionError::NotReady(core.state()))?;
            let waiter = core.register(RequestKind::OrderInsert, timeout, Completion::UntilLast)?;
            variant.pending_orders.insert(key.clone(), waiter.request_id());
            let input = order.into_input(&core.config().credentials, order_ref);
            if let Err(e) = core.send(&GatewayRequest::OrderInsert(input), &waiter) {
                variant.pending_orders.remove(&key);
                return Err(e);
            }
            *next += 1;
            (waiter, key)
        };
        let order_ref = key.order_ref.clone();
        info!("[td] order {order_ref} sent (request {})", waiter.request_id());

        let request_id = waiter.request_id();
        let outcome = self.await_reply(waiter).await;
        if outcome.is_err() {
            variant.pending_orders.remove(&key);
        }
        let batch = match outcome {
            Ok(batch) => batch,
            Err(SessionError::QueryTimeout { request_id, timeout, .. }) => {
                return Err(order_timeout(request_id, order_ref, timeout));
            }
            Err(e) => return Err(e),
        };

        batch
            .payloads_of::<OrderInfo>()
            .into_iter()
            .next()
            .ok_or(SessionError::MissingReply {
                request_id,
                kind: RequestKind::OrderInsert,
            })
    }

    pub fn login_info(&self) -> Option<LoginInfo> {
        self.variant().login_info()
    }

    pub fn next_order_ref(&self) -> u64 {
        self.variant().next_order_ref()
    }
}

fn order_timeout(request_id: RequestId, order_ref: String, timeout: Duration) -> SessionError {
    SessionError::OrderTimeout {
        request_id,
        order_ref,
        timeout,
    }
}
