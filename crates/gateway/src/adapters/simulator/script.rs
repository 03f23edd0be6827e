use std::collections::{HashMap, HashSet};

use hermes_core::RequestId;

use crate::messages::{
    AuthenticateInfo, DepthMarketData, GatewayEvent, GatewayRequest, InputOrder, InstrumentInfo, LoginInfo,
    OrderInfo, OrderStatus, PositionInfo, RequestKind, Response, RspInfo, SpecificInstrument, TradeInfo,
};

/// Scripted behaviour of the simulated front
#[derive(Debug, Clone)]
pub struct SimulatorScript {
    pub trading_day: String,
    /// Deliver `FrontConnected` as soon as `init` runs
    pub connect_on_init: bool,
    /// Reply to these kinds with an error status
    pub rejections: HashMap<RequestKind, RspInfo>,
    /// Never reply to these kinds
    pub silent: HashSet<RequestKind>,
    /// Refuse to send these kinds (non-zero return code)
    pub send_failures: HashSet<RequestKind>,
    pub instruments: Vec<InstrumentInfo>,
    pub positions: Vec<PositionInfo>,
    /// Pushed after a subscription, for subscribed instruments only
    pub ticks: Vec<DepthMarketData>,
    /// Fill accepted orders in full at their limit price
    pub fill_orders: bool,
    pub front_id: i32,
    pub session_id: i32,
}

impl Default for SimulatorScript {
    fn default() -> Self {
        Self {
            trading_day: "20250101".to_string(),
            connect_on_init: true,
            rejections: HashMap::new(),
            silent: HashSet::new(),
            send_failures: HashSet::new(),
            instruments: Vec::new(),
            positions: Vec::new(),
            ticks: Vec::new(),
            fill_orders: false,
            front_id: 1,
            session_id: 0x5a17,
        }
    }
}

impl SimulatorScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trading_day(mut self, trading_day: &str) -> Self {
        self.trading_day = trading_day.to_string();
        self
    }

    pub fn without_connect(mut self) -> Self {
        self.connect_on_init = false;
        self
    }

    pub fn rejecting(mut self, kind: RequestKind, error_id: i32, message: &str) -> Self {
        self.rejections.insert(kind, RspInfo::error(error_id, message));
        self
    }

    pub fn silent_on(mut self, kind: RequestKind) -> Self {
        self.silent.insert(kind);
        self
    }

    pub fn failing_send(mut self, kind: RequestKind) -> Self {
        self.send_failures.insert(kind);
        self
    }

    pub fn with_instruments(mut self, instruments: Vec<InstrumentInfo>) -> Self {
        self.instruments = instruments;
        self
    }

    pub fn with_positions(mut self, positions: Vec<PositionInfo>) -> Self {
        self.positions = positions;
        self
    }

    pub fn with_ticks(mut self, ticks: Vec<DepthMarketData>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn filling_orders(mut self) -> Self {
        self.fill_orders = true;
        self
    }

    /// Callbacks answering one request, in delivery order
    pub(crate) fn respond(&self, request: &GatewayRequest, request_id: RequestId, seq: &mut u64) -> Vec<GatewayEvent> {
        let kind = request.kind();
        if self.silent.contains(&kind) {
            return Vec::new();
        }
        let rejection = self.rejections.get(&kind).cloned();

        match request {
            GatewayRequest::Authenticate(req) => {
                let response = match rejection {
                    Some(info) => Response::rejected(info, request_id),
                    None => Response::ok(
                        AuthenticateInfo {
                            broker_id: req.broker_id.clone(),
                            user_id: req.user_id.clone(),
                            app_id: req.app_id.clone(),
                        },
                        request_id,
                        true,
                    ),
                };
                vec![GatewayEvent::Authenticate(response)]
            }
            GatewayRequest::Login(req) => {
                let response = match rejection {
                    Some(info) => Response::rejected(info, request_id),
                    None => Response::ok(
                        LoginInfo {
                            trading_day: self.trading_day.clone(),
                            login_time: "08:55:00".to_string(),
                            broker_id: req.broker_id.clone(),
                            user_id: req.user_id.clone(),
                            front_id: self.front_id,
                            session_id: self.session_id,
                            max_order_ref: "1".to_string(),
                        },
                        request_id,
                        true,
                    ),
                };
                vec![GatewayEvent::Login(response)]
            }
            GatewayRequest::SubscribeMarketData { instruments } => {
                let mut events: Vec<GatewayEvent> = instruments
                    .iter()
                    .map(|id| {
                        let echoed = SpecificInstrument::new(id.as_str());
                        let response = match &rejection {
                            Some(info) => Response::rejected(info.clone(), request_id).with_payload(echoed),
                            None => Response::ok(echoed, request_id, true),
                        };
                        GatewayEvent::SubscribeMarketData(response)
                    })
                    .collect();
                if rejection.is_none() {
                    events.extend(
                        self.ticks
                            .iter()
                            .filter(|tick| tick.instrument().is_some_and(|id| instruments.iter().any(|s| s == id)))
                            .cloned()
                            .map(GatewayEvent::MarketData),
                    );
                }
                events
            }
            GatewayRequest::QueryInstrument(req) => {
                if let Some(info) = rejection {
                    return vec![GatewayEvent::QueryInstrument(Response::rejected(info, request_id))];
                }
                let rows: Vec<InstrumentInfo> = self
                    .instruments
                    .iter()
                    .filter(|i| req.exchange_id.is_empty() || i.exchange_id == req.exchange_id)
                    .filter(|i| req.instrument_id.is_empty() || i.instrument_id == req.instrument_id)
                    .cloned()
                    .collect();
                paged(rows, request_id)
                    .into_iter()
                    .map(GatewayEvent::QueryInstrument)
                    .collect()
            }
            GatewayRequest::QueryPosition(req) => {
                if let Some(info) = rejection {
                    return vec![GatewayEvent::QueryPosition(Response::rejected(info, request_id))];
                }
                let rows: Vec<PositionInfo> = self
                    .positions
                    .iter()
                    .filter(|p| req.instrument_id.is_empty() || p.instrument_id == req.instrument_id)
                    .cloned()
                    .collect();
                paged(rows, request_id)
                    .into_iter()
                    .map(GatewayEvent::QueryPosition)
                    .collect()
            }
            GatewayRequest::OrderInsert(order) => match rejection {
                Some(info) => vec![GatewayEvent::OrderInsert(
                    Response::rejected(info, request_id).with_payload(order.clone()),
                )],
                None => self.accept_order(order, seq),
            },
        }
    }

    fn accept_order(&self, order: &InputOrder, seq: &mut u64) -> Vec<GatewayEvent> {
        *seq += 1;
        let order_sys_id = format!("{:>12}", *seq);
        let base = OrderInfo {
            instrument_id: order.instrument_id.clone(),
            exchange_id: order.exchange_id.clone(),
            order_ref: order.order_ref.clone(),
            order_sys_id: order_sys_id.clone(),
            front_id: self.front_id,
            session_id: self.session_id,
            direction: order.direction,
            limit_price: order.limit_price,
            volume_total_original: order.volume_total_original,
            volume_traded: 0,
            order_status: OrderStatus::NoTradeQueueing,
            status_msg: "queued".to_string(),
            insert_time: "09:00:00".to_string(),
        };

        let mut events = vec![GatewayEvent::OrderUpdate(base.clone())];
        if self.fill_orders {
            events.push(GatewayEvent::TradeUpdate(TradeInfo {
                instrument_id: order.instrument_id.clone(),
                exchange_id: order.exchange_id.clone(),
                order_ref: order.order_ref.clone(),
                order_sys_id,
                trade_id: format!("{:>20}", *seq),
                direction: order.direction,
                offset_flag: order.comb_offset_flag,
                price: order.limit_price,
                volume: order.volume_total_original,
                trade_time: "09:00:01".to_string(),
            }));
            events.push(GatewayEvent::OrderUpdate(OrderInfo {
                volume_traded: order.volume_total_original,
                order_status: OrderStatus::AllTraded,
                status_msg: "filled".to_string(),
                ..base
            }));
        }
        events
    }
}

/// Multi-part reply: terminal flag on the last row, or one empty terminal part
fn paged<T>(rows: Vec<T>, request_id: RequestId) -> Vec<Response<T>> {
    if rows.is_empty() {
        return vec![Response::empty(request_id)];
    }
    let last = rows.len() - 1;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| Response::ok(row, request_id, i == last))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::QueryPositionRequest;

    fn position(instrument: &str) -> PositionInfo {
        PositionInfo {
            instrument_id: instrument.into(),
            position: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_paged_query_flags_last_part() {
        let script = SimulatorScript::new().with_positions(vec![position("rb2601"), position("ag2601")]);
        let events = script.respond(
            &GatewayRequest::QueryPosition(QueryPositionRequest::default()),
            105,
            &mut 0,
        );
        let flags: Vec<bool> = events
            .iter()
            .map(|e| match e {
                GatewayEvent::QueryPosition(r) => r.is_last,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_empty_query_still_terminates() {
        let events = SimulatorScript::new().respond(
            &GatewayRequest::QueryPosition(QueryPositionRequest::default()),
            105,
            &mut 0,
        );
        assert_eq!(events, vec![GatewayEvent::QueryPosition(Response::empty(105))]);
    }

    #[test]
    fn test_silent_kind_never_answers() {
        let script = SimulatorScript::new().silent_on(RequestKind::QueryPosition);
        let events = script.respond(
            &GatewayRequest::QueryPosition(QueryPositionRequest::default()),
            105,
            &mut 0,
        );
        assert!(events.is_empty());
    }
}
