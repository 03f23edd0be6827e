//! Callback dispatch and handshake transitions shared by every session kind

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hermes_gateway::messages::{
    AuthenticateInfo, AuthenticateRequest, GatewayEvent, GatewayRequest, LoginInfo, LoginRequest, RequestKind, Response,
    describe_disconnect,
};
use hermes_gateway::{
    ApiKind, Completion, EventSink, GatewayApi, GatewayHandle, RendezvousTable, RequestIdAllocator, ResponsePart,
    Waiter,
};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::config::SessionConfig;
use crate::error::{HandshakeError, Result};
use crate::shutdown::ShutdownSignal;
use crate::state::SessionState;

/// What distinguishes a market-data session from a trade session
pub trait SessionVariant: Send + Sync + Sized + 'static {
    const API: ApiKind;
    /// Short tag used in log lines
    const NAME: &'static str;
    /// Whether the front expects an authenticate request before login
    const AUTHENTICATE: bool;

    /// Configure the gateway before `init()`
    fn prepare(&self, _api: &dyn GatewayApi) {}

    /// Continue the handshake after a successful login
    fn on_login(&self, core: &SessionCore<Self>, login: &LoginInfo);

    /// Every callback the shared handshake logic does not consume
    fn on_event(&self, core: &SessionCore<Self>, event: GatewayEvent);

    /// Called once, after the gateway is released
    fn on_shutdown(&self) {}
}

/// Session state shared between the control task and the gateway's
/// callback thread
pub struct SessionCore<V: SessionVariant> {
    config: SessionConfig,
    handle: GatewayHandle,
    table: RendezvousTable,
    ids: RequestIdAllocator,
    state: watch::Sender<SessionState>,
    logged_in: AtomicBool,
    shutdown: ShutdownSignal,
    last_error: Mutex<Option<HandshakeError>>,
    handshake_tx: mpsc::UnboundedSender<Waiter>,
    variant: V,
}

impl<V: SessionVariant> SessionCore<V> {
    pub(crate) fn new(
        config: SessionConfig,
        handle: GatewayHandle,
        variant: V,
        shutdown: ShutdownSignal,
        handshake_tx: mpsc::UnboundedSender<Waiter>,
    ) -> Self {
        Self {
            config,
            handle,
            table: RendezvousTable::new(),
            ids: RequestIdAllocator::new(),
            state: watch::Sender::new(SessionState::Disconnected),
            logged_in: AtomicBool::new(false),
            shutdown,
            last_error: Mutex::new(None),
            handshake_tx,
            variant,
        }
    }

    pub fn name(&self) -> &'static str {
        V::NAME
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn variant(&self) -> &V {
        &self.variant
    }

    pub fn table(&self) -> &RendezvousTable {
        &self.table
    }

    pub fn handle(&self) -> &GatewayHandle {
        &self.handle
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!("[{}] {previous} -> {next}", V::NAME);
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<HandshakeError> {
        self.last_error.lock().clone()
    }

    /// Allocate an id and register its pending entry, without sending
    pub fn register(&self, kind: RequestKind, timeout: Duration, completion: Completion) -> Result<Waiter> {
        let request_id = self.ids.next();
        Ok(self.table.register(request_id, kind, timeout, completion)?)
    }

    pub fn send(&self, request: &GatewayRequest, waiter: &Waiter) -> Result<()> {
        self.handle.send(request, waiter.request_id())?;
        debug!("[{}] sent {} request {}", V::NAME, request.kind(), waiter.request_id());
        Ok(())
    }

    /// Register then send; dropping the returned waiter abandons the request
    pub fn request(&self, request: &GatewayRequest, timeout: Duration, completion: Completion) -> Result<Waiter> {
        let waiter = self.register(request.kind(), timeout, completion)?;
        self.send(request, &waiter)?;
        Ok(waiter)
    }

    /// Enter `state` and send the request for it, queueing the waiter for
    /// the task running `start()`
    pub fn handshake_step(&self, state: SessionState, request: GatewayRequest, completion: Completion) {
        let step = request.kind();
        self.set_state(state);
        match self.request(&request, self.config.handshake_timeout, completion) {
            Ok(waiter) => {
                info!("[{}] {step} sent (request {})", V::NAME, waiter.request_id());
                if self.handshake_tx.send(waiter).is_err() {
                    debug!("[{}] no handshake in progress, {step} reply will not be awaited", V::NAME);
                }
            }
            Err(e) => self.fail(HandshakeError::SendFailed {
                step,
                message: e.to_string(),
            }),
        }
    }

    /// Mark the handshake failed and request process shutdown
    pub fn fail(&self, err: HandshakeError) {
        error!("[{}] handshake failed: {err}", V::NAME);
        self.record_error(err);
        self.set_state(SessionState::Failed);
        self.shutdown.trigger(format!("{} session handshake failed", V::NAME));
    }

    /// Keep the first handshake error only
    fn record_error(&self, err: HandshakeError) {
        let mut last = self.last_error.lock();
        if last.is_none() {
            *last = Some(err);
        }
    }

    fn on_front_connected(&self) {
        let state = self.state();
        if self.shutdown.is_triggered() || !matches!(state, SessionState::Disconnected | SessionState::Connecting) {
            warn!("[{}] front connected while {state}, ignoring", V::NAME);
            return;
        }
        info!("[{}] front connected", V::NAME);

        let credentials = &self.config.credentials;
        if V::AUTHENTICATE {
            self.handshake_step(
                SessionState::Authenticating,
                GatewayRequest::Authenticate(AuthenticateRequest::from(credentials)),
                Completion::UntilLast,
            );
        } else {
            self.handshake_step(
                SessionState::LoggingIn,
                GatewayRequest::Login(LoginRequest::from(credentials)),
                Completion::UntilLast,
            );
        }
    }

    fn on_front_disconnected(&self, reason: i32) {
        error!(
            "[{}] front disconnected: {reason:#06x} {}",
            V::NAME,
            describe_disconnect(reason)
        );
        if self.state().is_handshaking() {
            self.record_error(HandshakeError::Disconnected { reason });
        }
        self.logged_in.store(false, Ordering::SeqCst);
        self.set_state(SessionState::Disconnected);
        self.shutdown.trigger(format!("{} front disconnected", V::NAME));
    }

    fn on_authenticated(&self, response: Response<AuthenticateInfo>) {
        match check_handshake_reply(RequestKind::Authenticate, &response) {
            Ok(()) => {
                info!("[{}] authenticated (request {})", V::NAME, response.request_id);
                self.handshake_step(
                    SessionState::LoggingIn,
                    GatewayRequest::Login(LoginRequest::from(&self.config.credentials)),
                    Completion::UntilLast,
                );
            }
            Err(e) => self.fail(e),
        }
        self.table.deliver_response(response);
    }

    fn on_logged_in(&self, response: Response<LoginInfo>) {
        match (check_handshake_reply(RequestKind::Login, &response), &response.payload) {
            (Ok(()), Some(login)) => {
                self.logged_in.store(true, Ordering::SeqCst);
                info!(
                    "[{}] logged in as {} (trading day {}, front {}, session {})",
                    V::NAME,
                    login.user_id,
                    login.trading_day,
                    login.front_id,
                    login.session_id
                );
                self.variant.on_login(self, login);
            }
            (Err(e), _) => self.fail(e),
            (Ok(()), None) => self.fail(HandshakeError::MissingPayload {
                step: RequestKind::Login,
                request_id: response.request_id,
            }),
        }
        self.table.deliver_response(response);
    }
}

/// A handshake reply must carry no error and a payload
fn check_handshake_reply<T>(step: RequestKind, response: &Response<T>) -> std::result::Result<(), HandshakeError> {
    if let Some(info) = response.error() {
        return Err(HandshakeError::Rejected {
            step,
            request_id: response.request_id,
            error_id: info.error_id,
            message: info.error_msg.clone(),
        });
    }
    if response.payload.is_none() {
        return Err(HandshakeError::MissingPayload {
            step,
            request_id: response.request_id,
        });
    }
    Ok(())
}

impl<V: SessionVariant> EventSink for SessionCore<V> {
    fn on_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::FrontConnected => self.on_front_connected(),
            GatewayEvent::FrontDisconnected { reason } => self.on_front_disconnected(reason),
            GatewayEvent::HeartbeatWarning { elapsed_secs } => {
                debug!("[{}] heartbeat warning, {elapsed_secs}s since last message", V::NAME);
            }
            GatewayEvent::ResponseError {
                info,
                request_id,
                is_last,
            } => {
                error!(
                    "[{}] error response to request {request_id}: [{}] {}",
                    V::NAME,
                    info.error_id,
                    info.error_msg
                );
                self.table.deliver(request_id, ResponsePart::Error(info), is_last);
            }
            GatewayEvent::Authenticate(response) => self.on_authenticated(response),
            GatewayEvent::Login(response) => self.on_logged_in(response),
            other => self.variant.on_event(self, other),
        }
    }
}
