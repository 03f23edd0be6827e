//! Session lifecycle: start, steady state, stop

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hermes_gateway::{
    Completion, EventSink, GatewayFactory, GatewayHandle, GatewayRequest, RendezvousTable, RequestKind, ResponseBatch,
    WaitError, Waiter,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::dispatch::{SessionCore, SessionVariant};
use crate::error::{HandshakeError, Result, SessionError};
use crate::shutdown::ShutdownSignal;
use crate::state::SessionState;

/// Shutdown-token poll period of the housekeeping loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bound on joining the housekeeping loop during `stop()`; the gateway's
/// delivery thread gets the same bound on release
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Sweep expired rendezvous entries every this many polls
const SWEEP_EVERY: u64 = 100;

/// How long past its deadline an entry may linger before it is swept
const SWEEP_GRACE: Duration = Duration::from_secs(1);

/// Owns one gateway session
///
/// `start()` runs the handshake to completion, `stop()` tears down in a
/// fixed order: shutdown signal, housekeeping join, gateway release,
/// variant cleanup. The gateway is also released if the controller is
/// dropped without `stop()`.
pub struct SessionController<V: SessionVariant> {
    core: Arc<SessionCore<V>>,
    handshake_rx: Mutex<Option<mpsc::UnboundedReceiver<Waiter>>>,
    housekeeping: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl<V: SessionVariant> SessionController<V> {
    pub fn new(
        config: SessionConfig,
        factory: &dyn GatewayFactory,
        variant: V,
        shutdown: ShutdownSignal,
    ) -> Result<Self> {
        let handle = GatewayHandle::create(factory, V::API, &config.stream_path, config.production_mode)?;
        let (handshake_tx, handshake_rx) = mpsc::unbounded_channel();
        Ok(Self {
            core: Arc::new(SessionCore::new(config, handle, variant, shutdown, handshake_tx)),
            handshake_rx: Mutex::new(Some(handshake_rx)),
            housekeeping: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn core(&self) -> &SessionCore<V> {
        &self.core
    }

    pub fn variant(&self) -> &V {
        self.core.variant()
    }

    pub fn state(&self) -> SessionState {
        self.core.state()
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        self.core.shutdown()
    }

    /// Active, logged in and not shutting down
    pub fn is_healthy(&self) -> bool {
        self.core.state().is_active() && self.core.is_logged_in() && !self.core.shutdown().is_triggered()
    }

    /// Connect and run the handshake until the session is active
    ///
    /// Returns within twice the handshake timeout. Any failure is fatal and
    /// has already requested process shutdown when this returns.
    pub async fn start(&self) -> Result<()> {
        let Some(mut handshake_rx) = self.handshake_rx.lock().take() else {
            return Err(SessionError::AlreadyStarted);
        };

        let core = &self.core;
        let config = core.config();
        info!("[{}] connecting to {}", V::NAME, config.front_address);
        core.set_state(SessionState::Connecting);

        let api = core.handle().api();
        api.register_sink(self.core.clone() as Arc<dyn EventSink>);
        api.register_front(&config.front_address);
        core.variant().prepare(api);
        api.init();

        *self.housekeeping.lock() = Some(tokio::spawn(housekeeping(
            V::NAME,
            core.table().clone(),
            core.shutdown().clone(),
        )));

        let bound = config.start_timeout();
        let outcome = match tokio::time::timeout(bound, self.drive_handshake(&mut handshake_rx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(HandshakeError::TimedOut {
                state: core.state(),
                timeout: bound,
            }),
        };

        match outcome {
            Ok(()) => {
                info!("[{}] session active", V::NAME);
                Ok(())
            }
            Err(e) => {
                if core.state() != SessionState::Failed && core.state() != SessionState::Disconnected {
                    core.fail(e.clone());
                }
                Err(e.into())
            }
        }
    }

    /// Await each handshake waiter in turn until the state machine reaches
    /// `Active`
    async fn drive_handshake(
        &self,
        handshake_rx: &mut mpsc::UnboundedReceiver<Waiter>,
    ) -> std::result::Result<(), HandshakeError> {
        let core = &self.core;
        let token = core.shutdown().token().clone();
        let step_timeout = core.config().handshake_timeout;

        loop {
            if core.state().is_active() {
                return Ok(());
            }

            let next = tokio::select! {
                _ = token.cancelled() => return Err(self.interrupted()),
                next = tokio::time::timeout(step_timeout, handshake_rx.recv()) => next,
            };
            let waiter = match next {
                Ok(Some(waiter)) => waiter,
                Ok(None) => return Err(HandshakeError::Cancelled("handshake queue closed".into())),
                Err(_) => {
                    return Err(HandshakeError::TimedOut {
                        state: core.state(),
                        timeout: step_timeout,
                    });
                }
            };

            let step = waiter.kind();
            match waiter.wait(&token).await {
                Ok(batch) => {
                    if let Some(info) = batch.first_error() {
                        // subscription rejections are per instrument and already logged
                        if step.is_handshake() && step != RequestKind::SubscribeMarketData {
                            return Err(HandshakeError::Rejected {
                                step,
                                request_id: batch.request_id,
                                error_id: info.error_id,
                                message: info.error_msg.clone(),
                            });
                        }
                    }
                    if core.state() == SessionState::Failed {
                        return Err(self.interrupted());
                    }
                }
                Err(WaitError::TimedOut { timeout, .. }) => {
                    return Err(HandshakeError::TimedOut {
                        state: core.state(),
                        timeout,
                    });
                }
                Err(WaitError::Cancelled { .. } | WaitError::Abandoned { .. }) => return Err(self.interrupted()),
            }
        }
    }

    /// Best description of why the handshake stopped early
    fn interrupted(&self) -> HandshakeError {
        self.core.last_error().unwrap_or_else(|| {
            HandshakeError::Cancelled(
                self.core
                    .shutdown()
                    .reason()
                    .unwrap_or("shutdown requested")
                    .to_string(),
            )
        })
    }

    /// Send a request and wait for its full reply with the request timeout
    pub(crate) async fn call(&self, request: &GatewayRequest, completion: Completion) -> Result<ResponseBatch> {
        self.ensure_active()?;
        let timeout = self.core.config().request_timeout;
        let waiter = self.core.request(request, timeout, completion)?;
        self.await_reply(waiter).await
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        let state = self.core.state();
        if !state.is_active() || self.core.shutdown().is_triggered() {
            return Err(SessionError::NotReady(state));
        }
        Ok(())
    }

    /// Wait on a registered request, mapping failures to session errors
    pub(crate) async fn await_reply(&self, waiter: Waiter) -> Result<ResponseBatch> {
        let token = self.core.shutdown().token().clone();
        match waiter.wait(&token).await {
            Ok(batch) => match batch.first_error() {
                Some(info) => {
                    warn!(
                        "[{}] {} request {} rejected: [{}] {}",
                        V::NAME,
                        batch.kind,
                        batch.request_id,
                        info.error_id,
                        info.error_msg
                    );
                    Err(SessionError::Rejected {
                        request_id: batch.request_id,
                        kind: batch.kind,
                        error_id: info.error_id,
                        message: info.error_msg.clone(),
                    })
                }
                None => Ok(batch),
            },
            Err(WaitError::TimedOut {
                request_id,
                kind,
                timeout,
            }) => {
                warn!("[{}] {kind} request {request_id} timed out after {timeout:?}, abandoned", V::NAME);
                Err(SessionError::QueryTimeout {
                    request_id,
                    kind,
                    timeout,
                })
            }
            Err(WaitError::Cancelled { request_id, kind } | WaitError::Abandoned { request_id, kind }) => {
                Err(SessionError::Shutdown { request_id, kind })
            }
        }
    }

    /// Graceful shutdown; later calls do nothing
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let core = &self.core;
        core.shutdown().trigger(format!("{} session stopped", V::NAME));

        let housekeeping = self.housekeeping.lock().take();
        if let Some(task) = housekeeping {
            match tokio::time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("[{}] housekeeping task failed: {e}", V::NAME),
                Err(_) => warn!("[{}] housekeeping did not stop within {JOIN_TIMEOUT:?}", V::NAME),
            }
        }

        // release joins the delivery thread and cleanup may flush; both block
        let teardown = Arc::clone(core);
        let released = tokio::task::spawn_blocking(move || {
            teardown.handle().release();
            teardown.variant().on_shutdown();
        })
        .await;
        if let Err(e) = released {
            warn!("[{}] gateway teardown failed: {e}", V::NAME);
        }
        if core.state() != SessionState::Failed {
            core.set_state(SessionState::Disconnected);
        }
        info!("[{}] session stopped", V::NAME);
    }
}

impl<V: SessionVariant> Drop for SessionController<V> {
    fn drop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("[{}] controller dropped without stop()", V::NAME);
        self.core.shutdown().trigger(format!("{} session dropped", V::NAME));
        self.core.handle().release();
        self.core.variant().on_shutdown();
    }
}

/// Background loop: watches the shutdown token and sweeps rendezvous
/// entries nobody is waiting for
async fn housekeeping(name: &'static str, table: RendezvousTable, shutdown: ShutdownSignal) {
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    let mut polls: u64 = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = poll.tick() => {
                polls += 1;
                if polls % SWEEP_EVERY == 0 {
                    let swept = table.sweep_expired(SWEEP_GRACE);
                    if !swept.is_empty() {
                        debug!("[{name}] swept {} expired requests", swept.len());
                    }
                }
            }
        }
    }
    debug!("[{name}] housekeeping stopped");
}
