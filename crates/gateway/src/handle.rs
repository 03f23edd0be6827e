use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use hermes_core::RequestId;
use log::{debug, info, warn};

use crate::error::GatewayError;
use crate::messages::GatewayRequest;
use crate::port::{ApiKind, GatewayApi, GatewayFactory};

/// Bound on waiting for the gateway's internal threads during release
pub const RELEASE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Exclusive owner of a gateway instance
///
/// Releases the instance exactly once: on [`GatewayHandle::release`] or on
/// drop, whichever happens first. The join that follows is bounded; a
/// delivery thread stuck in a callback is left behind with a warning.
pub struct GatewayHandle {
    api: Arc<dyn GatewayApi>,
    kind: ApiKind,
    released: AtomicBool,
    join_timeout: Duration,
}

impl GatewayHandle {
    pub fn new(api: Arc<dyn GatewayApi>, kind: ApiKind) -> Self {
        Self {
            api,
            kind,
            released: AtomicBool::new(false),
            join_timeout: RELEASE_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    pub fn create(
        factory: &dyn GatewayFactory,
        kind: ApiKind,
        stream_path: &Path,
        production_mode: bool,
    ) -> Result<Self, GatewayError> {
        let api = factory.create(kind, stream_path, production_mode)?;
        debug!("Created {:?} gateway '{}' (stream path {})", kind, api.name(), stream_path.display());
        Ok(Self::new(api, kind))
    }

    pub fn api(&self) -> &dyn GatewayApi {
        self.api.as_ref()
    }

    pub fn kind(&self) -> ApiKind {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Send a request, mapping a non-zero return code to an error
    pub fn send(&self, request: &GatewayRequest, request_id: RequestId) -> Result<(), GatewayError> {
        if self.is_released() {
            return Err(GatewayError::Released);
        }
        match self.api.send_request(request, request_id) {
            0 => Ok(()),
            code => Err(GatewayError::SendFailed {
                kind: request.kind(),
                request_id,
                code,
            }),
        }
    }

    /// Release the instance; returns false if it was already released
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Releasing {:?} gateway '{}'", self.kind, self.api.name());
        self.api.release();
        self.join_bounded();
        true
    }

    /// `join()` on a helper thread, waiting at most `join_timeout`
    fn join_bounded(&self) {
        let name = self.api.name().to_string();
        let api = Arc::clone(&self.api);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = thread::Builder::new()
            .name("gateway-join".to_string())
            .spawn(move || {
                let _ = tx.send(api.join());
            });
        if let Err(e) = spawned {
            warn!("Gateway '{name}' not joined, helper thread failed to start: {e}");
            return;
        }
        match rx.recv_timeout(self.join_timeout) {
            Ok(code) => debug!("Gateway '{name}' joined with code {code}"),
            Err(RecvTimeoutError::Timeout) => warn!(
                "Gateway '{name}' delivery thread still busy after {:?}, continuing without it",
                self.join_timeout
            ),
            Err(RecvTimeoutError::Disconnected) => warn!("Gateway '{name}' join helper exited without a result"),
        }
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::EventSink;
    use crossbeam_channel::{Receiver, Sender};
    use parking_lot::Mutex;
    use std::time::Instant;

    /// Front whose delivery thread never finishes until `unblock` fires
    struct StuckFront {
        unblock: Receiver<()>,
        released: AtomicBool,
        joins: Mutex<usize>,
    }

    impl GatewayApi for StuckFront {
        fn register_front(&self, _address: &str) {}
        fn register_sink(&self, _sink: Arc<dyn EventSink>) {}
        fn init(&self) {}

        fn join(&self) -> i32 {
            *self.joins.lock() += 1;
            let _ = self.unblock.recv();
            0
        }

        fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
        }

        fn send_request(&self, _request: &GatewayRequest, _request_id: RequestId) -> i32 {
            0
        }
    }

    fn stuck() -> (Sender<()>, Arc<StuckFront>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let front = Arc::new(StuckFront {
            unblock: rx,
            released: AtomicBool::new(false),
            joins: Mutex::new(0),
        });
        (tx, front)
    }

    #[test]
    fn test_release_gives_up_on_a_stuck_join() {
        let (unblock, front) = stuck();
        let handle = GatewayHandle::new(front.clone(), ApiKind::MarketData).with_join_timeout(Duration::from_millis(100));

        let started = Instant::now();
        assert!(handle.release());
        assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
        assert!(front.released.load(Ordering::SeqCst));
        assert!(handle.is_released());

        assert!(!handle.release());
        drop(unblock);
    }

    #[test]
    fn test_release_waits_for_a_prompt_join() {
        let (unblock, front) = stuck();
        unblock.send(()).unwrap();
        let handle = GatewayHandle::new(front.clone(), ApiKind::Trade);
        drop(handle);
        assert!(front.released.load(Ordering::SeqCst));
        assert_eq!(*front.joins.lock(), 1);
    }
}
