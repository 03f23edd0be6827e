//! Request/reply rendezvous between the control thread and callbacks.
//!
//! ```text
//! control thread                      delivery thread
//! ──────────────                      ───────────────
//! id = ids.next()
//! waiter = table.register(id, ..)
//! handle.send(req, id)  ───────────►  front
//! waiter.wait(&shutdown).await        on reply part:
//!        │                              table.deliver(id, part, is_last)
//!        ◄──────── oneshot ──────────   (completes once)
//! ```
//!
//! Each pending request owns its own oneshot channel, so an unexpected or
//! duplicate reply can never release the wrong waiter. Every wait is bounded
//! by a deadline and by the shutdown token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use hermes_core::RequestId;
use log::{debug, warn};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::{RendezvousError, WaitError};
use crate::messages::{RequestKind, Response, ResponsePayload, RspInfo};

/// When a pending request counts as answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// On the part carrying the terminal flag
    UntilLast,
    /// After this many parts, whatever their flags (one reply per item)
    Count(usize),
}

/// One reply part as seen by the table
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Payload(ResponsePayload),
    Error(RspInfo),
    Empty,
}

impl<T: Into<ResponsePayload>> From<Response<T>> for ResponsePart {
    fn from(response: Response<T>) -> Self {
        match (response.info, response.payload) {
            (Some(info), _) if info.is_error() => ResponsePart::Error(info),
            (_, Some(payload)) => ResponsePart::Payload(payload.into()),
            (_, None) => ResponsePart::Empty,
        }
    }
}

/// Everything collected for one request
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBatch {
    pub request_id: RequestId,
    pub kind: RequestKind,
    pub payloads: Vec<ResponsePayload>,
    pub errors: Vec<RspInfo>,
}

impl ResponseBatch {
    fn new(request_id: RequestId, kind: RequestKind) -> Self {
        Self {
            request_id,
            kind,
            payloads: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn first_error(&self) -> Option<&RspInfo> {
        self.errors.first()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Payloads of one type, in arrival order
    pub fn payloads_of<T>(&self) -> Vec<T>
    where
        T: TryFrom<ResponsePayload>,
    {
        self.payloads
            .iter()
            .cloned()
            .filter_map(|payload| T::try_from(payload).ok())
            .collect()
    }
}

/// Outcome of handing a reply part to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Recorded, more parts expected
    Partial,
    /// This part completed the request and released its waiter
    Completed,
    /// No request pending under that id
    Unmatched,
}

struct PendingRequest {
    kind: RequestKind,
    completion: Completion,
    deadline: Instant,
    received: usize,
    batch: ResponseBatch,
    reply: oneshot::Sender<ResponseBatch>,
}

impl PendingRequest {
    fn absorb(&mut self, part: ResponsePart) {
        self.received += 1;
        match part {
            ResponsePart::Payload(payload) => self.batch.payloads.push(payload),
            ResponsePart::Error(info) => self.batch.errors.push(info),
            ResponsePart::Empty => {}
        }
    }

    fn is_complete(&self, is_last: bool) -> bool {
        match self.completion {
            Completion::UntilLast => is_last,
            Completion::Count(expected) => self.received >= expected,
        }
    }
}

/// Pending requests keyed by request id
#[derive(Clone, Default)]
pub struct RendezvousTable {
    pending: Arc<DashMap<RequestId, PendingRequest>>,
}

impl RendezvousTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request before it is sent
    ///
    /// `Completion::Count(0)` completes immediately.
    pub fn register(
        &self,
        request_id: RequestId,
        kind: RequestKind,
        timeout: Duration,
        completion: Completion,
    ) -> Result<Waiter, RendezvousError> {
        let (reply, rx) = oneshot::channel();
        let waiter = |rx| Waiter {
            request_id,
            kind,
            timeout,
            rx,
            pending: self.pending.clone(),
        };

        match self.pending.entry(request_id) {
            Entry::Occupied(_) => Err(RendezvousError::DuplicateRequest(request_id)),
            Entry::Vacant(_) if completion == Completion::Count(0) => {
                let _ = reply.send(ResponseBatch::new(request_id, kind));
                Ok(waiter(rx))
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingRequest {
                    kind,
                    completion,
                    deadline: Instant::now() + timeout,
                    received: 0,
                    batch: ResponseBatch::new(request_id, kind),
                    reply,
                });
                debug!("Registered {kind} request {request_id} (timeout {timeout:?})");
                Ok(waiter(rx))
            }
        }
    }

    /// Record one reply part and release the waiter when complete
    pub fn deliver(&self, request_id: RequestId, part: ResponsePart, is_last: bool) -> Delivery {
        let complete = match self.pending.get_mut(&request_id) {
            Some(mut pending) => {
                pending.absorb(part);
                pending.is_complete(is_last)
            }
            None => {
                debug!("Reply for request {request_id} has no pending waiter");
                return Delivery::Unmatched;
            }
        };

        if !complete {
            return Delivery::Partial;
        }

        match self.pending.remove(&request_id) {
            Some((_, pending)) => {
                if pending.reply.send(pending.batch).is_err() {
                    debug!("Waiter for request {request_id} already gone");
                }
                Delivery::Completed
            }
            None => Delivery::Unmatched,
        }
    }

    /// Convenience for typed reply callbacks
    pub fn deliver_response<T: Into<ResponsePayload>>(&self, response: Response<T>) -> Delivery {
        let request_id = response.request_id;
        let is_last = response.is_last;
        self.deliver(request_id, ResponsePart::from(response), is_last)
    }

    /// Drop a pending request without completing it
    pub fn discard(&self, request_id: RequestId) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn kind_of(&self, request_id: RequestId) -> Option<RequestKind> {
        self.pending.get(&request_id).map(|p| p.kind)
    }

    /// Remove entries past their deadline, or whose waiter is gone
    pub fn sweep_expired(&self, grace: Duration) -> Vec<(RequestId, RequestKind)> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.pending.retain(|request_id, pending| {
            let stale = pending.reply.is_closed() || now > pending.deadline + grace;
            if stale {
                expired.push((*request_id, pending.kind));
            }
            !stale
        });
        for (request_id, kind) in &expired {
            warn!("Expired {kind} request {request_id} without a reply");
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Release-once wait handle for one pending request
///
/// Dropping the waiter removes its entry from the table.
pub struct Waiter {
    request_id: RequestId,
    kind: RequestKind,
    timeout: Duration,
    rx: oneshot::Receiver<ResponseBatch>,
    pending: Arc<DashMap<RequestId, PendingRequest>>,
}

impl Waiter {
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the reply batch, the deadline, or shutdown
    pub async fn wait(mut self, shutdown: &CancellationToken) -> Result<ResponseBatch, WaitError> {
        let request_id = self.request_id;
        let kind = self.kind;
        let timeout = self.timeout;

        tokio::select! {
            _ = shutdown.cancelled() => Err(WaitError::Cancelled { request_id, kind }),
            reply = tokio::time::timeout(timeout, &mut self.rx) => match reply {
                Ok(Ok(batch)) => Ok(batch),
                Ok(Err(_)) => Err(WaitError::Abandoned { request_id, kind }),
                Err(_) => Err(WaitError::TimedOut { request_id, kind, timeout }),
            },
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        if self.pending.remove(&self.request_id).is_some() {
            debug!("Removed unanswered {} request {}", self.kind, self.request_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{PositionInfo, SpecificInstrument};

    fn position(instrument: &str) -> ResponsePayload {
        PositionInfo {
            instrument_id: instrument.into(),
            ..Default::default()
        }
        .into()
    }

    #[tokio::test]
    async fn test_single_reply_completes() {
        let table = RendezvousTable::new();
        let shutdown = CancellationToken::new();
        let waiter = table
            .register(101, RequestKind::QueryPosition, Duration::from_secs(5), Completion::UntilLast)
            .unwrap();

        assert_eq!(table.deliver(101, ResponsePart::Payload(position("rb2601")), true), Delivery::Completed);
        assert!(table.is_empty());

        let batch = waiter.wait(&shutdown).await.unwrap();
        assert_eq!(batch.payloads_of::<PositionInfo>().len(), 1);
        assert!(batch.is_ok());
    }

    #[tokio::test]
    async fn test_multi_part_releases_on_last_only() {
        let table = RendezvousTable::new();
        let waiter = table
            .register(7, RequestKind::QueryPosition, Duration::from_secs(5), Completion::UntilLast)
            .unwrap();

        assert_eq!(table.deliver(7, ResponsePart::Payload(position("rb2601")), false), Delivery::Partial);
        assert_eq!(table.deliver(7, ResponsePart::Payload(position("rb2512")), false), Delivery::Partial);
        assert!(table.is_pending(7));
        assert_eq!(table.deliver(7, ResponsePart::Payload(position("ag2601")), true), Delivery::Completed);

        let batch = waiter.wait(&CancellationToken::new()).await.unwrap();
        let ids: Vec<String> = batch
            .payloads_of::<PositionInfo>()
            .into_iter()
            .map(|p| p.instrument_id)
            .collect();
        assert_eq!(ids, vec!["rb2601", "rb2512", "ag2601"]);
    }

    #[tokio::test]
    async fn test_counted_completion_collects_errors() {
        let table = RendezvousTable::new();
        let waiter = table
            .register(9, RequestKind::SubscribeMarketData, Duration::from_secs(10), Completion::Count(2))
            .unwrap();

        let ok = ResponsePart::Payload(SpecificInstrument::new("rb2601").into());
        assert_eq!(table.deliver(9, ok, true), Delivery::Partial);
        assert_eq!(
            table.deliver(9, ResponsePart::Error(RspInfo::error(16, "unknown instrument")), true),
            Delivery::Completed
        );

        let batch = waiter.wait(&CancellationToken::new()).await.unwrap();
        assert_eq!(batch.payloads.len(), 1);
        assert_eq!(batch.first_error().map(|e| e.error_id), Some(16));
    }

    #[tokio::test]
    async fn test_zero_count_completes_immediately() {
        let table = RendezvousTable::new();
        let waiter = table
            .register(3, RequestKind::SubscribeMarketData, Duration::from_secs(10), Completion::Count(0))
            .unwrap();
        assert!(table.is_empty());
        let batch = waiter.wait(&CancellationToken::new()).await.unwrap();
        assert!(batch.payloads.is_empty());
    }

    #[test]
    fn test_duplicate_request_id_rejected() {
        let table = RendezvousTable::new();
        let _first = table
            .register(5, RequestKind::Login, Duration::from_secs(10), Completion::UntilLast)
            .unwrap();
        let second = table.register(5, RequestKind::Login, Duration::from_secs(10), Completion::UntilLast);
        assert!(matches!(second, Err(RendezvousError::DuplicateRequest(5))));
        assert!(table.is_pending(5));
    }

    #[test]
    fn test_unmatched_reply() {
        let table = RendezvousTable::new();
        assert_eq!(table.deliver(404, ResponsePart::Empty, true), Delivery::Unmatched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let table = RendezvousTable::new();
        let waiter = table
            .register(11, RequestKind::QueryPosition, Duration::from_secs(5), Completion::UntilLast)
            .unwrap();

        let started = tokio::time::Instant::now();
        let err = waiter.wait(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, WaitError::TimedOut { request_id: 11, .. }));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(!table.is_pending(11));

        // a late reply is ignored
        assert_eq!(table.deliver(11, ResponsePart::Empty, true), Delivery::Unmatched);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_wait() {
        let table = RendezvousTable::new();
        let shutdown = CancellationToken::new();
        let waiter = table
            .register(12, RequestKind::Login, Duration::from_secs(10), Completion::UntilLast)
            .unwrap();

        let token = shutdown.clone();
        let task = tokio::spawn(async move { waiter.wait(&token).await });
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("waiter did not observe shutdown")
            .unwrap();
        assert!(matches!(result, Err(WaitError::Cancelled { request_id: 12, .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_sweep_drops_overdue_entries() {
        let table = RendezvousTable::new();
        let waiter = table
            .register(20, RequestKind::QueryInstrument, Duration::ZERO, Completion::UntilLast)
            .unwrap();
        // a waiter that never ran its destructor
        std::mem::forget(waiter);
        std::thread::sleep(Duration::from_millis(5));

        let expired = table.sweep_expired(Duration::ZERO);
        assert_eq!(expired, vec![(20, RequestKind::QueryInstrument)]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_response_part_prefers_error() {
        let response = Response::ok(SpecificInstrument::new("rb2601"), 1, true);
        assert!(matches!(ResponsePart::from(response), ResponsePart::Payload(_)));

        let rejected = Response::<SpecificInstrument>::rejected(RspInfo::error(3, "bad"), 1)
            .with_payload(SpecificInstrument::new("rb2601"));
        assert!(matches!(ResponsePart::from(rejected), ResponsePart::Error(_)));
    }
}
