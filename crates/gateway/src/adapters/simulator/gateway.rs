use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use hermes_core::RequestId;
use log::{debug, info, warn};
use parking_lot::Mutex;

use super::script::SimulatorScript;
use crate::messages::{GatewayEvent, GatewayRequest};
use crate::port::{ApiKind, EventSink, GatewayApi, ResumeType};

enum Command {
    Request(GatewayRequest, RequestId),
    Inject(GatewayEvent),
    Stop,
}

/// Scripted in-process front
///
/// All callbacks, replies and injected events alike, are delivered on one
/// dedicated thread in the order they were queued.
pub struct SimulatedGateway {
    kind: ApiKind,
    script: SimulatorScript,
    front: Mutex<Option<String>>,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    tx: Sender<Command>,
    rx: Mutex<Option<Receiver<Command>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
    sent: Mutex<Vec<(RequestId, GatewayRequest)>>,
    topics: Mutex<Option<(ResumeType, ResumeType)>>,
}

impl SimulatedGateway {
    pub fn new(kind: ApiKind, script: SimulatorScript) -> Self {
        let (tx, rx) = unbounded();
        Self {
            kind,
            script,
            front: Mutex::new(None),
            sink: Mutex::new(None),
            tx,
            rx: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            released: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            topics: Mutex::new(None),
        }
    }

    /// Queue an arbitrary callback, delivered after anything already queued
    pub fn inject(&self, event: GatewayEvent) {
        if self.tx.send(Command::Inject(event)).is_err() {
            debug!("Simulated front stopped, injected event dropped");
        }
    }

    /// Requests accepted for sending, in order
    pub fn sent_requests(&self) -> Vec<(RequestId, GatewayRequest)> {
        self.sent.lock().clone()
    }

    pub fn front_address(&self) -> Option<String> {
        self.front.lock().clone()
    }

    pub fn topics(&self) -> Option<(ResumeType, ResumeType)> {
        *self.topics.lock()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn run(script: SimulatorScript, sink: Arc<dyn EventSink>, rx: Receiver<Command>) {
        let mut seq = 0u64;
        for command in rx.iter() {
            match command {
                Command::Stop => break,
                Command::Inject(event) => sink.on_event(event),
                Command::Request(request, request_id) => {
                    for event in script.respond(&request, request_id, &mut seq) {
                        sink.on_event(event);
                    }
                }
            }
        }
        debug!("Simulated front delivery thread exiting");
    }
}

impl GatewayApi for SimulatedGateway {
    fn register_front(&self, address: &str) {
        *self.front.lock() = Some(address.to_string());
    }

    fn register_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }

    fn subscribe_topics(&self, private: ResumeType, public: ResumeType) {
        *self.topics.lock() = Some((private, public));
    }

    fn init(&self) {
        let Some(sink) = self.sink.lock().clone() else {
            warn!("Simulated front initialised without a callback sink");
            return;
        };
        let Some(rx) = self.rx.lock().take() else {
            warn!("Simulated front already initialised");
            return;
        };

        info!(
            "Simulated {:?} front starting (address {})",
            self.kind,
            self.front_address().unwrap_or_default()
        );
        if self.script.connect_on_init {
            self.inject(GatewayEvent::FrontConnected);
        }

        let script = self.script.clone();
        let spawned = thread::Builder::new()
            .name("sim-front".to_string())
            .spawn(move || Self::run(script, sink, rx));
        match spawned {
            Ok(handle) => *self.worker.lock() = Some(handle),
            Err(e) => warn!("Failed to start simulated front thread: {e}"),
        }
    }

    fn join(&self) -> i32 {
        let Some(handle) = self.worker.lock().take() else {
            return 0;
        };
        if handle.thread().id() == thread::current().id() {
            // released from inside a callback; the loop ends after it returns
            return 0;
        }
        match handle.join() {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.send(Command::Stop);
        self.sink.lock().take();
    }

    fn send_request(&self, request: &GatewayRequest, request_id: RequestId) -> i32 {
        if self.is_released() {
            return -1;
        }
        if self.script.send_failures.contains(&request.kind()) {
            return -2;
        }
        self.sent.lock().push((request_id, request.clone()));
        match self.tx.send(Command::Request(request.clone(), request_id)) {
            Ok(()) => 0,
            Err(_) => -1,
        }
    }

    fn name(&self) -> &str {
        match self.kind {
            ApiKind::MarketData => "sim-md",
            ApiKind::Trade => "sim-td",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::LoginRequest;
    use std::time::Duration;

    struct Collect(Sender<GatewayEvent>);

    impl EventSink for Collect {
        fn on_event(&self, event: GatewayEvent) {
            let _ = self.0.send(event);
        }
    }

    #[test]
    fn test_connects_and_answers_in_order() {
        let (tx, events) = unbounded();
        let gateway = SimulatedGateway::new(ApiKind::MarketData, SimulatorScript::new());
        gateway.register_front("tcp://127.0.0.1:41213");
        gateway.register_sink(Arc::new(Collect(tx)));
        gateway.init();

        let login = GatewayRequest::Login(LoginRequest {
            broker_id: "9999".into(),
            user_id: "000001".into(),
            password: "secret".into(),
        });
        assert_eq!(gateway.send_request(&login, 101), 0);

        let first = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first, GatewayEvent::FrontConnected);
        let second = events.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(matches!(second, GatewayEvent::Login(ref r) if r.request_id == 101 && r.is_last));

        gateway.release();
        assert_eq!(gateway.join(), 0);
        assert_eq!(gateway.send_request(&login, 102), -1);
        assert_eq!(gateway.sent_requests().len(), 1);
    }

    #[test]
    fn test_join_without_init_returns() {
        let gateway = SimulatedGateway::new(ApiKind::Trade, SimulatorScript::new());
        gateway.release();
        assert_eq!(gateway.join(), 0);
    }
}
