//! Shared test doubles: an in-memory worker backend, scripted worker links,
//! and a recording event listener.
//!
//! [`StubLink`] captures every posted frame and answers the handshake frames
//! a real worker script would: `activate` gets a `mocking-enabled`
//! confirmation, `keepalive-request` an ack (unless disabled), and
//! `integrity-check-request` the configured checksum. Tests feed worker
//! traffic in with [`StubLink::inject`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

use crate::config::{RegisterOptions, StartOptions};
use crate::error::RegistrationError;
use crate::events::{LifecycleEvent, LifecycleEventKind, LifecycleListener};
use crate::handlers::RequestHandler;
use crate::worker::{MockWorker, WorkerBackend, WorkerLink, WorkerLinkRef, WorkerPhase};

/// Scripted stand-in for one registered worker.
pub(crate) struct StubLink {
    url: String,
    phase: Mutex<WorkerPhase>,
    activation_gate: Notify,
    sent: Mutex<Vec<Value>>,
    inbound_tx: UnboundedSender<Value>,
    inbound_rx: tokio::sync::Mutex<UnboundedReceiver<Value>>,
    auto_keepalive: AtomicBool,
    integrity_checksum: Mutex<Option<String>>,
}

impl StubLink {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = unbounded_channel();
        Self {
            url: url.into(),
            phase: Mutex::new(WorkerPhase::Active),
            activation_gate: Notify::new(),
            sent: Mutex::new(Vec::new()),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            auto_keepalive: AtomicBool::new(true),
            integrity_checksum: Mutex::new(None),
        }
    }

    pub(crate) fn with_phase(self, phase: WorkerPhase) -> Self {
        *self.phase.lock() = phase;
        self
    }

    /// Leaves keepalive probes unanswered.
    pub(crate) fn without_keepalive(self) -> Self {
        self.auto_keepalive.store(false, Ordering::Relaxed);
        self
    }

    /// Answers integrity checks with the given checksum.
    pub(crate) fn with_checksum(self, checksum: impl Into<String>) -> Self {
        *self.integrity_checksum.lock() = Some(checksum.into());
        self
    }

    /// Moves the link to `Active` and wakes activation waiters.
    pub(crate) fn set_active(&self) {
        *self.phase.lock() = WorkerPhase::Active;
        self.activation_gate.notify_waiters();
    }

    /// Queues a frame as if the worker had sent it.
    pub(crate) fn inject(&self, frame: Value) {
        let _ = self.inbound_tx.send(frame);
    }

    /// Every frame posted to this link, in order.
    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }

    /// The `type` tags of every posted frame, in order.
    pub(crate) fn sent_types(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl WorkerLink for StubLink {
    fn script_url(&self) -> &str {
        &self.url
    }

    fn phase(&self) -> WorkerPhase {
        *self.phase.lock()
    }

    async fn activated(&self) -> Result<(), RegistrationError> {
        loop {
            let notified = self.activation_gate.notified();
            if *self.phase.lock() == WorkerPhase::Active {
                return Ok(());
            }
            notified.await;
        }
    }

    fn post(&self, frame: Value) {
        let kind = frame["type"].as_str().unwrap_or_default().to_string();
        self.sent.lock().push(frame);

        match kind.as_str() {
            "activate" => {
                self.inject(json!({ "type": "mocking-enabled", "payload": true }));
            }
            "keepalive-request" if self.auto_keepalive.load(Ordering::Relaxed) => {
                self.inject(json!({ "type": "keepalive-response" }));
            }
            "integrity-check-request" => {
                if let Some(checksum) = self.integrity_checksum.lock().clone() {
                    self.inject(json!({
                        "type": "integrity-check-response",
                        "payload": checksum,
                    }));
                }
            }
            _ => {}
        }
    }

    async fn recv(&self) -> Option<Value> {
        self.inbound_rx.lock().await.recv().await
    }
}

/// In-memory backend over a fixed set of registrations.
pub(crate) struct StubBackend {
    existing: Vec<Arc<StubLink>>,
    created: Mutex<Vec<Arc<StubLink>>>,
    fail_register: Mutex<Option<String>>,
    stall_register: AtomicBool,
    register_calls: AtomicUsize,
}

impl StubBackend {
    pub(crate) fn new() -> Self {
        Self::with_existing(Vec::new())
    }

    pub(crate) fn with_existing(existing: Vec<Arc<StubLink>>) -> Self {
        Self {
            existing,
            created: Mutex::new(Vec::new()),
            fail_register: Mutex::new(None),
            stall_register: AtomicBool::new(false),
            register_calls: AtomicUsize::new(0),
        }
    }

    /// Makes the next `register` call fail with the given reason.
    pub(crate) fn fail_next_register(&self, reason: &str) {
        *self.fail_register.lock() = Some(reason.to_string());
    }

    /// Makes the next registered link start out installing; it only
    /// activates when the test calls [`StubLink::set_active`].
    pub(crate) fn stall_next_register(&self) {
        self.stall_register.store(true, Ordering::SeqCst);
    }

    /// Number of `register` calls, failed attempts included.
    pub(crate) fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    /// The most recently registered link.
    pub(crate) fn last_created(&self) -> Arc<StubLink> {
        self.created
            .lock()
            .last()
            .cloned()
            .expect("a worker was registered")
    }
}

#[async_trait]
impl WorkerBackend for StubBackend {
    async fn registrations(&self) -> Vec<WorkerLinkRef> {
        self.existing
            .iter()
            .map(|link| -> WorkerLinkRef { link.clone() })
            .collect()
    }

    async fn register(
        &self,
        url: &str,
        _options: &RegisterOptions,
    ) -> Result<WorkerLinkRef, RegistrationError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail_register.lock().take() {
            return Err(RegistrationError::new(reason));
        }
        let mut link = StubLink::new(url);
        if self.stall_register.swap(false, Ordering::SeqCst) {
            link = link.with_phase(WorkerPhase::Installing);
        }
        let link = Arc::new(link);
        self.created.lock().push(link.clone());
        Ok(link)
    }
}

/// Listener that records every event it sees.
pub(crate) struct Recorder {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl Recorder {
    pub(crate) fn arc() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn kinds(&self) -> Vec<LifecycleEventKind> {
        self.events.lock().iter().map(|event| event.kind).collect()
    }
}

impl LifecycleListener for Recorder {
    fn on_event(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

/// Default start options with the banner suppressed.
pub(crate) fn quiet_options() -> StartOptions {
    StartOptions {
        quiet: true,
        ..StartOptions::default()
    }
}

/// Registers and starts a worker against a fresh backend.
pub(crate) async fn started_worker(
    handlers: Vec<RequestHandler>,
) -> (MockWorker, Arc<StubBackend>, Arc<StubLink>) {
    let backend = Arc::new(StubBackend::new());
    let worker = MockWorker::new(backend.clone(), handlers);
    worker.start(quiet_options()).await.expect("worker starts");
    let link = backend.last_created();
    (worker, backend, link)
}

/// A `request` frame as the worker would post it.
pub(crate) fn request_frame(id: &str, method: &str, url: &str) -> Value {
    json!({
        "type": "request",
        "payload": { "id": id, "method": method, "url": url },
    })
}

/// A `response` receipt frame for an already-forwarded request.
pub(crate) fn receipt_frame(id: &str, status: u16) -> Value {
    json!({
        "type": "response",
        "payload": { "request_id": id, "status": status },
    })
}

/// Frames of one `type` posted to the link, in order.
pub(crate) fn sent_of_type(link: &StubLink, kind: &str) -> Vec<Value> {
    link.sent()
        .into_iter()
        .filter(|frame| frame["type"] == kind)
        .collect()
}

/// Lets spawned listeners and pumps run before asserting.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
