//! # Session state: readiness and the in-flight request table.
//!
//! [`WorkerSession`] tracks where the worker is in its life cycle;
//! [`InflightTable`] tracks where each intercepted request is in its round
//! trip. Both are shared across the controller, the listeners, and the
//! keepalive task through [`WorkerContext`].
//!
//! ## Readiness
//! ```text
//! Idle ──► Registering ──► WaitingActivation ──► Active ──► Stopped
//!               │                  │                │
//!               └──────────────────┴────────────────┴──► Failed
//! ```
//! `Stopped` is terminal. `Failed` is not: a successful keepalive
//! re-registration returns the worker to `Active`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::channel::WorkerChannel;
use crate::error::{ProtocolError, WorkerError};
use crate::events::LifecycleEmitter;
use crate::handlers::HandlerRegistry;
use crate::model::{DecisionKind, RequestId};

/// Life-cycle state of a mock worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Created, not started.
    Idle,
    /// Discovering or registering the worker script.
    Registering,
    /// Script registered; waiting for it to take control.
    WaitingActivation,
    /// Activated and confirmed; requests are being intercepted.
    Active,
    /// Torn down. Terminal.
    Stopped,
    /// Registration, activation, integrity, or keepalive broke down.
    Failed,
}

impl Readiness {
    /// Stable string label, usable as a log key.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Registering => "registering",
            Self::WaitingActivation => "waiting-activation",
            Self::Active => "active",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Tracks the worker's readiness.
pub(crate) struct WorkerSession {
    readiness: RwLock<Readiness>,
}

impl WorkerSession {
    pub fn new() -> Self {
        Self {
            readiness: RwLock::new(Readiness::Idle),
        }
    }

    pub fn readiness(&self) -> Readiness {
        *self.readiness.read()
    }

    pub fn set_readiness(&self, to: Readiness) {
        let mut readiness = self.readiness.write();
        tracing::debug!(from = %*readiness, to = %to, "readiness change");
        *readiness = to;
    }

    /// Marks the worker failed, unless it already stopped for good.
    ///
    /// Background tasks (deferred bootstrap, keepalive) report failures
    /// through this so a concurrent `stop()` is never overwritten.
    pub fn mark_failed(&self) {
        let mut readiness = self.readiness.write();
        if *readiness == Readiness::Stopped {
            tracing::debug!("ignoring failure on a stopped worker");
            return;
        }
        tracing::debug!(from = %*readiness, to = %Readiness::Failed, "readiness change");
        *readiness = Readiness::Failed;
    }

    /// Atomically advances `from` to `to`.
    ///
    /// Fails with [`WorkerError::InvalidState`] when the current state is
    /// anything other than `from`, leaving the state untouched.
    pub fn try_advance(
        &self,
        from: Readiness,
        to: Readiness,
        operation: &'static str,
    ) -> Result<(), WorkerError> {
        let mut readiness = self.readiness.write();
        if *readiness != from {
            return Err(WorkerError::InvalidState {
                operation,
                state: *readiness,
            });
        }
        tracing::debug!(from = %from, to = %to, "readiness change");
        *readiness = to;
        Ok(())
    }
}

/// Where one intercepted request is in its round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InflightPhase {
    /// Interception seen; verdict not yet posted.
    Resolving,
    /// Verdict posted; waiting for the delivery receipt.
    Decided(DecisionKind),
}

/// Per-request protocol state between interception and receipt.
///
/// The table enforces the two per-request rules: an id may be admitted at
/// most once while in flight, and a receipt only settles a request whose
/// verdict was already posted.
pub(crate) struct InflightTable {
    entries: Mutex<HashMap<RequestId, InflightPhase>>,
}

impl InflightTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Admits a new request. Rejects ids already in flight.
    pub fn begin(&self, id: RequestId) -> Result<(), ProtocolError> {
        match self.entries.lock().entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(InflightPhase::Resolving);
                Ok(())
            }
            Entry::Occupied(slot) => Err(ProtocolError::DuplicateRequest {
                id: slot.key().clone(),
            }),
        }
    }

    /// Records the verdict for an in-flight request.
    ///
    /// A missing entry is ignored: the request was already discarded by a
    /// concurrent teardown.
    pub fn decide(&self, id: &RequestId, kind: DecisionKind) {
        if let Some(phase) = self.entries.lock().get_mut(id) {
            *phase = InflightPhase::Decided(kind);
        }
    }

    /// Settles a request on its delivery receipt, yielding the verdict.
    ///
    /// A receipt for an unknown id, or for a request whose verdict has not
    /// been posted yet, fails without touching the table.
    pub fn complete(&self, id: &RequestId) -> Result<DecisionKind, ProtocolError> {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(InflightPhase::Decided(kind)) => {
                let kind = *kind;
                entries.remove(id);
                Ok(kind)
            }
            Some(InflightPhase::Resolving) | None => {
                Err(ProtocolError::UnknownResponse { id: id.clone() })
            }
        }
    }

    /// Discards every tracked request.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of requests currently in flight.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Shared wiring handed to every task a worker spawns.
pub(crate) struct WorkerContext {
    pub channel: Arc<WorkerChannel>,
    pub registry: Arc<HandlerRegistry>,
    pub emitter: Arc<LifecycleEmitter>,
    pub inflight: Arc<InflightTable>,
    pub session: Arc<WorkerSession>,
    pub stop: CancellationToken,
}
