//! # Synchronous fan-out of life-cycle events to listeners.
//!
//! [`LifecycleEmitter`] delivers each event to its listeners inline, in
//! subscription order, before the emitting call returns. That makes the
//! per-request event sequence observable without any cross-task ordering
//! machinery: by the time a verdict is posted, every listener has already
//! seen the events leading up to it.
//!
//! ## Rules
//! - **Subscription order**: listeners are invoked in the order they were
//!   added; kind-filtered and catch-all listeners share one order.
//! - **Panic isolation**: a panicking listener is caught and logged, the
//!   remaining listeners still run, and the listener stays subscribed.
//! - **No re-entrancy hazard**: the listener list is snapshotted before
//!   delivery, so a listener may subscribe or clear without deadlocking.

use std::any::Any;
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use super::lifecycle::{LifecycleEvent, LifecycleEventKind};

/// Observer of life-cycle events.
///
/// Implementations must not block: delivery happens inline on the task that
/// resolves the request. Panics are isolated per listener.
pub trait LifecycleListener: Send + Sync + 'static {
    /// Handles one event. Filtering already happened before this call.
    fn on_event(&self, event: &LifecycleEvent);

    /// Listener name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared reference to a listener.
pub type ListenerRef = Arc<dyn LifecycleListener>;

/// Adapter turning a closure into a named [`LifecycleListener`].
///
/// ## Example
/// ```rust
/// use mockvisor::{LifecycleEventKind, ListenerFn};
///
/// let listener = ListenerFn::arc("audit", |ev| {
///     println!("{}", ev.kind.as_label());
/// });
/// assert_eq!(listener.name(), "audit");
/// # let _ = LifecycleEventKind::RequestStart;
/// ```
pub struct ListenerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ListenerFn<F>
where
    F: Fn(&LifecycleEvent) + Send + Sync + 'static,
{
    /// Creates a named listener from a closure.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates a named listener and wraps it into a [`ListenerRef`].
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> ListenerRef {
        Arc::new(Self::new(name, f))
    }
}

impl<F> LifecycleListener for ListenerFn<F>
where
    F: Fn(&LifecycleEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &LifecycleEvent) {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Ordered registry of life-cycle listeners.
pub struct LifecycleEmitter {
    listeners: RwLock<Vec<(Option<LifecycleEventKind>, ListenerRef)>>,
}

impl LifecycleEmitter {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes a listener to one event kind.
    pub fn on(&self, kind: LifecycleEventKind, listener: ListenerRef) {
        self.listeners.write().push((Some(kind), listener));
    }

    /// Subscribes a listener to every event kind.
    pub fn on_all(&self, listener: ListenerRef) {
        self.listeners.write().push((None, listener));
    }

    /// Delivers an event to all matching listeners, in subscription order.
    pub fn emit(&self, event: &LifecycleEvent) {
        let matching: Vec<ListenerRef> = self
            .listeners
            .read()
            .iter()
            .filter(|(kind, _)| kind.map_or(true, |kind| kind == event.kind))
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in matching {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if let Err(panic) = outcome {
                tracing::warn!(
                    listener = listener.name(),
                    event = event.kind.as_label(),
                    panic = %panic_message(panic),
                    "lifecycle listener panicked"
                );
            }
        }
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// Number of subscribed listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True when no listener is subscribed.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl Default for LifecycleEmitter {
    /// Same as [`LifecycleEmitter::new`].
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
