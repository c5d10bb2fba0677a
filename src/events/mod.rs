//! Life-cycle events: types, emitter, and the built-in log listener.
//!
//! This module groups the event **data model** and the **emitter** used to
//! observe requests as they are intercepted, resolved, and confirmed by the
//! worker.
//!
//! ## Contents
//! - [`LifecycleEventKind`], [`LifecycleEvent`] event classification and
//!   payload metadata
//! - [`LifecycleListener`], [`ListenerFn`] the observer trait and its
//!   closure adapter
//! - [`LifecycleEmitter`] ordered, panic-isolated synchronous fan-out
//! - [`LogListener`] stdout listener behind the `logging` feature
//!
//! ## Quick reference
//! - **Emitters**: the request listener (`request:*`) and the receipt
//!   listener (`response:*`).
//! - **Consumers**: listeners subscribed through `MockWorker::on` /
//!   `MockWorker::on_all`, plus [`LogListener`] for non-quiet workers.

mod emitter;
mod lifecycle;

#[cfg(feature = "logging")]
mod log;

pub use emitter::{LifecycleEmitter, LifecycleListener, ListenerFn, ListenerRef};
pub use lifecycle::{LifecycleEvent, LifecycleEventKind};

#[cfg(feature = "logging")]
pub use log::LogListener;

pub(crate) use emitter::panic_message;
