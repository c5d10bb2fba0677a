//! # mockvisor
//!
//! **Mockvisor** is a client-side coordination library for worker-based API
//! mocking.
//!
//! It registers a mock worker script with the host environment, keeps an
//! ordered list of request handlers, answers intercepted requests over a
//! typed message channel, and reports the whole exchange as life-cycle
//! events. The crate owns the coordination only; transporting frames to a
//! real worker process is left to a [`WorkerBackend`] implementation.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   start / stop / use_handlers / on
//!                 │
//!                 ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  MockWorker (controller)                                  │
//! │  - WorkerChannel (typed frames over a broadcast bus)      │
//! │  - HandlerRegistry (ordered, first match wins)            │
//! │  - LifecycleEmitter (fans out to user listeners)          │
//! │  - InflightTable (dedupe + receipt correlation)           │
//! └──────┬──────────────────────────┬─────────────────────────┘
//!        │ register / registrations │ frames in / out
//!        ▼                          ▼
//! ┌───────────────┐         ┌──────────────┐
//! │ WorkerBackend │ ──────► │  WorkerLink  │  (one per registered script)
//! └───────────────┘         └──────────────┘
//! ```
//!
//! ### Request lifecycle
//! ```text
//! worker frame { type: "request" }
//!   ├─► decode, dedupe by request id (duplicates are dropped)
//!   ├─► emit RequestStart
//!   ├─► HandlerRegistry::resolve
//!   │     ├─ scan active handlers in order, skip consumed one-timers
//!   │     ├─ Some(stub) ──► emit RequestMatch ──► reply mock-success
//!   │     └─ no handler ──► emit RequestUnhandled ──► reply mock-not-found
//!   ├─► emit RequestEnd
//!   └─► worker frame { type: "response" } (receipt)
//!         ├─ mocked   ──► emit ResponseMocked
//!         └─ bypassed ──► emit ResponseBypass
//! ```
//!
//! ## Features
//! | Area                  | Description                                                | Key types / traits                          |
//! |-----------------------|------------------------------------------------------------|---------------------------------------------|
//! | **Handlers**          | Declare request predicates and the responses they produce. | [`RequestHandler`], [`HandlerRegistry`]     |
//! | **Worker control**    | Register, activate, probe, and stop the worker script.     | [`MockWorker`], [`WorkerBackend`]           |
//! | **Life-cycle events** | Observe request and response traffic as it happens.        | [`LifecycleEmitter`], [`LifecycleListener`] |
//! | **Wire protocol**     | Typed frames between the client and the worker.            | [`OutboundMessage`], [`InboundMessage`]     |
//! | **Errors**            | Typed errors for start, traffic, and teardown.             | [`WorkerError`], [`ProtocolError`]          |
//! | **Configuration**     | Start options plus keepalive and integrity policies.       | [`StartOptions`], [`KeepalivePolicy`]       |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogListener`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use mockvisor::{
//!     InterceptedRequest, MockWorker, RequestHandler, ResponseStub, StartOptions, WorkerBackend,
//! };
//!
//! async fn start_mocking(backend: Arc<dyn WorkerBackend>) -> Result<(), mockvisor::WorkerError> {
//!     // Declare what to mock: a predicate plus an async resolver.
//!     let list_users = RequestHandler::new(
//!         "list-users",
//!         |req: &InterceptedRequest| req.method == "GET" && req.url.ends_with("/users"),
//!         |_req| async { Ok(Some(ResponseStub::ok().with_body(r#"[{"id":1}]"#))) },
//!     );
//!
//!     let worker = MockWorker::new(backend, vec![list_users]);
//!     worker.start(StartOptions::default()).await?;
//!
//!     // ... exercise the application under test ...
//!
//!     worker.stop().await;
//!     Ok(())
//! }
//! ```
mod channel;
mod config;
mod error;
mod events;
mod handlers;
mod model;
mod worker;

#[cfg(test)]
mod testutil;

// ---- Public re-exports ----

pub use channel::{InboundKind, InboundMessage, OutboundMessage, ReplyMessage};
pub use config::{
    FindWorker, IntegrityPolicy, KeepalivePolicy, RegisterOptions, StartOptions, WorkerOptions,
};
pub use error::{ProtocolError, RegistrationError, ResolveError, WorkerError};
pub use events::{
    LifecycleEmitter, LifecycleEvent, LifecycleEventKind, LifecycleListener, ListenerFn,
    ListenerRef,
};
pub use handlers::{HandlerRegistry, Predicate, RequestHandler, Resolver};
pub use model::{
    Credentials, Decision, DecisionKind, Headers, InterceptedRequest, RequestId, ResponseReceipt,
    ResponseStub,
};
pub use worker::{MockWorker, Readiness, WorkerBackend, WorkerLink, WorkerLinkRef, WorkerPhase};

// Optional: expose a simple built-in logging listener (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use events::LogListener;
