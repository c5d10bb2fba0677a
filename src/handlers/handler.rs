//! # A single request handler: predicate plus resolver.
//!
//! [`RequestHandler`] pairs a synchronous predicate (does this request
//! concern me?) with an asynchronous resolver (what response does it get?).
//! A resolver may decline by returning `Ok(None)`, which sends the registry
//! on to the next handler in order.
//!
//! Handlers marked [`RequestHandler::once`] are consumed by their first
//! successful match and skipped afterwards until restored or reset.
//!
//! ## Example
//! ```rust
//! use mockvisor::{RequestHandler, ResponseStub};
//!
//! let handler = RequestHandler::new(
//!     "get-users",
//!     |req| req.method == "GET" && req.url.ends_with("/users"),
//!     |_req| async { Ok(Some(ResponseStub::ok().with_body("[]"))) },
//! )
//! .once();
//!
//! assert_eq!(handler.label(), "get-users");
//! assert!(handler.is_once());
//! assert!(!handler.is_consumed());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::ResolveError;
use crate::events::panic_message;
use crate::model::{InterceptedRequest, ResponseStub};

/// Synchronous match predicate over an intercepted request.
pub type Predicate = Arc<dyn Fn(&InterceptedRequest) -> bool + Send + Sync>;

/// Asynchronous resolver producing a response, declining, or failing.
pub type Resolver = Arc<
    dyn Fn(Arc<InterceptedRequest>) -> BoxFuture<'static, Result<Option<ResponseStub>, ResolveError>>
        + Send
        + Sync,
>;

/// One entry in the handler registry.
pub struct RequestHandler {
    label: Cow<'static, str>,
    predicate: Predicate,
    resolver: Resolver,
    once: bool,
    consumed: AtomicBool,
}

impl RequestHandler {
    /// Creates a handler from a predicate and a resolver.
    ///
    /// The label identifies the handler in events, logs, and registry
    /// listings; it does not have to be unique.
    pub fn new<P, R, Fut>(label: impl Into<Cow<'static, str>>, predicate: P, resolver: R) -> Self
    where
        P: Fn(&InterceptedRequest) -> bool + Send + Sync + 'static,
        R: Fn(Arc<InterceptedRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<ResponseStub>, ResolveError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
            resolver: Arc::new(move |request| resolver(request).boxed()),
            once: false,
            consumed: AtomicBool::new(false),
        }
    }

    /// Marks this handler as one-time: consumed by its first successful
    /// match.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Handler label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// True for one-time handlers.
    pub fn is_once(&self) -> bool {
        self.once
    }

    /// True once a one-time handler has served its match.
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_consumed(&self) {
        self.consumed.store(true, Ordering::Release);
    }

    pub(crate) fn clear_consumed(&self) {
        self.consumed.store(false, Ordering::Release);
    }

    /// Runs the predicate. A panicking predicate counts as a non-match.
    pub(crate) fn matches(&self, request: &InterceptedRequest) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.predicate)(request))) {
            Ok(hit) => hit,
            Err(panic) => {
                tracing::warn!(
                    handler = %self.label,
                    panic = %panic_message(panic),
                    "handler predicate panicked; treating as non-match"
                );
                false
            }
        }
    }

    /// Runs the resolver for a matched request.
    pub(crate) fn call(
        &self,
        request: Arc<InterceptedRequest>,
    ) -> BoxFuture<'static, Result<Option<ResponseStub>, ResolveError>> {
        (self.resolver)(request)
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("label", &self.label)
            .field("once", &self.once)
            .field("consumed", &self.is_consumed())
            .finish_non_exhaustive()
    }
}
