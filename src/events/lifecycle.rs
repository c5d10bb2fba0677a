//! # Life-cycle events observed while requests move through the worker.
//!
//! [`LifecycleEventKind`] classifies the observable moments of one
//! intercepted request, from interception to the final verdict. The
//! [`LifecycleEvent`] struct carries the metadata each moment has to offer:
//! the request, the matched handler label, or the response receipt.
//!
//! Events for a single request always follow interception order:
//! `request:start`, then `request:match` or `request:unhandled`, then
//! `request:end`, then, once the worker confirms delivery, one of
//! `response:mocked` or `response:bypass`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use mockvisor::{InterceptedRequest, LifecycleEvent, LifecycleEventKind};
//!
//! let request = Arc::new(InterceptedRequest::new("req-1", "GET", "/users"));
//! let ev = LifecycleEvent::new(LifecycleEventKind::RequestMatch)
//!     .with_request(request)
//!     .with_handler("get-users");
//!
//! assert_eq!(ev.kind.as_label(), "request:match");
//! assert_eq!(ev.handler.as_deref(), Some("get-users"));
//! assert_eq!(ev.request_id().map(|id| id.as_str()), Some("req-1"));
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use crate::model::{InterceptedRequest, RequestId, ResponseReceipt};

/// Classification of life-cycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEventKind {
    /// A request was intercepted and handed over for resolution.
    ///
    /// Sets:
    /// - `request`: the intercepted request
    RequestStart,

    /// A handler matched the request and produced a response.
    ///
    /// Sets:
    /// - `request`: the intercepted request
    /// - `handler`: label of the matching handler
    RequestMatch,

    /// No handler produced a response; the request passes through.
    ///
    /// Sets:
    /// - `request`: the intercepted request
    RequestUnhandled,

    /// Resolution finished and the verdict was posted to the worker.
    ///
    /// Sets:
    /// - `request`: the intercepted request
    RequestEnd,

    /// The worker confirmed a mocked response was served.
    ///
    /// Sets:
    /// - `receipt`: the response receipt
    ResponseMocked,

    /// The worker confirmed a passthrough response was served.
    ///
    /// Sets:
    /// - `receipt`: the response receipt
    ResponseBypass,
}

impl LifecycleEventKind {
    /// Stable string label, usable as a log or subscription key.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::RequestStart => "request:start",
            Self::RequestMatch => "request:match",
            Self::RequestUnhandled => "request:unhandled",
            Self::RequestEnd => "request:end",
            Self::ResponseMocked => "response:mocked",
            Self::ResponseBypass => "response:bypass",
        }
    }
}

/// Life-cycle event with optional metadata.
///
/// Fields are set depending on the [`LifecycleEventKind`]; see the variant
/// docs for what each kind carries.
#[derive(Clone, Debug)]
pub struct LifecycleEvent {
    /// Event classification.
    pub kind: LifecycleEventKind,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// The intercepted request, for `request:*` events.
    pub request: Option<Arc<InterceptedRequest>>,
    /// Label of the matching handler, for `request:match`.
    pub handler: Option<Arc<str>>,
    /// Delivery receipt, for `response:*` events.
    pub receipt: Option<ResponseReceipt>,
}

impl LifecycleEvent {
    /// Creates a new event of the given kind with the current timestamp.
    pub fn new(kind: LifecycleEventKind) -> Self {
        Self {
            kind,
            at: SystemTime::now(),
            request: None,
            handler: None,
            receipt: None,
        }
    }

    /// Attaches the intercepted request.
    #[inline]
    pub fn with_request(mut self, request: Arc<InterceptedRequest>) -> Self {
        self.request = Some(request);
        self
    }

    /// Attaches the matched handler label.
    #[inline]
    pub fn with_handler(mut self, handler: impl Into<Arc<str>>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Attaches the delivery receipt.
    #[inline]
    pub fn with_receipt(mut self, receipt: ResponseReceipt) -> Self {
        self.receipt = Some(receipt);
        self
    }

    /// Id of the request this event concerns, from whichever side carries it.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request
            .as_ref()
            .map(|request| &request.id)
            .or_else(|| self.receipt.as_ref().map(|receipt| &receipt.request_id))
    }
}
