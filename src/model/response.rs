//! # Response stubs, receipts, and per-request decisions.
//!
//! A handler resolver produces a [`ResponseStub`]; the controller turns it
//! into a mock reply. Once the worker has actually responded (with the mock
//! or with the live network response), it reports a [`ResponseReceipt`].
//! [`Decision`] is the single per-request outcome recorded in between.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::request::{Headers, RequestId};

/// Mocked response produced by a handler resolver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStub {
    /// Status code of the mocked response.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Response body, if any.
    #[serde(default)]
    pub body: Option<String>,
    /// Artificial delay before the worker responds, in milliseconds.
    ///
    /// Carried opaquely to the worker; the coordination layer never sleeps
    /// on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl ResponseStub {
    /// Creates a stub with the given status and nothing else.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
            delay_ms: None,
        }
    }

    /// Creates a `200 OK` stub.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Appends one response header.
    #[inline]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attaches a body.
    #[inline]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attaches a response delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        self.delay_ms = Some(ms);
        self
    }
}

/// Worker confirmation of the response that was ultimately served for one
/// request, mocked or live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseReceipt {
    /// Id of the request this receipt settles.
    pub request_id: RequestId,
    /// Status code that was served.
    pub status: u16,
    /// Headers that were served.
    #[serde(default)]
    pub headers: Headers,
    /// Body that was served, when captured.
    #[serde(default)]
    pub body: Option<String>,
}

impl ResponseReceipt {
    /// Creates a receipt with the given identity and status.
    pub fn new(request_id: impl Into<RequestId>, status: u16) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            headers: Headers::new(),
            body: None,
        }
    }
}

/// The single outcome recorded for one intercepted request.
///
/// Exactly one decision exists per request id; a later receipt is
/// classified against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// A handler produced a mocked response.
    Mocked {
        /// Id of the decided request.
        request_id: RequestId,
        /// The response the worker should serve.
        response: ResponseStub,
    },
    /// No handler claimed the request; it goes to the network unmodified.
    Bypass {
        /// Id of the decided request.
        request_id: RequestId,
    },
    /// The pipeline itself failed for this request (for example an
    /// undecodable payload that still carried a usable id).
    Error {
        /// Id of the decided request.
        request_id: RequestId,
        /// What went wrong.
        reason: String,
    },
}

impl Decision {
    /// Returns the id of the decided request.
    pub fn request_id(&self) -> &RequestId {
        match self {
            Decision::Mocked { request_id, .. }
            | Decision::Bypass { request_id }
            | Decision::Error { request_id, .. } => request_id,
        }
    }

    /// Returns the fieldless discriminant of this decision.
    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Mocked { .. } => DecisionKind::Mocked,
            Decision::Bypass { .. } => DecisionKind::Bypass,
            Decision::Error { .. } => DecisionKind::Error,
        }
    }
}

/// Fieldless discriminant of a [`Decision`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionKind {
    /// A mocked response was produced.
    Mocked,
    /// The request bypasses to the network.
    Bypass,
    /// The pipeline failed for this request.
    Error,
}

impl DecisionKind {
    /// Returns a short stable label for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DecisionKind::Mocked => "mocked",
            DecisionKind::Bypass => "bypass",
            DecisionKind::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_builders_compose() {
        let stub = ResponseStub::ok()
            .with_header("content-type", "application/json")
            .with_body("{\"ok\":true}")
            .with_delay(Duration::from_millis(250));

        assert_eq!(stub.status, 200);
        assert_eq!(stub.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(stub.delay_ms, Some(250));
    }

    #[test]
    fn test_stub_omits_absent_delay_on_the_wire() {
        let encoded = serde_json::to_value(ResponseStub::new(404)).expect("encodes");
        assert!(encoded.get("delay_ms").is_none());
    }

    #[test]
    fn test_decision_exposes_id_and_kind() {
        let decision = Decision::Bypass {
            request_id: "req-9".into(),
        };
        assert_eq!(decision.request_id().as_str(), "req-9");
        assert_eq!(decision.kind(), DecisionKind::Bypass);
        assert_eq!(decision.kind().as_label(), "bypass");
    }
}
