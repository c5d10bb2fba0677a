//! # Wire protocol between the client and the worker script.
//!
//! Every frame on the wire is a JSON object of the shape
//! `{"type": "<kind>", "payload": <data>}`; messages without a payload omit
//! the `payload` field entirely. The three enums here split the protocol by
//! direction:
//!
//! - [`OutboundMessage`]: control frames the client posts to the worker.
//! - [`ReplyMessage`]: per-request verdict frames answering an intercepted
//!   request.
//! - [`InboundMessage`]: frames the worker posts back to the client.
//!
//! ## Quick reference
//! ```text
//! client ──► worker: activate | deactivate | integrity-check-request
//!                    | keepalive-request | client-closed
//! client ──► worker: mock-success | mock-not-found | internal-error
//! worker ──► client: mocking-enabled | integrity-check-response
//!                    | keepalive-response | request | response
//! ```
//!
//! Decoding happens exactly once, at the boundary: [`decode`] turns a raw
//! frame into an [`InboundMessage`], and everything past that point works
//! with typed values. A frame that fails to decode but still carries a
//! usable request id can be salvaged with [`salvage_request_id`] so the
//! worker is not left waiting on a request nobody will answer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::model::{Decision, InterceptedRequest, RequestId, ResponseReceipt, ResponseStub};

/// Control frames posted from the client to the worker script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// Ask the worker to start deferring intercepted requests to us.
    Activate,
    /// Ask the worker to stop mocking for this client.
    Deactivate,
    /// Ask the worker for its script checksum.
    IntegrityCheckRequest,
    /// Liveness probe; the worker answers with `keepalive-response`.
    KeepaliveRequest,
    /// Final notification that this client is going away.
    ClientClosed,
}

/// Per-request verdict frames answering one intercepted request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ReplyMessage {
    /// A handler produced a response; the worker should serve it.
    MockSuccess {
        request_id: RequestId,
        response: ResponseStub,
    },
    /// No handler matched; the worker should perform the real request.
    MockNotFound { request_id: RequestId },
    /// Resolution broke down; the worker should fail the request.
    InternalError {
        request_id: RequestId,
        message: String,
    },
}

impl From<Decision> for ReplyMessage {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Mocked {
                request_id,
                response,
            } => Self::MockSuccess {
                request_id,
                response,
            },
            Decision::Bypass { request_id } => Self::MockNotFound { request_id },
            Decision::Error { request_id, reason } => Self::InternalError {
                request_id,
                message: reason,
            },
        }
    }
}

/// Frames the worker script posts back to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum InboundMessage {
    /// Activation confirmation; the payload reports whether mocking is on.
    MockingEnabled(bool),
    /// Script checksum answering an `integrity-check-request`.
    IntegrityCheckResponse(String),
    /// Liveness acknowledgement answering a `keepalive-request`.
    KeepaliveResponse,
    /// An intercepted request awaiting a verdict.
    Request(InterceptedRequest),
    /// Receipt confirming a mocked response reached the page.
    Response(ResponseReceipt),
}

impl InboundMessage {
    /// Discriminant of this message, for filtering without matching payloads.
    pub fn kind(&self) -> InboundKind {
        match self {
            Self::MockingEnabled(_) => InboundKind::MockingEnabled,
            Self::IntegrityCheckResponse(_) => InboundKind::IntegrityCheckResponse,
            Self::KeepaliveResponse => InboundKind::KeepaliveResponse,
            Self::Request(_) => InboundKind::Request,
            Self::Response(_) => InboundKind::Response,
        }
    }
}

/// Payload-free discriminant of [`InboundMessage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundKind {
    MockingEnabled,
    IntegrityCheckResponse,
    KeepaliveResponse,
    Request,
    Response,
}

/// Decodes one raw frame into a typed inbound message.
pub(crate) fn decode(frame: &Value) -> Result<InboundMessage, ProtocolError> {
    InboundMessage::deserialize(frame).map_err(|err| ProtocolError::Decode {
        reason: err.to_string(),
    })
}

/// Encodes an outbound or reply message into a raw frame.
pub(crate) fn encode<M: Serialize>(msg: &M) -> Result<Value, ProtocolError> {
    serde_json::to_value(msg).map_err(|err| ProtocolError::Post {
        reason: err.to_string(),
    })
}

/// Pulls the request id out of a frame that failed to decode.
///
/// Only `request` frames are salvaged; a malformed request must still be
/// answered or the worker waits on it forever. Returns `None` when the
/// frame is not a request or carries no usable id.
pub(crate) fn salvage_request_id(frame: &Value) -> Option<RequestId> {
    if frame.get("type").and_then(Value::as_str) != Some("request") {
        return None;
    }
    frame
        .get("payload")
        .and_then(|payload| payload.get("id"))
        .and_then(Value::as_str)
        .map(RequestId::from)
}
