//! Error types used by the mockvisor coordination layer.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`WorkerError`] — failures of the worker lifecycle itself (registration,
//!   integrity verification, keepalive, illegal operations).
//! - [`ProtocolError`] — malformed or out-of-protocol traffic on the worker
//!   channel. These are logged and skipped, never fatal.
//! - [`RegistrationError`] — the narrow error a backend reports when it
//!   cannot create or activate a worker registration.
//! - [`ResolveError`] — opaque failure returned by a handler's resolver.
//!
//! `WorkerError` provides helper methods (`as_label`, `as_message`) for
//! logging and [`WorkerError::is_recoverable`] for the keepalive recovery
//! path.

use std::time::Duration;

use thiserror::Error;

use crate::model::RequestId;
use crate::worker::Readiness;

/// Opaque failure returned by a handler's resolver.
///
/// A resolver failure never propagates to the intercepted request: the
/// request is treated as unhandled and bypassed after the failure is logged.
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

/// # Errors produced by the worker lifecycle.
///
/// These represent failures of the coordination layer itself, such as a
/// registration that could not be created or a keepalive probe that went
/// unanswered. Per-request failures are never surfaced here; the worst
/// outcome for an intercepted request is an unmodified bypass.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker registration could not be created or never became active.
    #[error("worker registration failed: {reason}")]
    Registration {
        /// The underlying backend failure.
        reason: String,
    },

    /// The worker script did not match the expected checksum, or the
    /// integrity response never arrived.
    #[error("integrity check failed: {reason}")]
    IntegrityCheck {
        /// Mismatch details or the timeout that expired.
        reason: String,
    },

    /// A keepalive probe was not acknowledged in time.
    #[error("keepalive not acknowledged within {timeout:?}")]
    KeepaliveTimeout {
        /// The round-trip timeout that was exceeded.
        timeout: Duration,
    },

    /// The worker channel was torn down while a wait was still pending.
    #[error("worker channel closed")]
    ChannelClosed,

    /// An operation was invoked in a lifecycle state that does not allow it.
    #[error("{operation} is not allowed while worker is {state}")]
    InvalidState {
        /// The operation that was rejected.
        operation: &'static str,
        /// The lifecycle state the worker was in.
        state: Readiness,
    },
}

impl WorkerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use mockvisor::WorkerError;
    ///
    /// let err = WorkerError::ChannelClosed;
    /// assert_eq!(err.as_label(), "worker_channel_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Registration { .. } => "worker_registration_failed",
            WorkerError::IntegrityCheck { .. } => "worker_integrity_failed",
            WorkerError::KeepaliveTimeout { .. } => "worker_keepalive_timeout",
            WorkerError::ChannelClosed => "worker_channel_closed",
            WorkerError::InvalidState { .. } => "worker_invalid_state",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            WorkerError::Registration { reason } => format!("registration: {reason}"),
            WorkerError::IntegrityCheck { reason } => format!("integrity: {reason}"),
            WorkerError::KeepaliveTimeout { timeout } => format!("keepalive: {timeout:?}"),
            WorkerError::ChannelClosed => "channel closed".to_string(),
            WorkerError::InvalidState { operation, state } => {
                format!("{operation} rejected in state {state}")
            }
        }
    }

    /// Indicates whether the failure allows a recovery attempt.
    ///
    /// Returns `true` only for [`WorkerError::KeepaliveTimeout`]: a missed
    /// keepalive triggers exactly one re-registration attempt before the
    /// session is declared failed.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use mockvisor::WorkerError;
    ///
    /// let missed = WorkerError::KeepaliveTimeout { timeout: Duration::from_secs(5) };
    /// assert!(missed.is_recoverable());
    ///
    /// let fatal = WorkerError::Registration { reason: "denied".into() };
    /// assert!(!fatal.is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WorkerError::KeepaliveTimeout { .. })
    }
}

/// # Protocol violations observed on the worker channel.
///
/// Violations are logged at `warn` and the offending frame is dropped.
/// They never interrupt other in-flight requests and never tear the
/// session down.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A request arrived with an id that is already in flight.
    ///
    /// The original resolution stands; the duplicate is ignored.
    #[error("duplicate request id {id}")]
    DuplicateRequest {
        /// The repeated request id.
        id: RequestId,
    },

    /// A response receipt referenced an id with no recorded decision.
    #[error("response receipt for unknown request id {id}")]
    UnknownResponse {
        /// The unrecognized request id.
        id: RequestId,
    },

    /// A frame could not be decoded into a known message.
    #[error("undecodable frame: {reason}")]
    Decode {
        /// The decoder failure.
        reason: String,
    },

    /// A frame could not be encoded or posted to the worker.
    #[error("frame not posted: {reason}")]
    Post {
        /// The encoder or transport failure.
        reason: String,
    },
}

impl ProtocolError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProtocolError::DuplicateRequest { .. } => "protocol_duplicate_request",
            ProtocolError::UnknownResponse { .. } => "protocol_unknown_response",
            ProtocolError::Decode { .. } => "protocol_decode_failed",
            ProtocolError::Post { .. } => "protocol_post_failed",
        }
    }
}

/// Failure reported by a [`WorkerBackend`](crate::WorkerBackend) while
/// creating or activating a worker registration.
///
/// Backends surface one opaque reason; the controller wraps it into
/// [`WorkerError::Registration`] when it aborts a start.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct RegistrationError {
    reason: String,
}

impl RegistrationError {
    /// Creates a new registration error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the underlying reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
