//! # Start options for the worker lifecycle.
//!
//! [`StartOptions`] bundles everything [`MockWorker::start`] needs: where the
//! worker script lives, how to register it, whether to reuse an existing
//! registration, and the policies for integrity verification and keepalive.
//!
//! Options are used once per start:
//! 1. **Discovery**: `find_worker` decides whether an existing registration
//!    is reused instead of registering a new one.
//! 2. **Bootstrap**: `wait_until_ready` decides whether `start` resolves only
//!    after the activation handshake completed.
//! 3. **Runtime**: `integrity` and `keepalive` drive the checks that run once
//!    the worker is active.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use mockvisor::{IntegrityPolicy, StartOptions};
//!
//! let mut options = StartOptions::default();
//! options.quiet = true;
//! options.keepalive.interval = Duration::from_secs(10);
//! options.integrity = IntegrityPolicy::Verify {
//!     checksum: "3d6b9f06410d179a7f7404d4bf4c3c70".into(),
//!     strict: false,
//! };
//!
//! assert!(options.wait_until_ready);
//! assert_eq!(options.keepalive.interval, Duration::from_secs(10));
//! ```
//!
//! [`MockWorker::start`]: crate::MockWorker::start

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// Predicate deciding whether an existing worker registration matches the
/// requested script.
///
/// Receives `(registered_script_url, requested_script_url)` and returns
/// `true` to reuse the registration. The default compares the urls for
/// exact equality.
pub type FindWorker = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Options for one [`MockWorker::start`](crate::MockWorker::start) call.
#[derive(Clone)]
pub struct StartOptions {
    /// Worker script location and registration parameters.
    pub worker: WorkerOptions,

    /// Suppresses the start banner and the built-in event logger.
    pub quiet: bool,

    /// When `true` (the default), `start` resolves only after the worker is
    /// registered, activated, and has confirmed that mocking is enabled.
    ///
    /// When `false`, `start` returns as soon as a registration exists and
    /// the remaining bootstrap continues in the background; bootstrap
    /// failures are logged and flip readiness to failed.
    pub wait_until_ready: bool,

    /// Custom matcher for reusing an existing registration.
    ///
    /// `None` compares script urls for exact equality.
    pub find_worker: Option<FindWorker>,

    /// Whether and how to verify the worker script after activation.
    pub integrity: IntegrityPolicy,

    /// Maximum wait for the integrity response.
    pub integrity_timeout: Duration,

    /// Keepalive probe schedule and per-probe timeout.
    pub keepalive: KeepalivePolicy,
}

impl Default for StartOptions {
    /// Default options:
    ///
    /// - `worker = WorkerOptions::default()` (script at `/mockServiceWorker.js`)
    /// - `quiet = false`
    /// - `wait_until_ready = true`
    /// - `find_worker = None` (exact url equality)
    /// - `integrity = IntegrityPolicy::Skip`
    /// - `integrity_timeout = 5s`
    /// - `keepalive = KeepalivePolicy::default()` (30s interval, 5s timeout)
    fn default() -> Self {
        Self {
            worker: WorkerOptions::default(),
            quiet: false,
            wait_until_ready: true,
            find_worker: None,
            integrity: IntegrityPolicy::Skip,
            integrity_timeout: Duration::from_secs(5),
            keepalive: KeepalivePolicy::default(),
        }
    }
}

impl fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOptions")
            .field("worker", &self.worker)
            .field("quiet", &self.quiet)
            .field("wait_until_ready", &self.wait_until_ready)
            .field("find_worker", &self.find_worker.is_some())
            .field("integrity", &self.integrity)
            .field("integrity_timeout", &self.integrity_timeout)
            .field("keepalive", &self.keepalive)
            .finish()
    }
}

/// Worker script location and registration parameters.
#[derive(Clone, Debug)]
pub struct WorkerOptions {
    /// Url of the worker script to register.
    pub url: String,

    /// Opaque registration parameters forwarded to the backend.
    pub register: RegisterOptions,
}

impl Default for WorkerOptions {
    /// Defaults to the conventional script url `/mockServiceWorker.js` with
    /// empty registration parameters.
    fn default() -> Self {
        Self {
            url: "/mockServiceWorker.js".to_string(),
            register: RegisterOptions::default(),
        }
    }
}

/// Parameters forwarded, unmodified, to [`WorkerBackend::register`].
///
/// The coordination layer never inspects these; they exist so embedders can
/// thread backend-specific settings through a start call.
///
/// [`WorkerBackend::register`]: crate::WorkerBackend::register
#[derive(Clone, Debug, Default)]
pub struct RegisterOptions {
    /// Scope the registration should claim, if the backend supports scoping.
    pub scope: Option<String>,

    /// Free-form parameters for the backend (`Value::Null` when unused).
    pub params: Value,
}

/// Whether and how the worker script is verified after activation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IntegrityPolicy {
    /// No verification. The default.
    #[default]
    Skip,

    /// Ask the worker for its script checksum and compare.
    Verify {
        /// Expected checksum of the worker script.
        checksum: String,
        /// When `true`, a mismatch or a missing response fails the start.
        /// When `false`, it is reported as a warning and the session stays
        /// active.
        strict: bool,
    },
}

/// Keepalive probe schedule.
///
/// Every `interval` the controller sends a keepalive probe and waits up to
/// `timeout` for the acknowledgement. A missed probe triggers exactly one
/// re-registration attempt before the session is declared failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepalivePolicy {
    /// Time between probes.
    pub interval: Duration,

    /// Maximum wait for one acknowledgement.
    pub timeout: Duration,
}

impl Default for KeepalivePolicy {
    /// Defaults to a probe every `30s` with a `5s` acknowledgement timeout.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_wait_and_skip_integrity() {
        let options = StartOptions::default();
        assert!(options.wait_until_ready);
        assert!(!options.quiet);
        assert!(options.find_worker.is_none());
        assert_eq!(options.integrity, IntegrityPolicy::Skip);
        assert_eq!(options.worker.url, "/mockServiceWorker.js");
        assert_eq!(options.keepalive.interval, Duration::from_secs(30));
        assert_eq!(options.keepalive.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_hides_find_worker_closure() {
        let mut options = StartOptions::default();
        options.find_worker = Some(Arc::new(|script, requested| script == requested));
        let text = format!("{options:?}");
        assert!(
            text.contains("find_worker: true"),
            "expected presence flag in: {text}"
        );
    }
}
