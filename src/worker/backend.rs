//! # Transport seam between the controller and the worker host.
//!
//! The controller never talks to a real script host directly; it goes
//! through [`WorkerBackend`] to discover and register scripts, and through
//! [`WorkerLink`] to exchange frames with one registered script. Embedders
//! implement both for their environment; tests implement them with stubs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::RegisterOptions;
use crate::error::RegistrationError;

/// Where a worker script is in its install cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerPhase {
    /// Fetched and installing; not yet able to intercept requests.
    Installing,
    /// Controlling clients and intercepting requests.
    Active,
    /// Unregistered or replaced; the link is no longer usable.
    Gone,
}

/// Live connection to one registered worker script.
#[async_trait]
pub trait WorkerLink: Send + Sync + 'static {
    /// URL the script was registered from.
    fn script_url(&self) -> &str;

    /// Current phase of the install cycle.
    fn phase(&self) -> WorkerPhase;

    /// Resolves once the script reaches [`WorkerPhase::Active`].
    ///
    /// Fails when the script can never activate, for example when the host
    /// rejected it during install.
    async fn activated(&self) -> Result<(), RegistrationError>;

    /// Posts one frame to the script. Fire-and-forget: delivery problems
    /// surface through missed keepalives, not here.
    fn post(&self, frame: Value);

    /// Receives the next frame from the script, or `None` once the link
    /// is closed.
    async fn recv(&self) -> Option<Value>;
}

/// Shared reference to a worker link.
pub type WorkerLinkRef = Arc<dyn WorkerLink>;

/// Host-side registration surface for worker scripts.
#[async_trait]
pub trait WorkerBackend: Send + Sync + 'static {
    /// Links for every script currently registered with the host.
    async fn registrations(&self) -> Vec<WorkerLinkRef>;

    /// Registers the script at `url` and returns a link to it.
    async fn register(
        &self,
        url: &str,
        options: &RegisterOptions,
    ) -> Result<WorkerLinkRef, RegistrationError>;
}
