//! # The worker controller.
//!
//! [`MockWorker`] drives one worker script end to end: discovery or
//! registration, activation, request traffic, integrity checking,
//! keepalive, and teardown.
//!
//! ## Architecture
//! ```text
//!                     ┌────────────┐
//!   start / stop ───► │ MockWorker │ ───► WorkerBackend (register)
//!                     └─────┬──────┘
//!                           │ wires
//!           ┌───────────────┼───────────────────┐
//!           ▼               ▼                   ▼
//!     WorkerChannel   HandlerRegistry    LifecycleEmitter
//!       ▲      │          ▲                     ▲
//!       │      └── request listener ────────────┤
//!  frame pump  ┌── receipt listener ────────────┘
//!       ▲      ▼
//!     WorkerLink ◄─── keepalive probe
//! ```
//!
//! ## Responsibilities
//! - **Start**: find or register the script, attach the channel, confirm
//!   activation, then verify integrity and spawn the keepalive probe.
//! - **Run**: keep the registry editable and the emitter subscribable while
//!   listeners move request traffic.
//! - **Stop**: notify the worker, end every task, and discard session
//!   state. Stop is terminal and idempotent.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::channel::{BusSubscription, OutboundMessage, WorkerChannel};
use crate::config::{IntegrityPolicy, StartOptions};
use crate::error::WorkerError;
use crate::events::{LifecycleEmitter, LifecycleEventKind, ListenerRef};
use crate::handlers::{HandlerRegistry, RequestHandler};
use crate::worker::backend::{WorkerBackend, WorkerLinkRef, WorkerPhase};
use crate::worker::keepalive;
use crate::worker::listener::{spawn_frame_pump, spawn_receipt_listener, spawn_request_listener};
use crate::worker::session::{InflightTable, Readiness, WorkerContext, WorkerSession};

#[cfg(feature = "logging")]
use crate::events::LogListener;

/// Client-side controller for one mock worker.
///
/// Created idle; [`MockWorker::start`] brings it to `Active`,
/// [`MockWorker::stop`] tears it down for good. Handler edits and event
/// subscriptions are available at any point in between.
pub struct MockWorker {
    backend: Arc<dyn WorkerBackend>,
    ctx: Arc<WorkerContext>,
    subs: Mutex<Vec<BusSubscription>>,
}

impl MockWorker {
    /// Creates an idle worker over the given backend and initial handlers.
    pub fn new(backend: Arc<dyn WorkerBackend>, handlers: Vec<RequestHandler>) -> Self {
        let emitter = Arc::new(LifecycleEmitter::new());
        let registry = Arc::new(HandlerRegistry::new(handlers, emitter.clone()));
        let ctx = Arc::new(WorkerContext {
            channel: Arc::new(WorkerChannel::new()),
            registry,
            emitter,
            inflight: Arc::new(InflightTable::new()),
            session: Arc::new(WorkerSession::new()),
            stop: CancellationToken::new(),
        });
        Self {
            backend,
            ctx,
            subs: Mutex::new(Vec::new()),
        }
    }

    /// Starts the worker.
    ///
    /// Finds a matching registration (or registers the script), attaches the
    /// channel, and confirms activation with the worker. With
    /// `wait_until_ready` unset, the returned link is available immediately
    /// and activation finishes in the background.
    ///
    /// Only an idle worker can start; a second call, or a call after
    /// [`MockWorker::stop`], fails with [`WorkerError::InvalidState`].
    pub async fn start(&self, options: StartOptions) -> Result<WorkerLinkRef, WorkerError> {
        self.ctx
            .session
            .try_advance(Readiness::Idle, Readiness::Registering, "start")?;

        let options = Arc::new(options);
        let link = match self.discover(&options).await {
            Ok(link) => link,
            Err(err) => {
                self.ctx.session.mark_failed();
                return Err(err);
            }
        };

        self.ctx.session.set_readiness(Readiness::WaitingActivation);

        {
            let mut subs = self.subs.lock();
            subs.push(spawn_request_listener(self.ctx.clone()));
            subs.push(spawn_receipt_listener(self.ctx.clone()));
        }

        if options.wait_until_ready {
            bootstrap(self.ctx.clone(), self.backend.clone(), link.clone(), options).await?;
        } else {
            let ctx = self.ctx.clone();
            let backend = self.backend.clone();
            let deferred = link.clone();
            tokio::spawn(async move {
                if let Err(err) = bootstrap(ctx, backend, deferred, options).await {
                    tracing::error!(error = %err, "deferred worker start failed");
                }
            });
        }

        Ok(link)
    }

    /// Reuses a matching registration, or registers the script fresh.
    async fn discover(&self, options: &StartOptions) -> Result<WorkerLinkRef, WorkerError> {
        let wanted = options.worker.url.as_str();
        for link in self.backend.registrations().await {
            let hit = match &options.find_worker {
                Some(find) => find(link.script_url(), wanted),
                None => link.script_url() == wanted,
            };
            if hit {
                tracing::debug!(url = link.script_url(), "reusing registered worker");
                return Ok(link);
            }
        }

        self.backend
            .register(wanted, &options.worker.register)
            .await
            .map_err(|err| WorkerError::Registration {
                reason: err.to_string(),
            })
    }

    /// Stops the worker and discards its session state.
    ///
    /// The worker is told to deactivate, every task ends, in-flight requests
    /// are dropped, and listeners are unsubscribed. Stopping an already
    /// stopped worker does nothing; stopping a never-started worker only
    /// warns.
    pub async fn stop(&self) {
        match self.ctx.session.readiness() {
            Readiness::Stopped => {
                tracing::debug!("worker already stopped");
                return;
            }
            Readiness::Idle => {
                tracing::warn!("stop called before start");
                return;
            }
            _ => {}
        }

        self.ctx.channel.send(&OutboundMessage::Deactivate);
        self.ctx.channel.send(&OutboundMessage::ClientClosed);

        self.ctx.stop.cancel();
        self.ctx.channel.close();
        self.ctx.channel.clear_link();

        let inflight = self.ctx.inflight.len();
        if inflight > 0 {
            tracing::debug!(inflight, "discarding in-flight requests on stop");
        }
        self.ctx.inflight.clear();
        self.ctx.emitter.clear();

        let subs: Vec<BusSubscription> = self.subs.lock().drain(..).collect();
        for sub in subs {
            sub.join().await;
        }

        self.ctx.session.set_readiness(Readiness::Stopped);
    }

    /// Prepends handlers to the active list; they apply to later requests.
    pub fn use_handlers(&self, handlers: Vec<RequestHandler>) {
        self.ctx.registry.use_handlers(handlers);
    }

    /// Marks consumed one-time handlers as unused again.
    pub fn restore_handlers(&self) {
        self.ctx.registry.restore_handlers();
    }

    /// Replaces the active handler list; `None` reinstates the initial one.
    pub fn reset_handlers(&self, next: Option<Vec<RequestHandler>>) {
        self.ctx.registry.reset_handlers(next);
    }

    /// Logs the active handler list in scan order.
    pub fn print_handlers(&self) {
        self.ctx.registry.print_handlers();
    }

    /// Number of active handlers.
    pub fn handler_count(&self) -> usize {
        self.ctx.registry.len()
    }

    /// Subscribes a listener to one life-cycle event kind.
    pub fn on(&self, kind: LifecycleEventKind, listener: ListenerRef) {
        self.ctx.emitter.on(kind, listener);
    }

    /// Subscribes a listener to every life-cycle event.
    pub fn on_all(&self, listener: ListenerRef) {
        self.ctx.emitter.on_all(listener);
    }

    /// Current readiness.
    pub fn readiness(&self) -> Readiness {
        self.ctx.session.readiness()
    }
}

/// Brings a discovered link all the way to an active, probed worker.
async fn bootstrap(
    ctx: Arc<WorkerContext>,
    backend: Arc<dyn WorkerBackend>,
    link: WorkerLinkRef,
    options: Arc<StartOptions>,
) -> Result<(), WorkerError> {
    if let Err(err) = connect_link(&ctx, &link, None).await {
        ctx.session.mark_failed();
        return Err(err);
    }

    ctx.session.set_readiness(Readiness::Active);

    if !options.quiet {
        tracing::info!(url = link.script_url(), "mocking enabled");
        #[cfg(feature = "logging")]
        ctx.emitter.on_all(Arc::new(LogListener));
    }

    if let IntegrityPolicy::Verify { checksum, strict } = &options.integrity {
        if let Err(err) = verify_integrity(&ctx, checksum, options.integrity_timeout).await {
            if *strict {
                ctx.session.mark_failed();
                return Err(err);
            }
            tracing::warn!(error = %err, "worker script integrity mismatch");
        }
    }

    keepalive::spawn(ctx, backend, options);
    Ok(())
}

/// Attaches a link to the channel and confirms activation with the worker.
///
/// Used on first start and again by keepalive recovery, which bounds both
/// the activation wait and the confirmation wait with `confirm_within`.
pub(crate) async fn connect_link(
    ctx: &Arc<WorkerContext>,
    link: &WorkerLinkRef,
    confirm_within: Option<Duration>,
) -> Result<(), WorkerError> {
    if link.phase() != WorkerPhase::Active {
        let activation = match confirm_within {
            Some(bound) => match time::timeout(bound, link.activated()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    return Err(WorkerError::Registration {
                        reason: format!("worker did not activate within {bound:?}"),
                    });
                }
            },
            None => link.activated().await,
        };
        activation.map_err(|err| WorkerError::Registration {
            reason: err.to_string(),
        })?;
    }

    ctx.channel.set_link(link.clone());
    spawn_frame_pump(ctx.clone(), link.clone());

    let confirmed = ctx.channel.wait_mocking_enabled();
    ctx.channel.send(&OutboundMessage::Activate);

    let enabled = match confirm_within {
        Some(bound) => match time::timeout(bound, confirmed).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(WorkerError::Registration {
                    reason: format!("no activation confirmation within {bound:?}"),
                });
            }
        },
        None => confirmed.await?,
    };

    tracing::debug!(enabled, url = link.script_url(), "worker confirmed activation");
    Ok(())
}

/// Compares the worker's reported checksum against the expected one.
async fn verify_integrity(
    ctx: &WorkerContext,
    expected: &str,
    bound: Duration,
) -> Result<(), WorkerError> {
    let response = ctx.channel.wait_integrity_response();
    ctx.channel.send(&OutboundMessage::IntegrityCheckRequest);

    let actual = match time::timeout(bound, response).await {
        Ok(result) => result?,
        Err(_elapsed) => {
            return Err(WorkerError::IntegrityCheck {
                reason: format!("no checksum report within {bound:?}"),
            });
        }
    };

    if actual != expected {
        return Err(WorkerError::IntegrityCheck {
            reason: format!("checksum mismatch: expected {expected}, got {actual}"),
        });
    }
    Ok(())
}
