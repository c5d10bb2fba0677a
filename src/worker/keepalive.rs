//! # Periodic liveness probing with one-shot recovery.
//!
//! The keepalive task pings the worker every interval and expects an
//! acknowledgement within the configured timeout. A missed acknowledgement
//! marks the worker failed and triggers exactly one re-registration
//! attempt: success returns the worker to active, failure ends the probe
//! for good.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::channel::OutboundMessage;
use crate::config::StartOptions;
use crate::error::WorkerError;
use crate::worker::backend::WorkerBackend;
use crate::worker::controller::connect_link;
use crate::worker::session::{Readiness, WorkerContext};

/// Spawns the liveness probe for an activated worker.
pub(crate) fn spawn(
    ctx: Arc<WorkerContext>,
    backend: Arc<dyn WorkerBackend>,
    options: Arc<StartOptions>,
) -> JoinHandle<()> {
    tokio::spawn(run(ctx, backend, options))
}

async fn run(ctx: Arc<WorkerContext>, backend: Arc<dyn WorkerBackend>, options: Arc<StartOptions>) {
    let policy = options.keepalive;
    let stop = ctx.stop.clone();

    // First ping only after one full interval; activation just confirmed
    // the worker is alive.
    let mut ticks = time::interval_at(Instant::now() + policy.interval, policy.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticks.tick() => {}
        }

        match ping(&ctx, policy.timeout).await {
            Ok(()) => {
                tracing::trace!("keepalive acknowledged");
            }
            Err(err) => {
                if stop.is_cancelled() {
                    break;
                }
                if !err.is_recoverable() {
                    tracing::warn!(error = %err, "keepalive probe failed; ending probe");
                    break;
                }
                tracing::warn!(error = %err, "worker missed keepalive; attempting re-registration");
                ctx.session.mark_failed();

                let recovered = tokio::select! {
                    _ = stop.cancelled() => break,
                    result = recover(&ctx, &backend, &options) => result,
                };
                if let Err(err) = recovered {
                    tracing::error!(error = %err, "worker re-registration failed; giving up");
                    break;
                }
                if stop.is_cancelled() {
                    break;
                }
                ctx.session.set_readiness(Readiness::Active);
                tracing::debug!("worker re-registered after missed keepalive");
            }
        }
    }
}

async fn ping(ctx: &WorkerContext, bound: Duration) -> Result<(), WorkerError> {
    let ack = ctx.channel.wait_keepalive_ack();
    ctx.channel.send(&OutboundMessage::KeepaliveRequest);
    match time::timeout(bound, ack).await {
        Ok(result) => result,
        Err(_elapsed) => Err(WorkerError::KeepaliveTimeout { timeout: bound }),
    }
}

async fn recover(
    ctx: &Arc<WorkerContext>,
    backend: &Arc<dyn WorkerBackend>,
    options: &StartOptions,
) -> Result<(), WorkerError> {
    ctx.channel.clear_link();
    let link = backend
        .register(&options.worker.url, &options.worker.register)
        .await
        .map_err(|err| WorkerError::Registration {
            reason: err.to_string(),
        })?;
    connect_link(ctx, &link, Some(options.keepalive.timeout)).await
}
