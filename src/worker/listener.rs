//! # Frame pump and the request/receipt listeners.
//!
//! Three consumers move traffic for an attached worker:
//!
//! - the **frame pump** reads raw frames off the link, decodes them once,
//!   and publishes typed messages on the inbound bus;
//! - the **request listener** spawns one task per intercepted request,
//!   resolving it against the registry and posting the verdict;
//! - the **receipt listener** settles requests when the worker confirms a
//!   response was served, emitting the matching `response:*` event.
//!
//! Requests resolve concurrently: a slow resolver never blocks the verdict
//! for a faster one behind it.

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::channel::{
    decode, salvage_request_id, BusSubscription, InboundKind, InboundMessage, ReplyMessage,
};
use crate::error::ProtocolError;
use crate::events::{LifecycleEvent, LifecycleEventKind};
use crate::model::{DecisionKind, InterceptedRequest, RequestId, ResponseReceipt};
use crate::worker::backend::WorkerLinkRef;
use crate::worker::session::WorkerContext;

/// Spawns the task moving raw frames from the link onto the inbound bus.
///
/// The pump ends when the worker stops or the link closes.
pub(crate) fn spawn_frame_pump(ctx: Arc<WorkerContext>, link: WorkerLinkRef) -> JoinHandle<()> {
    let stop = ctx.stop.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                frame = link.recv() => match frame {
                    Some(frame) => ingest_frame(&ctx, &frame),
                    None => {
                        tracing::debug!(url = link.script_url(), "worker link closed; frame pump exiting");
                        break;
                    }
                }
            }
        }
    })
}

fn ingest_frame(ctx: &WorkerContext, frame: &Value) {
    match decode(frame) {
        Ok(msg) => ctx.channel.publish_inbound(msg),
        Err(err) => {
            tracing::warn!(error = %err, frame = %frame, "dropping undecodable frame");
            if let Some(id) = salvage_request_id(frame) {
                fail_malformed_request(ctx, id, &err);
            }
        }
    }
}

/// Answers a request whose frame failed to decode.
///
/// The worker is waiting on this id; without a verdict it would hold the
/// page's request open forever.
fn fail_malformed_request(ctx: &WorkerContext, id: RequestId, err: &ProtocolError) {
    if let Err(dup) = ctx.inflight.begin(id.clone()) {
        tracing::warn!(error = %dup, "malformed frame reuses an id already in flight");
        return;
    }
    ctx.inflight.decide(&id, DecisionKind::Error);
    ctx.channel.reply(&ReplyMessage::InternalError {
        request_id: id,
        message: err.to_string(),
    });
}

/// Spawns the listener resolving intercepted requests.
pub(crate) fn spawn_request_listener(ctx: Arc<WorkerContext>) -> BusSubscription {
    let channel = ctx.channel.clone();
    channel.on(InboundKind::Request, move |msg| {
        if let InboundMessage::Request(request) = msg {
            tokio::spawn(handle_request(ctx.clone(), Arc::new(request)));
        }
    })
}

async fn handle_request(ctx: Arc<WorkerContext>, request: Arc<InterceptedRequest>) {
    if let Err(err) = ctx.inflight.begin(request.id.clone()) {
        tracing::warn!(error = %err, "ignoring duplicate request frame");
        return;
    }

    ctx.emitter.emit(
        &LifecycleEvent::new(LifecycleEventKind::RequestStart).with_request(request.clone()),
    );

    let decision = ctx.registry.resolve(request.clone()).await;
    tracing::debug!(
        request_id = %request.id,
        decision = decision.kind().as_label(),
        "request decided"
    );
    ctx.inflight.decide(decision.request_id(), decision.kind());
    ctx.channel.reply(&ReplyMessage::from(decision));

    ctx.emitter
        .emit(&LifecycleEvent::new(LifecycleEventKind::RequestEnd).with_request(request));
}

/// Spawns the listener settling requests on their delivery receipts.
pub(crate) fn spawn_receipt_listener(ctx: Arc<WorkerContext>) -> BusSubscription {
    let channel = ctx.channel.clone();
    channel.on(InboundKind::Response, move |msg| {
        if let InboundMessage::Response(receipt) = msg {
            settle_receipt(&ctx, receipt);
        }
    })
}

fn settle_receipt(ctx: &WorkerContext, receipt: ResponseReceipt) {
    match ctx.inflight.complete(&receipt.request_id) {
        Ok(DecisionKind::Mocked) => {
            ctx.emitter.emit(
                &LifecycleEvent::new(LifecycleEventKind::ResponseMocked).with_receipt(receipt),
            );
        }
        Ok(DecisionKind::Bypass) => {
            ctx.emitter.emit(
                &LifecycleEvent::new(LifecycleEventKind::ResponseBypass).with_receipt(receipt),
            );
        }
        Ok(DecisionKind::Error) => {
            tracing::debug!(request_id = %receipt.request_id, "worker served the error verdict");
        }
        Err(err) => {
            tracing::warn!(error = %err, "dropping receipt with no matching request");
        }
    }
}
