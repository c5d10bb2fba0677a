//! # Client-side endpoint of the worker channel.
//!
//! [`WorkerChannel`] owns the inbound [`MessageBus`] and the current link to
//! the worker script. Outbound traffic is fire-and-forget: frames are
//! encoded and posted to whichever link is attached at that moment, and a
//! frame with nowhere to go is logged and dropped rather than buffered.
//! Inbound traffic is published by the frame pump and consumed through
//! kind-filtered listeners and typed one-shot waits.

use std::future::Future;

use parking_lot::RwLock;
use serde_json::Value;

use super::bus::{BusSubscription, MessageBus};
use super::protocol::{encode, InboundKind, InboundMessage, OutboundMessage, ReplyMessage};
use crate::error::WorkerError;
use crate::worker::WorkerLinkRef;

/// Ring-buffer capacity for decoded inbound messages.
const INBOUND_CAPACITY: usize = 256;

/// Message endpoint shared by the controller, listeners, and keepalive.
pub struct WorkerChannel {
    bus: MessageBus<InboundMessage>,
    link: RwLock<Option<WorkerLinkRef>>,
}

impl WorkerChannel {
    /// Creates an unlinked channel.
    pub fn new() -> Self {
        Self {
            bus: MessageBus::new(INBOUND_CAPACITY),
            link: RwLock::new(None),
        }
    }

    /// Attaches the link that outbound frames are posted to.
    ///
    /// Replaces any previous link; re-registration swaps links in place
    /// without tearing down listeners.
    pub fn set_link(&self, link: WorkerLinkRef) {
        *self.link.write() = Some(link);
    }

    /// Detaches the current link. Subsequent sends are dropped.
    pub fn clear_link(&self) {
        *self.link.write() = None;
    }

    /// Current link, if any.
    pub fn link(&self) -> Option<WorkerLinkRef> {
        self.link.read().clone()
    }

    /// Posts a control frame to the worker.
    pub fn send(&self, msg: &OutboundMessage) {
        match encode(msg) {
            Ok(frame) => self.post(frame),
            Err(err) => tracing::warn!(error = %err, "failed to encode control frame"),
        }
    }

    /// Posts a request verdict to the worker.
    pub fn reply(&self, msg: &ReplyMessage) {
        match encode(msg) {
            Ok(frame) => self.post(frame),
            Err(err) => tracing::warn!(error = %err, "failed to encode reply frame"),
        }
    }

    fn post(&self, frame: Value) {
        let link = self.link.read().clone();
        match link {
            Some(link) => link.post(frame),
            None => tracing::warn!(frame = %frame, "dropping outbound frame: no worker link"),
        }
    }

    /// Publishes a decoded inbound message to all consumers.
    pub fn publish_inbound(&self, msg: InboundMessage) {
        self.bus.publish(msg);
    }

    /// Spawns a listener receiving every inbound message of the given kind.
    pub fn on<F>(&self, kind: InboundKind, mut on_msg: F) -> BusSubscription
    where
        F: FnMut(InboundMessage) + Send + 'static,
    {
        self.bus.attach(move |msg| {
            if msg.kind() == kind {
                on_msg(msg);
            }
        })
    }

    /// Waits for the next activation confirmation.
    ///
    /// Like all typed waits here, the subscription is armed before this
    /// returns; send the frame that provokes the answer after calling.
    pub fn wait_mocking_enabled(&self) -> impl Future<Output = Result<bool, WorkerError>> + Send {
        self.bus.once(|msg| match msg {
            InboundMessage::MockingEnabled(enabled) => Some(*enabled),
            _ => None,
        })
    }

    /// Waits for the next integrity checksum report.
    pub fn wait_integrity_response(
        &self,
    ) -> impl Future<Output = Result<String, WorkerError>> + Send {
        self.bus.once(|msg| match msg {
            InboundMessage::IntegrityCheckResponse(checksum) => Some(checksum.clone()),
            _ => None,
        })
    }

    /// Waits for the next keepalive acknowledgement.
    pub fn wait_keepalive_ack(&self) -> impl Future<Output = Result<(), WorkerError>> + Send {
        self.bus.once(|msg| match msg {
            InboundMessage::KeepaliveResponse => Some(()),
            _ => None,
        })
    }

    /// Ends every listener and pending wait on this channel.
    pub fn close(&self) {
        self.bus.close();
    }

    /// Number of live inbound consumers.
    pub fn receiver_count(&self) -> usize {
        self.bus.receiver_count()
    }
}
