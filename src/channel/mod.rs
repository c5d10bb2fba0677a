//! Worker messaging: bus, wire protocol, and the typed channel.
//!
//! This module groups the plumbing between the controller and the worker
//! process:
//!
//! ## Contents
//! - [`MessageBus`] generic broadcast channel with teardown and one-shot waits
//! - [`OutboundMessage`], [`ReplyMessage`], [`InboundMessage`] the wire protocol
//! - [`WorkerChannel`] the typed send/receive surface over a worker link
//!
//! ## Quick reference
//! - **Outbound**: encoded by [`WorkerChannel::send`] / [`WorkerChannel::reply`]
//!   and posted on the active worker link.
//! - **Inbound**: raw frames are decoded exactly once (by the frame pump) and
//!   published on the bus as [`InboundMessage`]; downstream code never touches
//!   raw frames.

mod bus;
mod protocol;
mod worker;

pub use protocol::{InboundKind, InboundMessage, OutboundMessage, ReplyMessage};

pub(crate) use bus::{BusSubscription, MessageBus};
pub(crate) use protocol::{decode, salvage_request_id};
pub(crate) use worker::WorkerChannel;
