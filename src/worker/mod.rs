//! # Worker lifecycle.
//!
//! Registration, activation, request traffic, and teardown for one mock
//! worker script.
//!
//! ## Contents
//! - [`MockWorker`] client-side controller and public entry point
//! - [`WorkerBackend`], [`WorkerLink`] the seams the host environment
//!   implements
//! - [`WorkerPhase`] install state of a script, [`Readiness`] state of the
//!   controller driving it

mod backend;
mod controller;
mod keepalive;
mod listener;
mod session;

pub use backend::{WorkerBackend, WorkerLink, WorkerLinkRef, WorkerPhase};
pub use controller::MockWorker;
pub use session::Readiness;
