//! Wire-visible data model.
//!
//! This module groups the plain data types that cross the worker channel:
//! intercepted requests coming in, response stubs and receipts going out,
//! and the per-request decision that ties them together.
//!
//! ## Contents
//! - [`RequestId`], [`Headers`], [`Credentials`], [`InterceptedRequest`] the request side
//! - [`ResponseStub`], [`ResponseReceipt`] the response side
//! - [`Decision`], [`DecisionKind`] the per-request outcome

mod request;
mod response;

pub use request::{Credentials, Headers, InterceptedRequest, RequestId};
pub use response::{Decision, DecisionKind, ResponseReceipt, ResponseStub};
