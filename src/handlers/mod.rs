//! Request handlers: the handler type and the ordered registry.
//!
//! ## Contents
//! - [`RequestHandler`] predicate plus async resolver, optionally one-time
//! - [`Predicate`], [`Resolver`] shared-closure aliases for prebuilt parts
//! - [`HandlerRegistry`] first-match-wins scan with a restorable baseline

mod handler;
mod registry;

pub use handler::{Predicate, RequestHandler, Resolver};
pub use registry::HandlerRegistry;
