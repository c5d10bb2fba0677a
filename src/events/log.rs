//! # Simple logging listener for debugging and demos.
//!
//! [`LogListener`] prints life-cycle events to stdout in a human-readable
//! format. This is primarily useful for development and examples.
//!
//! ## Output format
//! ```text
//! [request:start] id=req-1 method=GET url=/users
//! [request:match] id=req-1 handler=get-users
//! [request:unhandled] id=req-2 method=POST url=/login
//! [request:end] id=req-1
//! [response:mocked] id=req-1 status=200
//! [response:bypass] id=req-2
//! ```

use super::emitter::LifecycleListener;
use super::lifecycle::{LifecycleEvent, LifecycleEventKind};

/// Simple stdout logging listener.
///
/// Enabled via the `logging` feature; started workers subscribe it
/// automatically unless `quiet` is set. Not intended for production use -
/// implement a custom [`LifecycleListener`] for structured logging.
pub struct LogListener;

impl LifecycleListener for LogListener {
    fn on_event(&self, e: &LifecycleEvent) {
        let label = e.kind.as_label();
        match e.kind {
            LifecycleEventKind::RequestStart | LifecycleEventKind::RequestUnhandled => {
                if let Some(req) = &e.request {
                    println!("[{label}] id={} method={} url={}", req.id, req.method, req.url);
                }
            }
            LifecycleEventKind::RequestMatch => {
                if let (Some(req), Some(handler)) = (&e.request, &e.handler) {
                    println!("[{label}] id={} handler={handler}", req.id);
                }
            }
            LifecycleEventKind::RequestEnd | LifecycleEventKind::ResponseBypass => {
                if let Some(id) = e.request_id() {
                    println!("[{label}] id={id}");
                }
            }
            LifecycleEventKind::ResponseMocked => {
                if let Some(receipt) = &e.receipt {
                    println!("[{label}] id={} status={}", receipt.request_id, receipt.status);
                }
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }
}
