//! # Ordered, mutable collection of request handlers.
//!
//! [`HandlerRegistry`] keeps two lists: the **baseline** captured at
//! construction, and the **active** list requests resolve against. Runtime
//! edits only touch the active list, so the baseline can always be restored.
//!
//! ## Rules
//! - **First match wins**: handlers are scanned in order; the first one
//!   whose predicate matches and whose resolver produces a response decides
//!   the request.
//! - **Prepend on use**: handlers added at runtime are scanned before the
//!   existing ones, keeping their own listed order.
//! - **Decline continues**: a resolver returning `Ok(None)` hands the
//!   request to the next handler in order.
//! - **Failure passes through**: a resolver error or panic stops the scan
//!   and the request goes to the real network, with a warning.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;

use super::handler::RequestHandler;
use crate::events::{panic_message, LifecycleEmitter, LifecycleEvent, LifecycleEventKind};
use crate::model::{Decision, InterceptedRequest};

/// Ordered handler collection with a restorable baseline.
pub struct HandlerRegistry {
    baseline: Vec<Arc<RequestHandler>>,
    active: RwLock<Vec<Arc<RequestHandler>>>,
    emitter: Arc<LifecycleEmitter>,
}

impl HandlerRegistry {
    /// Creates a registry whose baseline and active list are `handlers`.
    pub fn new(handlers: Vec<RequestHandler>, emitter: Arc<LifecycleEmitter>) -> Self {
        let baseline: Vec<Arc<RequestHandler>> = handlers.into_iter().map(Arc::new).collect();
        let active = RwLock::new(baseline.clone());
        Self {
            baseline,
            active,
            emitter,
        }
    }

    /// Prepends handlers to the active list.
    ///
    /// The new handlers are scanned before the existing ones and keep their
    /// own listed order among themselves.
    pub fn use_handlers(&self, handlers: Vec<RequestHandler>) {
        let mut next: Vec<Arc<RequestHandler>> = handlers.into_iter().map(Arc::new).collect();
        let mut active = self.active.write();
        next.extend(active.iter().cloned());
        *active = next;
    }

    /// Marks every consumed one-time handler in the active list as unused
    /// again.
    pub fn restore_handlers(&self) {
        for handler in self.active.read().iter() {
            handler.clear_consumed();
        }
    }

    /// Replaces the active list.
    ///
    /// With `None`, the baseline is reinstated in its initial state, one-time
    /// consumption cleared. With `Some`, the given handlers replace the
    /// active list outright; the baseline itself is unaffected.
    pub fn reset_handlers(&self, next: Option<Vec<RequestHandler>>) {
        match next {
            Some(handlers) => {
                *self.active.write() = handlers.into_iter().map(Arc::new).collect();
            }
            None => {
                for handler in &self.baseline {
                    handler.clear_consumed();
                }
                *self.active.write() = self.baseline.clone();
            }
        }
    }

    /// Current active list, in scan order.
    pub fn snapshot(&self) -> Vec<Arc<RequestHandler>> {
        self.active.read().clone()
    }

    /// Number of active handlers.
    pub fn len(&self) -> usize {
        self.active.read().len()
    }

    /// True when the active list is empty.
    pub fn is_empty(&self) -> bool {
        self.active.read().is_empty()
    }

    /// Logs every active handler with its one-time state, in scan order.
    pub fn print_handlers(&self) {
        for handler in self.active.read().iter() {
            tracing::info!(
                handler = handler.label(),
                once = handler.is_once(),
                consumed = handler.is_consumed(),
                "registered handler"
            );
        }
    }

    /// Resolves one intercepted request against the active list.
    ///
    /// The scan runs over a snapshot: edits made while a resolver is running
    /// affect later requests, not this one.
    pub async fn resolve(&self, request: Arc<InterceptedRequest>) -> Decision {
        for handler in self.snapshot() {
            if handler.is_once() && handler.is_consumed() {
                continue;
            }
            if !handler.matches(&request) {
                continue;
            }

            let attempt = AssertUnwindSafe(handler.call(request.clone()))
                .catch_unwind()
                .await;
            match attempt {
                Ok(Ok(Some(response))) => {
                    if handler.is_once() {
                        handler.mark_consumed();
                    }
                    self.emitter.emit(
                        &LifecycleEvent::new(LifecycleEventKind::RequestMatch)
                            .with_request(request.clone())
                            .with_handler(handler.label()),
                    );
                    return Decision::Mocked {
                        request_id: request.id.clone(),
                        response,
                    };
                }
                Ok(Ok(None)) => continue,
                Ok(Err(err)) => {
                    tracing::warn!(
                        handler = handler.label(),
                        error = %err,
                        "handler resolver failed; passing request through"
                    );
                    return self.unhandled(request);
                }
                Err(panic) => {
                    tracing::warn!(
                        handler = handler.label(),
                        panic = %panic_message(panic),
                        "handler resolver panicked; passing request through"
                    );
                    return self.unhandled(request);
                }
            }
        }
        self.unhandled(request)
    }

    fn unhandled(&self, request: Arc<InterceptedRequest>) -> Decision {
        let request_id = request.id.clone();
        self.emitter.emit(
            &LifecycleEvent::new(LifecycleEventKind::RequestUnhandled).with_request(request),
        );
        Decision::Bypass { request_id }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::events::ListenerFn;
    use crate::model::ResponseStub;

    fn serving(label: &'static str, url_suffix: &'static str, body: &'static str) -> RequestHandler {
        RequestHandler::new(
            label,
            move |req| req.url.ends_with(url_suffix),
            move |_req| async move { Ok(Some(ResponseStub::ok().with_body(body))) },
        )
    }

    fn request(url: &str) -> Arc<InterceptedRequest> {
        Arc::new(InterceptedRequest::new("req-1", "GET", url))
    }

    fn registry(handlers: Vec<RequestHandler>) -> HandlerRegistry {
        HandlerRegistry::new(handlers, Arc::new(LifecycleEmitter::new()))
    }

    fn labels(registry: &HandlerRegistry) -> Vec<String> {
        registry
            .snapshot()
            .iter()
            .map(|handler| handler.label().to_string())
            .collect()
    }

    fn body_of(decision: Decision) -> String {
        match decision {
            Decision::Mocked { response, .. } => response.body.expect("mocked body"),
            other => panic!("expected a mocked decision, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_matching_handler_wins() {
        let registry = registry(vec![
            serving("first", "/users", "from-first"),
            serving("second", "/users", "from-second"),
        ]);

        let decision = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(decision), "from-first");
    }

    #[tokio::test]
    async fn test_use_handlers_prepends_in_listed_order() {
        let registry = registry(vec![
            serving("A", "/a", "a"),
            serving("B", "/b", "b"),
        ]);

        registry.use_handlers(vec![
            serving("C", "/a", "c"),
            serving("D", "/d", "d"),
        ]);

        assert_eq!(labels(&registry), ["C", "D", "A", "B"]);

        let decision = registry.resolve(request("https://example.test/a")).await;
        assert_eq!(body_of(decision), "c", "runtime handler shadows the baseline");
    }

    #[tokio::test]
    async fn test_once_handler_serves_exactly_one_match() {
        let registry = registry(vec![
            serving("one-shot", "/users", "first-hit").once(),
            serving("fallback", "/users", "steady"),
        ]);

        let first = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(first), "first-hit");

        let second = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(second), "steady", "consumed handler is skipped");
    }

    #[tokio::test]
    async fn test_restore_handlers_revives_consumed_ones() {
        let registry = registry(vec![serving("one-shot", "/users", "hit").once()]);

        let _ = registry.resolve(request("https://example.test/users")).await;
        let miss = registry.resolve(request("https://example.test/users")).await;
        assert!(matches!(miss, Decision::Bypass { .. }));

        registry.restore_handlers();

        let again = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(again), "hit");
    }

    #[tokio::test]
    async fn test_reset_reinstates_pristine_baseline() {
        let registry = registry(vec![serving("base", "/users", "base").once()]);
        registry.use_handlers(vec![serving("extra", "/extra", "extra")]);

        let _ = registry.resolve(request("https://example.test/users")).await;
        registry.reset_handlers(None);

        assert_eq!(labels(&registry), ["base"], "runtime handlers are gone");
        let decision = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(decision), "base", "baseline consumption is cleared");
    }

    #[tokio::test]
    async fn test_reset_with_replacement_swaps_the_list() {
        let registry = registry(vec![serving("base", "/users", "base")]);

        registry.reset_handlers(Some(vec![serving("swapped", "/users", "swapped")]));

        assert_eq!(labels(&registry), ["swapped"]);
        let decision = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(decision), "swapped");
    }

    #[tokio::test]
    async fn test_declining_resolver_continues_the_scan() {
        let declining = RequestHandler::new(
            "declines",
            |req: &InterceptedRequest| req.url.ends_with("/users"),
            |_req| async { Ok(None) },
        );
        let registry = registry(vec![declining, serving("fallback", "/users", "served")]);

        let decision = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(decision), "served");
    }

    #[tokio::test]
    async fn test_resolver_error_passes_request_through() {
        let emitter = Arc::new(LifecycleEmitter::new());
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = kinds.clone();
        emitter.on_all(ListenerFn::arc("rec", move |ev: &LifecycleEvent| {
            sink.lock().push(ev.kind);
        }));

        let failing = RequestHandler::new(
            "failing",
            |_req: &InterceptedRequest| true,
            |_req| async { Err::<Option<ResponseStub>, _>("backing store offline".into()) },
        );
        let registry = HandlerRegistry::new(vec![failing], emitter);

        let decision = registry.resolve(request("https://example.test/users")).await;
        assert!(matches!(decision, Decision::Bypass { .. }));
        assert_eq!(*kinds.lock(), [LifecycleEventKind::RequestUnhandled]);
    }

    #[tokio::test]
    async fn test_resolver_panic_passes_request_through() {
        let panicking = RequestHandler::new(
            "panicking",
            |_req: &InterceptedRequest| true,
            |_req| async { panic!("resolver blew up") },
        );
        let registry = registry(vec![panicking]);

        let decision = registry.resolve(request("https://example.test/users")).await;
        assert!(matches!(decision, Decision::Bypass { .. }));
    }

    #[tokio::test]
    async fn test_panicking_predicate_skips_to_next_handler() {
        let angry = RequestHandler::new(
            "angry",
            |_req: &InterceptedRequest| -> bool { panic!("predicate blew up") },
            |_req| async { Ok(Some(ResponseStub::ok().with_body("never"))) },
        );
        let registry = registry(vec![angry, serving("calm", "/users", "served")]);

        let decision = registry.resolve(request("https://example.test/users")).await;
        assert_eq!(body_of(decision), "served");
    }

    #[tokio::test]
    async fn test_unmatched_request_emits_unhandled() {
        let emitter = Arc::new(LifecycleEmitter::new());
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let sink = kinds.clone();
        emitter.on_all(ListenerFn::arc("rec", move |ev: &LifecycleEvent| {
            sink.lock().push(ev.kind);
        }));
        let registry = HandlerRegistry::new(vec![serving("other", "/other", "x")], emitter);

        let decision = registry.resolve(request("https://example.test/users")).await;

        assert!(matches!(decision, Decision::Bypass { .. }));
        assert_eq!(*kinds.lock(), [LifecycleEventKind::RequestUnhandled]);
    }

    #[tokio::test]
    async fn test_match_event_names_the_handler() {
        let emitter = Arc::new(LifecycleEmitter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        emitter.on(
            LifecycleEventKind::RequestMatch,
            ListenerFn::arc("rec", move |ev: &LifecycleEvent| {
                sink.lock().push(ev.handler.clone());
            }),
        );
        let registry = HandlerRegistry::new(vec![serving("get-users", "/users", "[]")], emitter);

        let _ = registry.resolve(request("https://example.test/users")).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_deref(), Some("get-users"));
    }
}
