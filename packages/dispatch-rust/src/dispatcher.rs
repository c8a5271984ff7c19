//! The dispatch entry point: resolves a request's handler, runs the behavior
//! pipeline around it, and returns the final outcome.

use std::any::type_name;
use std::future::Future;
use std::sync::Arc;

use conduit_core::Outcome;
use tokio_util::sync::CancellationToken;
use tracing::{debug_span, Instrument, Span};
use uuid::Uuid;

use crate::behavior::pipeline::{Chain, InvokeHandler, Proceed};
use crate::behavior::{Behavior, BehaviorRegistry, GlobalBehavior};
use crate::config::DispatcherConfig;
use crate::handler::{Handler, QueryHandler};
use crate::registry::HandlerRegistry;
use crate::request::{DispatchError, DispatchResult, Query, Request, RequestKind};

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes requests to their handler through the registered behaviors.
///
/// Cheap to clone: registries and config are shared. Handler bindings are
/// cached on first dispatch of each request type and shared by every clone.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
    behaviors: Arc<BehaviorRegistry>,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        handlers: HandlerRegistry,
        behaviors: BehaviorRegistry,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            handlers: Arc::new(handlers),
            behaviors: Arc::new(behaviors),
            config: Arc::new(config),
        }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    #[must_use]
    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatch a payload-less request.
    ///
    /// With no applicable behaviors the handler is invoked directly. Otherwise
    /// global behaviors, then behaviors scoped to `R`, wrap the handler; any of
    /// them may short-circuit.
    ///
    /// # Errors
    ///
    /// `HandlerNotFound`/`HandlerMismatch` before any pipeline work if `R` is
    /// not wired correctly; otherwise whatever a stage raised.
    pub async fn send<R: Request>(&self, request: &R, cancel: &CancellationToken) -> DispatchResult {
        let binding = self.handlers.resolve::<R>()?;
        let stages = self.behaviors.stages_for::<R>();

        let pipeline = async move {
            let handler: &dyn Handler<R> = binding.handler().as_ref();
            if stages.is_empty() {
                return handler.handle(request, cancel).await;
            }
            let terminal = InvokeHandler(handler);
            let chain = Chain::new(request, RequestKind::Request, cancel, stages, &terminal);
            chain.run().await
        };

        self.observe::<R, ()>(RequestKind::Request, pipeline).await
    }

    /// Dispatch a value-returning request.
    ///
    /// The behavior chain runs first with a payload-less terminal. A failure
    /// from the chain is returned as-is and the handler never runs; on success
    /// the handler's outcome is the result. Behaviors therefore never see the
    /// handler's value.
    ///
    /// # Errors
    ///
    /// `HandlerNotFound`/`HandlerMismatch` before any pipeline work if `Q` is
    /// not wired correctly; otherwise whatever a stage raised.
    pub async fn query<Q: Query>(
        &self,
        query: &Q,
        cancel: &CancellationToken,
    ) -> DispatchResult<Q::Value> {
        let binding = self.handlers.resolve_query::<Q>()?;
        let stages = self.behaviors.stages_for::<Q>();

        let pipeline = async move {
            let gate = if stages.is_empty() {
                Outcome::ok()
            } else {
                Chain::new(query, RequestKind::Query, cancel, stages, &Proceed)
                    .run()
                    .await?
            };
            match gate {
                Outcome::Success(()) => binding.handler().handle(query, cancel).await,
                Outcome::Failure(error) => Ok(Outcome::Failure(error)),
            }
        };

        self.observe::<Q, Q::Value>(RequestKind::Query, pipeline).await
    }

    async fn observe<R, T>(
        &self,
        kind: RequestKind,
        pipeline: impl Future<Output = DispatchResult<T>>,
    ) -> DispatchResult<T> {
        let request_type = type_name::<R>();
        let span = if self.config.trace_dispatches {
            debug_span!(
                "dispatch",
                dispatcher = %self.config.name,
                dispatch_id = %Uuid::new_v4(),
                request = request_type,
                kind = kind.as_str(),
                outcome = tracing::field::Empty,
            )
        } else {
            Span::none()
        };

        let log_failures = self.config.log_failures;
        async move {
            let result = pipeline.await;
            let outcome = match &result {
                Ok(Outcome::Success(_)) => "success",
                Ok(Outcome::Failure(_)) => "failure",
                Err(DispatchError::Cancelled) => "cancelled",
                Err(_) => "error",
            };
            Span::current().record("outcome", outcome);

            if log_failures {
                if let Ok(Outcome::Failure(error)) = &result {
                    tracing::debug!(
                        request = request_type,
                        code = error.code().unwrap_or_default(),
                        "dispatch returned failure: {}",
                        error.message()
                    );
                }
            }
            result
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.config.name)
            .field("handlers", &self.handlers.len())
            .field("global_behaviors", &self.behaviors.global_count())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DispatcherBuilder
// ---------------------------------------------------------------------------

/// Collects handlers, behaviors and config at start-up.
#[must_use]
pub struct DispatcherBuilder {
    handlers: HandlerRegistry,
    behaviors: BehaviorRegistry,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            behaviors: BehaviorRegistry::new(),
            config: DispatcherConfig::default(),
        }
    }

    pub fn handler<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: Handler<R> + 'static,
    {
        self.handlers.register::<R, H>(handler);
        self
    }

    pub fn query_handler<Q, H>(mut self, handler: H) -> Self
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        self.handlers.register_query::<Q, H>(handler);
        self
    }

    /// Appends a behavior that runs for every request, before any scoped one.
    pub fn global_behavior<B: GlobalBehavior + 'static>(mut self, behavior: B) -> Self {
        self.behaviors.register_global(behavior);
        self
    }

    /// Appends a behavior that runs only for `R`.
    pub fn behavior<R, B>(mut self, behavior: B) -> Self
    where
        R: Send + Sync + 'static,
        B: Behavior<R> + 'static,
    {
        self.behaviors.register::<R, B>(behavior);
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn build(self) -> Dispatcher {
        tracing::debug!(
            dispatcher = %self.config.name,
            handlers = self.handlers.len(),
            global_behaviors = self.behaviors.global_count(),
            "dispatcher built"
        );
        Dispatcher::new(self.handlers, self.behaviors, self.config)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use conduit_core::Error;
    use parking_lot::Mutex;

    use super::*;
    use crate::behavior::Next;
    use crate::request::RequestInfo;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    // -- requests -----------------------------------------------------------

    struct Rename {
        name: String,
    }
    impl Request for Rename {}

    struct Lookup {
        id: u32,
    }
    impl Query for Lookup {
        type Value = String;
    }

    struct Unwired;
    impl Request for Unwired {}

    // -- handlers -----------------------------------------------------------

    struct RenameHandler {
        log: Log,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Handler<Rename> for RenameHandler {
        async fn handle(&self, request: &Rename, cancel: &CancellationToken) -> DispatchResult {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }
            self.log.lock().push("handler");
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.name.is_empty() {
                return Ok(Outcome::fail("name is empty", Some("EMPTY"))?);
            }
            Ok(Outcome::ok())
        }
    }

    struct LookupHandler {
        log: Log,
    }

    #[async_trait]
    impl QueryHandler<Lookup> for LookupHandler {
        async fn handle(&self, query: &Lookup, _cancel: &CancellationToken) -> DispatchResult<String> {
            self.log.lock().push("handler");
            Ok(Outcome::success(format!("user-{}", query.id)))
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct StoreUnavailable;

    struct BrokenHandler;

    #[async_trait]
    impl Handler<Rename> for BrokenHandler {
        async fn handle(&self, _request: &Rename, _cancel: &CancellationToken) -> DispatchResult {
            Err(anyhow::Error::new(StoreUnavailable).into())
        }
    }

    // -- behaviors ----------------------------------------------------------

    /// Records its name, then either continues or fails without continuing.
    struct Step {
        name: &'static str,
        log: Log,
        stop: bool,
    }

    impl Step {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                stop: false,
            }
        }

        fn stopping(name: &'static str, log: &Log) -> Self {
            Self {
                stop: true,
                ..Self::new(name, log)
            }
        }

        async fn step(&self, next: Next<'_>) -> DispatchResult {
            self.log.lock().push(self.name);
            if self.stop {
                return Ok(Outcome::failure(
                    Error::new(format!("stopped by {}", self.name))?.with_code("STOPPED"),
                ));
            }
            next.run().await
        }
    }

    #[async_trait]
    impl GlobalBehavior for Step {
        async fn handle(
            &self,
            _request: RequestInfo<'_>,
            next: Next<'_>,
            _cancel: &CancellationToken,
        ) -> DispatchResult {
            self.step(next).await
        }
    }

    #[async_trait]
    impl Behavior<Rename> for Step {
        async fn handle(
            &self,
            _request: &Rename,
            next: Next<'_>,
            _cancel: &CancellationToken,
        ) -> DispatchResult {
            self.step(next).await
        }
    }

    #[async_trait]
    impl Behavior<Lookup> for Step {
        async fn handle(
            &self,
            _request: &Lookup,
            next: Next<'_>,
            _cancel: &CancellationToken,
        ) -> DispatchResult {
            self.step(next).await
        }
    }

    fn rename_handler(log: &Log) -> (RenameHandler, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            RenameHandler {
                log: Arc::clone(log),
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }

    fn rename(name: &str) -> Rename {
        Rename {
            name: name.to_string(),
        }
    }

    // -- tests --------------------------------------------------------------

    #[tokio::test]
    async fn globals_then_scoped_then_handler() {
        let log: Log = Arc::default();
        let (handler, _) = rename_handler(&log);
        let dispatcher = Dispatcher::builder()
            .handler::<Rename, _>(handler)
            .behavior::<Rename, _>(Step::new("C", &log))
            .global_behavior(Step::new("A", &log))
            .global_behavior(Step::new("B", &log))
            .build();

        let outcome = dispatcher
            .send(&rename("ada"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::ok());
        assert_eq!(*log.lock(), vec!["A", "B", "C", "handler"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_remaining_behaviors_and_handler() {
        let log: Log = Arc::default();
        let (handler, calls) = rename_handler(&log);
        let dispatcher = Dispatcher::builder()
            .handler::<Rename, _>(handler)
            .global_behavior(Step::new("A", &log))
            .global_behavior(Step::stopping("B", &log))
            .behavior::<Rename, _>(Step::new("C", &log))
            .build();

        let outcome = dispatcher
            .send(&rename("ada"), &CancellationToken::new())
            .await
            .unwrap();

        let error = outcome.error().unwrap();
        assert_eq!(error.message(), "stopped by B");
        assert_eq!(error.code(), Some("STOPPED"));
        assert_eq!(*log.lock(), vec!["A", "B"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_behaviors_invokes_handler_directly() {
        let log: Log = Arc::default();
        let (handler, calls) = rename_handler(&log);
        let dispatcher = Dispatcher::builder().handler::<Rename, _>(handler).build();

        let outcome = dispatcher
            .send(&rename(""), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.error().unwrap().code(), Some("EMPTY"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_dispatch_reuses_the_cached_binding() {
        let log: Log = Arc::default();
        let (handler, calls) = rename_handler(&log);
        let dispatcher = Dispatcher::builder().handler::<Rename, _>(handler).build();
        let cancel = CancellationToken::new();

        dispatcher.send(&rename("a"), &cancel).await.unwrap();
        dispatcher.send(&rename("b"), &cancel).await.unwrap();

        assert_eq!(dispatcher.handlers().resolution_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let first = dispatcher.handlers().resolve::<Rename>().unwrap();
        let second = dispatcher.handlers().resolve::<Rename>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn query_runs_behaviors_before_handler() {
        let log: Log = Arc::default();
        let dispatcher = Dispatcher::builder()
            .query_handler::<Lookup, _>(LookupHandler {
                log: Arc::clone(&log),
            })
            .global_behavior(Step::new("A", &log))
            .behavior::<Lookup, _>(Step::new("C", &log))
            .build();

        let outcome = dispatcher
            .query(&Lookup { id: 7 }, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::success("user-7".to_string()));
        assert_eq!(*log.lock(), vec!["A", "C", "handler"]);
    }

    #[tokio::test]
    async fn query_failure_in_chain_skips_handler_and_carries_no_value() {
        let log: Log = Arc::default();
        let dispatcher = Dispatcher::builder()
            .query_handler::<Lookup, _>(LookupHandler {
                log: Arc::clone(&log),
            })
            .behavior::<Lookup, _>(Step::stopping("C", &log))
            .build();

        let outcome = dispatcher
            .query(&Lookup { id: 7 }, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.is_failure());
        assert!(outcome.value().is_err());
        assert_eq!(outcome.error().unwrap().message(), "stopped by C");
        assert_eq!(*log.lock(), vec!["C"]);
    }

    #[tokio::test]
    async fn missing_handler_fails_before_any_behavior_runs() {
        let log: Log = Arc::default();
        let dispatcher = Dispatcher::builder()
            .global_behavior(Step::new("A", &log))
            .build();

        let err = dispatcher
            .send(&Unwired, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(matches!(err, DispatchError::HandlerNotFound { .. }));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn handler_error_surfaces_with_its_original_type() {
        let dispatcher = Dispatcher::builder()
            .handler::<Rename, _>(BrokenHandler)
            .build();

        let err = dispatcher
            .send(&rename("ada"), &CancellationToken::new())
            .await
            .unwrap_err();

        let DispatchError::Internal(inner) = err else {
            panic!("expected an internal error");
        };
        assert!(inner.downcast_ref::<StoreUnavailable>().is_some());
    }

    #[tokio::test]
    async fn cancellation_reaches_the_handler() {
        let log: Log = Arc::default();
        let (handler, calls) = rename_handler(&log);
        let dispatcher = Dispatcher::builder()
            .handler::<Rename, _>(handler)
            .global_behavior(Step::new("A", &log))
            .build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatcher.send(&rename("ada"), &cancel).await.unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled));
        assert_eq!(*log.lock(), vec!["A"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn untraced_dispatcher_behaves_the_same() {
        let log: Log = Arc::default();
        let (handler, _) = rename_handler(&log);
        let dispatcher = Dispatcher::builder()
            .handler::<Rename, _>(handler)
            .config(DispatcherConfig {
                trace_dispatches: false,
                log_failures: false,
                ..DispatcherConfig::default()
            })
            .build();

        let outcome = dispatcher
            .send(&rename(""), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_failure());
    }

    #[tokio::test]
    async fn concurrent_dispatches_share_the_binding_cache() {
        let log: Log = Arc::default();
        let (handler, calls) = rename_handler(&log);
        let dispatcher = Dispatcher::builder()
            .handler::<Rename, _>(handler)
            .query_handler::<Lookup, _>(LookupHandler {
                log: Arc::clone(&log),
            })
            .build();

        let mut tasks = Vec::new();
        for i in 0..16 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                let cancel = CancellationToken::new();
                let result = if i % 2 == 0 {
                    let request = rename("x");
                    dispatcher.send(&request, &cancel).await
                } else {
                    let query = Lookup { id: i };
                    dispatcher.query(&query, &cancel).await.map(Outcome::discard)
                };
                result
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_success());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 8);
        assert_eq!(dispatcher.handlers().resolution_count(), 2);
    }

    const NAMES: [&str; 6] = ["g0", "g1", "g2", "s0", "s1", "s2"];

    proptest::proptest! {
        #[test]
        fn globals_always_precede_scoped(
            order in proptest::collection::vec(proptest::bool::ANY, 0..6),
        ) {
            let log: Log = Arc::default();
            let (handler, _) = rename_handler(&log);
            let mut builder = Dispatcher::builder().handler::<Rename, _>(handler);
            let (mut globals, mut scoped) = (0, 0);
            for is_global in &order {
                if *is_global && globals < 3 {
                    builder = builder.global_behavior(Step::new(NAMES[globals], &log));
                    globals += 1;
                } else if !*is_global && scoped < 3 {
                    builder = builder.behavior::<Rename, _>(Step::new(NAMES[3 + scoped], &log));
                    scoped += 1;
                }
            }
            let dispatcher = builder.build();

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime
                .block_on(dispatcher.send(&rename("ada"), &CancellationToken::new()))
                .unwrap();

            let mut expected: Vec<&str> = NAMES[..globals].to_vec();
            expected.extend_from_slice(&NAMES[3..3 + scoped]);
            expected.push("handler");
            proptest::prop_assert_eq!(log.lock().clone(), expected);
        }
    }
}
