//! Tower adapters: expose one request type of a [`Dispatcher`] as a
//! `tower::Service`, so it can be stacked with ordinary tower layers.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use conduit_core::Outcome;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::dispatcher::Dispatcher;
use crate::request::{DispatchError, Query, Request};

type ServiceFuture<T> = Pin<Box<dyn Future<Output = Result<Outcome<T>, DispatchError>> + Send>>;

// ---------------------------------------------------------------------------
// DispatchService
// ---------------------------------------------------------------------------

/// `tower::Service<R>` for payload-less requests.
///
/// Every call gets a child of the service's token: cancelling the service
/// token cancels all in-flight calls made through it.
pub struct DispatchService<R> {
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    _request: PhantomData<fn(R)>,
}

impl<R: Request> DispatchService<R> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_cancellation(dispatcher, CancellationToken::new())
    }

    #[must_use]
    pub fn with_cancellation(dispatcher: Dispatcher, cancel: CancellationToken) -> Self {
        Self {
            dispatcher,
            cancel,
            _request: PhantomData,
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<R> Clone for DispatchService<R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            cancel: self.cancel.clone(),
            _request: PhantomData,
        }
    }
}

impl<R> std::fmt::Debug for DispatchService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchService")
            .field("request", &std::any::type_name::<R>())
            .finish_non_exhaustive()
    }
}

impl<R: Request> Service<R> for DispatchService<R> {
    type Response = Outcome;
    type Error = DispatchError;
    type Future = ServiceFuture<()>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let cancel = self.cancel.child_token();
        Box::pin(async move { dispatcher.send(&request, &cancel).await })
    }
}

// ---------------------------------------------------------------------------
// QueryService
// ---------------------------------------------------------------------------

/// `tower::Service<Q>` for value-returning requests.
pub struct QueryService<Q> {
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    _query: PhantomData<fn(Q)>,
}

impl<Q: Query> QueryService<Q> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_cancellation(dispatcher, CancellationToken::new())
    }

    #[must_use]
    pub fn with_cancellation(dispatcher: Dispatcher, cancel: CancellationToken) -> Self {
        Self {
            dispatcher,
            cancel,
            _query: PhantomData,
        }
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<Q> Clone for QueryService<Q> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            cancel: self.cancel.clone(),
            _query: PhantomData,
        }
    }
}

impl<Q> std::fmt::Debug for QueryService<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("query", &std::any::type_name::<Q>())
            .finish_non_exhaustive()
    }
}

impl<Q: Query> Service<Q> for QueryService<Q> {
    type Response = Outcome<Q::Value>;
    type Error = DispatchError;
    type Future = ServiceFuture<Q::Value>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, query: Q) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        let cancel = self.cancel.child_token();
        Box::pin(async move { dispatcher.query(&query, &cancel).await })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tower::ServiceExt;

    use super::*;
    use crate::behavior::CancellationBehavior;
    use crate::handler::{Handler, QueryHandler};
    use crate::request::DispatchResult;

    struct Touch;
    impl Request for Touch {}

    struct Double(i64);
    impl Query for Double {
        type Value = i64;
    }

    struct TouchHandler;

    #[async_trait]
    impl Handler<Touch> for TouchHandler {
        async fn handle(&self, _request: &Touch, _cancel: &CancellationToken) -> DispatchResult {
            Ok(Outcome::ok())
        }
    }

    struct DoubleHandler;

    #[async_trait]
    impl QueryHandler<Double> for DoubleHandler {
        async fn handle(&self, query: &Double, _cancel: &CancellationToken) -> DispatchResult<i64> {
            Ok(Outcome::success(query.0 * 2))
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::builder()
            .handler::<Touch, _>(TouchHandler)
            .query_handler::<Double, _>(DoubleHandler)
            .global_behavior(CancellationBehavior)
            .build()
    }

    #[tokio::test]
    async fn dispatch_service_sends_the_request() {
        let outcome = DispatchService::<Touch>::new(dispatcher())
            .oneshot(Touch)
            .await
            .unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn query_service_returns_the_value() {
        let outcome = QueryService::<Double>::new(dispatcher())
            .oneshot(Double(21))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::success(42));
    }

    #[tokio::test]
    async fn cancelling_the_service_token_cancels_calls() {
        let service = DispatchService::<Touch>::new(dispatcher());
        service.cancellation_token().cancel();

        let err = service.oneshot(Touch).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
    }

    #[tokio::test]
    async fn unregistered_type_surfaces_as_service_error() {
        struct Stray;
        impl Request for Stray {}

        let err = DispatchService::<Stray>::new(dispatcher())
            .oneshot(Stray)
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
