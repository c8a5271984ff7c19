//! Handler contracts. Exactly one handler is registered per request type.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::request::{DispatchResult, Query, Request};

/// Performs the work of a payload-less request.
///
/// Expected business failures are returned as `Outcome::Failure`; an `Err` is
/// reserved for cancellation and defects.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: &R, cancel: &CancellationToken) -> DispatchResult;
}

/// Performs the work of a value-returning request.
#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: &Q, cancel: &CancellationToken) -> DispatchResult<Q::Value>;
}

#[async_trait]
impl<R: Request, H: Handler<R> + ?Sized> Handler<R> for Arc<H> {
    async fn handle(&self, request: &R, cancel: &CancellationToken) -> DispatchResult {
        (**self).handle(request, cancel).await
    }
}

#[async_trait]
impl<Q: Query, H: QueryHandler<Q> + ?Sized> QueryHandler<Q> for Arc<H> {
    async fn handle(&self, query: &Q, cancel: &CancellationToken) -> DispatchResult<Q::Value> {
        (**self).handle(query, cancel).await
    }
}
