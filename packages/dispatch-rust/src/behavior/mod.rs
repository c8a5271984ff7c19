//! Behaviors: interceptors that wrap handler execution.
//!
//! - [`pipeline`]: the `Next` cursor and the per-call chain it walks
//! - [`registry`]: global and request-scoped behavior lists
//! - [`logging`]: per-request tracing span with timing and outcome
//! - [`validation`]: short-circuits requests that fail their own rules
//! - [`cancellation`]: stops the chain once the caller has cancelled
//!
//! Global behaviors run before request-scoped ones; each group keeps its
//! registration order.

pub mod cancellation;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod validation;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::request::{DispatchResult, RequestInfo};

pub use cancellation::CancellationBehavior;
pub use logging::LoggingBehavior;
pub use pipeline::Next;
pub use registry::BehaviorRegistry;
pub use validation::{Validate, ValidationBehavior};

/// Interceptor registered for one request type `R`.
///
/// Call `next.run().await` to continue down the pipeline. Returning without
/// running `next` short-circuits: nothing after this behavior executes and the
/// returned outcome becomes the dispatch result.
#[async_trait]
pub trait Behavior<R: Send + Sync + 'static>: Send + Sync {
    async fn handle(&self, request: &R, next: Next<'_>, cancel: &CancellationToken)
        -> DispatchResult;
}

/// Interceptor applied to every request type.
///
/// Sees the request through the type-erased [`RequestInfo`].
#[async_trait]
pub trait GlobalBehavior: Send + Sync {
    async fn handle(
        &self,
        request: RequestInfo<'_>,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> DispatchResult;
}
