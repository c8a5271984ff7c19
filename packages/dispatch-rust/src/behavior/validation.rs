//! Request validation behavior.

use std::marker::PhantomData;

use async_trait::async_trait;
use conduit_core::Outcome;
use tokio_util::sync::CancellationToken;

use super::{Behavior, Next};
use crate::request::DispatchResult;

/// A request that can check its own fields before being handled.
///
/// Implementations typically build the outcome with
/// [`conduit_core::Validator`].
pub trait Validate {
    fn validate(&self) -> Outcome<()>;
}

/// Request-scoped behavior that returns the request's validation failure
/// without running the rest of the pipeline.
pub struct ValidationBehavior<R> {
    _request: PhantomData<fn(&R)>,
}

impl<R> ValidationBehavior<R> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _request: PhantomData,
        }
    }
}

impl<R> Default for ValidationBehavior<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> std::fmt::Debug for ValidationBehavior<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationBehavior")
            .field("request", &std::any::type_name::<R>())
            .finish()
    }
}

#[async_trait]
impl<R> Behavior<R> for ValidationBehavior<R>
where
    R: Validate + Send + Sync + 'static,
{
    async fn handle(&self, request: &R, next: Next<'_>, _cancel: &CancellationToken) -> DispatchResult {
        match request.validate() {
            Outcome::Success(()) => next.run().await,
            Outcome::Failure(error) => {
                tracing::debug!(
                    request = std::any::type_name::<R>(),
                    failures = error.details().len(),
                    "request rejected by validation"
                );
                Ok(Outcome::Failure(error))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
