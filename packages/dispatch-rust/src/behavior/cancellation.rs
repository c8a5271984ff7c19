//! Cancellation checkpoint behavior.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{GlobalBehavior, Next};
use crate::request::{DispatchError, DispatchResult, RequestInfo};

/// Global behavior that stops the pipeline with [`DispatchError::Cancelled`]
/// when the caller's token is already cancelled.
///
/// The dispatcher never checks the token itself; register this behavior to
/// get a checkpoint at the position it occupies in the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancellationBehavior;

#[async_trait]
impl GlobalBehavior for CancellationBehavior {
    async fn handle(
        &self,
        request: RequestInfo<'_>,
        next: Next<'_>,
        cancel: &CancellationToken,
    ) -> DispatchResult {
        if cancel.is_cancelled() {
            tracing::debug!(request = request.type_name(), "dispatch cancelled before handling");
            return Err(DispatchError::Cancelled);
        }
        next.run().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use conduit_core::Outcome;

    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::handler::Handler;
    use crate::request::Request;

    struct Work;
    impl Request for Work {}

    struct WorkHandler {
        ran: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Handler<Work> for WorkHandler {
        async fn handle(&self, _request: &Work, _cancel: &CancellationToken) -> DispatchResult {
            self.ran.store(true, Ordering::SeqCst);
            Ok(Outcome::ok())
        }
    }

    fn dispatcher(ran: &Arc<AtomicBool>) -> Dispatcher {
        Dispatcher::builder()
            .handler::<Work, _>(WorkHandler {
                ran: Arc::clone(ran),
            })
            .global_behavior(CancellationBehavior)
            .build()
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_handler() {
        let ran = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = dispatcher(&ran).send(&Work, &cancel).await.unwrap_err();
        assert!(matches!(err, DispatchError::Cancelled));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn live_token_passes_through() {
        let ran = Arc::new(AtomicBool::new(false));
        let outcome = dispatcher(&ran)
            .send(&Work, &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert!(ran.load(Ordering::SeqCst));
    }
}
