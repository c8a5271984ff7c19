//! Logging behavior.
//!
//! Records request duration and outcome using `tracing` spans. Registered as a
//! global behavior so every request type is covered.

use std::time::Instant;

use async_trait::async_trait;
use conduit_core::Outcome;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::{GlobalBehavior, Next};
use crate::request::{DispatchError, DispatchResult, RequestInfo};

/// Wraps the rest of the pipeline in a `request` span with timing and outcome.
///
/// Business failures are logged at `warn` with their code; dispatch errors at
/// `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBehavior;

impl LoggingBehavior {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GlobalBehavior for LoggingBehavior {
    async fn handle(
        &self,
        request: RequestInfo<'_>,
        next: Next<'_>,
        _cancel: &CancellationToken,
    ) -> DispatchResult {
        let request_type = request.type_name();
        let span = info_span!(
            "request",
            request = request_type,
            kind = request.kind().as_str(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = next.run().await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;

            let outcome = match &result {
                Ok(Outcome::Success(_)) => "success",
                Ok(Outcome::Failure(_)) => "failure",
                Err(DispatchError::Cancelled) => "cancelled",
                Err(_) => "error",
            };
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);

            match &result {
                Ok(Outcome::Failure(error)) => tracing::warn!(
                    request = request_type,
                    code = error.code().unwrap_or_default(),
                    duration_ms,
                    "request failed: {}",
                    error.message()
                ),
                Err(err) => tracing::error!(
                    request = request_type,
                    duration_ms,
                    error = %err,
                    "request errored"
                ),
                Ok(Outcome::Success(())) => tracing::info!(
                    request = request_type,
                    duration_ms,
                    "request complete"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
