//! Per-call behavior chain and the index cursor behaviors use to continue it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_core::Outcome;
use tokio_util::sync::CancellationToken;

use super::{Behavior, GlobalBehavior};
use crate::handler::Handler;
use crate::request::{DispatchResult, Request, RequestInfo, RequestKind};

type BoxedFuture<'a> = Pin<Box<dyn Future<Output = DispatchResult> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One entry in a request type's behavior list.
pub(crate) enum Stage<R: Send + Sync + 'static> {
    Global(Arc<dyn GlobalBehavior>),
    Scoped(Arc<dyn Behavior<R>>),
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// What runs once the cursor moves past the last behavior.
#[async_trait]
pub(crate) trait Terminal<R: Send + Sync + 'static>: Send + Sync {
    async fn invoke(&self, request: &R, cancel: &CancellationToken) -> DispatchResult;
}

/// Terminal for payload-less requests: the handler itself.
pub(crate) struct InvokeHandler<'h, R: Request>(pub(crate) &'h dyn Handler<R>);

#[async_trait]
impl<R: Request> Terminal<R> for InvokeHandler<'_, R> {
    async fn invoke(&self, request: &R, cancel: &CancellationToken) -> DispatchResult {
        self.0.handle(request, cancel).await
    }
}

/// Terminal for value-returning requests: the chain only gates the handler,
/// which runs after the chain succeeds.
pub(crate) struct Proceed;

#[async_trait]
impl<R: Send + Sync + 'static> Terminal<R> for Proceed {
    async fn invoke(&self, _request: &R, _cancel: &CancellationToken) -> DispatchResult {
        Ok(Outcome::ok())
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Object-safe view of a chain so that [`Next`] needs no type parameter.
trait Cursor: Send + Sync {
    fn run_from(&self, index: usize) -> BoxedFuture<'_>;
}

/// Everything one dispatch walks through: the request, its ordered stages,
/// and the terminal.
pub(crate) struct Chain<'a, R: Send + Sync + 'static> {
    request: &'a R,
    kind: RequestKind,
    cancel: &'a CancellationToken,
    stages: Vec<Stage<R>>,
    terminal: &'a dyn Terminal<R>,
}

impl<'a, R: Send + Sync + 'static> Chain<'a, R> {
    pub(crate) fn new(
        request: &'a R,
        kind: RequestKind,
        cancel: &'a CancellationToken,
        stages: Vec<Stage<R>>,
        terminal: &'a dyn Terminal<R>,
    ) -> Self {
        Self {
            request,
            kind,
            cancel,
            stages,
            terminal,
        }
    }

    /// Runs the chain from the first stage.
    pub(crate) async fn run(&self) -> DispatchResult {
        self.run_from(0).await
    }
}

impl<R: Send + Sync + 'static> Cursor for Chain<'_, R> {
    fn run_from(&self, index: usize) -> BoxedFuture<'_> {
        Box::pin(async move {
            let next = Next {
                cursor: self,
                index: index + 1,
            };
            match self.stages.get(index) {
                Some(Stage::Global(behavior)) => {
                    let info = RequestInfo::of(self.request, self.kind);
                    behavior.handle(info, next, self.cancel).await
                }
                Some(Stage::Scoped(behavior)) => {
                    behavior.handle(self.request, next, self.cancel).await
                }
                None => self.terminal.invoke(self.request, self.cancel).await,
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Next
// ---------------------------------------------------------------------------

/// Continuation handed to a behavior: runs the rest of the pipeline.
///
/// Consumed by [`run`](Self::run), so a behavior continues at most once.
pub struct Next<'a> {
    cursor: &'a dyn Cursor,
    index: usize,
}

impl Next<'_> {
    /// Runs the remaining behaviors and then the terminal.
    ///
    /// # Errors
    ///
    /// Propagates any error raised further down the pipeline.
    pub async fn run(self) -> DispatchResult {
        self.cursor.run_from(self.index).await
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
