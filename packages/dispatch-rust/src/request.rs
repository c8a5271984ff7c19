//! Request contracts and the errors a dispatch can raise outside its `Outcome`.

use std::any::Any;

use conduit_core::{ArgumentError, Outcome};

/// A payload-less request. Its handler answers with `Outcome<()>`.
pub trait Request: Send + Sync + 'static {}

/// A request whose successful outcome carries a value.
pub trait Query: Send + Sync + 'static {
    type Value: Send + 'static;
}

/// Which dispatch path a request travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Request,
    Query,
}

impl RequestKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Query => "query",
        }
    }
}

/// Type-erased view of the request being dispatched, handed to global
/// behaviors that apply to every request type.
#[derive(Clone, Copy)]
pub struct RequestInfo<'a> {
    type_name: &'static str,
    kind: RequestKind,
    request: &'a (dyn Any + Send + Sync),
}

impl<'a> RequestInfo<'a> {
    pub(crate) fn of<R: Send + Sync + 'static>(request: &'a R, kind: RequestKind) -> Self {
        Self {
            type_name: std::any::type_name::<R>(),
            kind,
            request,
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The request as `&dyn Any`, for behaviors that special-case known types.
    #[must_use]
    pub const fn as_any(&self) -> &'a (dyn Any + Send + Sync) {
        self.request
    }
}

impl std::fmt::Debug for RequestInfo<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestInfo")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Conditions a caller cannot be expected to branch on. Business and
/// validation failures are returned as `Outcome::Failure` instead.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for {request_type}")]
    HandlerNotFound { request_type: &'static str },
    #[error("handler registered for {request_type} does not match the {expected} contract")]
    HandlerMismatch {
        request_type: &'static str,
        expected: &'static str,
    },
    #[error("dispatch cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DispatchError {
    /// `true` for wiring errors that surface on first dispatch of a request type.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::HandlerNotFound { .. } | Self::HandlerMismatch { .. }
        )
    }
}

impl From<ArgumentError> for DispatchError {
    fn from(error: ArgumentError) -> Self {
        Self::Internal(error.into())
    }
}

/// What every handler and behavior returns.
pub type DispatchResult<T = ()> = Result<Outcome<T>, DispatchError>;
