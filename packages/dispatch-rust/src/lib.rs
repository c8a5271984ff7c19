//! `Conduit` Dispatch — in-process request dispatch with a behavior pipeline.
//!
//! A [`Dispatcher`] maps each request type to exactly one handler, wraps the
//! handler in global and request-scoped behaviors, and returns the handler's
//! [`Outcome`](conduit_core::Outcome).

pub mod behavior;
pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod registry;
pub mod request;
pub mod service;

pub use behavior::{
    Behavior, BehaviorRegistry, CancellationBehavior, GlobalBehavior, LoggingBehavior, Next,
    Validate, ValidationBehavior,
};
pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use handler::{Handler, QueryHandler};
pub use registry::{HandlerBinding, HandlerRegistry};
pub use request::{DispatchError, DispatchResult, Query, Request, RequestInfo, RequestKind};
pub use service::{DispatchService, QueryService};
