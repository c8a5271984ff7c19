//! Handler registration and the per-type binding cache.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::handler::{Handler, QueryHandler};
use crate::request::{DispatchError, Query, Request, RequestKind};

// ---------------------------------------------------------------------------
// HandlerBinding
// ---------------------------------------------------------------------------

/// Resolved association between a request type and its handler entry point.
///
/// `H` is the handler contract: `dyn Handler<R>` or `dyn QueryHandler<Q>`.
pub struct HandlerBinding<H: ?Sized> {
    request_type: &'static str,
    handler_type: &'static str,
    handler: Arc<H>,
}

impl<H: ?Sized> HandlerBinding<H> {
    #[must_use]
    pub const fn request_type(&self) -> &'static str {
        self.request_type
    }

    #[must_use]
    pub const fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    #[must_use]
    pub const fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

impl<H: ?Sized> std::fmt::Debug for HandlerBinding<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding")
            .field("request_type", &self.request_type)
            .field("handler_type", &self.handler_type)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// HandlerRegistry
// ---------------------------------------------------------------------------

struct Registration {
    request_type: &'static str,
    handler_type: &'static str,
    kind: RequestKind,
    /// `Arc<dyn Handler<R>>` or `Arc<dyn QueryHandler<Q>>`, erased.
    entry: Arc<dyn Any + Send + Sync>,
}

/// Maps each request type to its single handler.
///
/// Registration takes `&mut self` and happens while the dispatcher is being
/// built. Resolution takes `&self`: the first lookup of a request type builds a
/// [`HandlerBinding`] and caches it for the registry's lifetime. Concurrent
/// first lookups may both build a binding, but only one is stored and every
/// caller receives that one.
pub struct HandlerRegistry {
    registrations: HashMap<TypeId, Registration>,
    /// `TypeId` of the request -> `Arc<HandlerBinding<_>>`, erased. Append-only
    /// once registration is over.
    bindings: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    resolutions: AtomicUsize,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            bindings: DashMap::new(),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// Register the handler for payload-less request `R`, replacing any
    /// previous one along with its cached binding.
    pub fn register<R, H>(&mut self, handler: H)
    where
        R: Request,
        H: Handler<R> + 'static,
    {
        let handler: Arc<dyn Handler<R>> = Arc::new(handler);
        self.insert::<R>(type_name::<H>(), RequestKind::Request, Arc::new(handler));
    }

    /// Register the handler for value-returning request `Q`, replacing any
    /// previous one.
    pub fn register_query<Q, H>(&mut self, handler: H)
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let handler: Arc<dyn QueryHandler<Q>> = Arc::new(handler);
        self.insert::<Q>(type_name::<H>(), RequestKind::Query, Arc::new(handler));
    }

    fn insert<R: 'static>(
        &mut self,
        handler_type: &'static str,
        kind: RequestKind,
        entry: Arc<dyn Any + Send + Sync>,
    ) {
        let request_type = type_name::<R>();
        let previous = self.registrations.insert(
            TypeId::of::<R>(),
            Registration {
                request_type,
                handler_type,
                kind,
                entry,
            },
        );
        if let Some(previous) = previous {
            self.bindings.remove(&TypeId::of::<R>());
            tracing::warn!(
                request = request_type,
                replaced = previous.handler_type,
                handler = handler_type,
                "handler registration replaced"
            );
        }
    }

    /// Whether a handler is registered for `R`, of either kind.
    #[must_use]
    pub fn contains<R: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<R>())
    }

    /// Number of registered request types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Number of bindings built and stored so far.
    #[must_use]
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Acquire)
    }

    /// Resolve the binding for payload-less request `R`.
    ///
    /// # Errors
    ///
    /// `HandlerNotFound` if nothing is registered for `R`; `HandlerMismatch` if
    /// `R` was registered as a query.
    pub fn resolve<R: Request>(&self) -> Result<Arc<HandlerBinding<dyn Handler<R>>>, DispatchError> {
        self.resolve_as::<R, dyn Handler<R>>(RequestKind::Request)
    }

    /// Resolve the binding for value-returning request `Q`.
    ///
    /// # Errors
    ///
    /// `HandlerNotFound` if nothing is registered for `Q`; `HandlerMismatch` if
    /// `Q` was registered as a payload-less request.
    pub fn resolve_query<Q: Query>(
        &self,
    ) -> Result<Arc<HandlerBinding<dyn QueryHandler<Q>>>, DispatchError> {
        self.resolve_as::<Q, dyn QueryHandler<Q>>(RequestKind::Query)
    }

    fn resolve_as<R, H>(&self, kind: RequestKind) -> Result<Arc<HandlerBinding<H>>, DispatchError>
    where
        R: 'static,
        H: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<R>();
        let mismatch = || DispatchError::HandlerMismatch {
            request_type: type_name::<R>(),
            expected: kind.as_str(),
        };

        // The read guard is released before any insert on the same map.
        let cached = self.bindings.get(&key).map(|entry| entry.value().clone());
        let erased = match cached {
            Some(erased) => erased,
            None => {
                let built = self.bind::<R, H>(key, kind)?;
                self.bindings
                    .entry(key)
                    .or_insert_with(|| {
                        self.resolutions.fetch_add(1, Ordering::AcqRel);
                        tracing::debug!(request = type_name::<R>(), "handler binding cached");
                        built
                    })
                    .value()
                    .clone()
            }
        };

        erased.downcast::<HandlerBinding<H>>().map_err(|_| mismatch())
    }

    fn bind<R, H>(
        &self,
        key: TypeId,
        kind: RequestKind,
    ) -> Result<Arc<dyn Any + Send + Sync>, DispatchError>
    where
        R: 'static,
        H: ?Sized + Send + Sync + 'static,
    {
        let registration =
            self.registrations
                .get(&key)
                .ok_or(DispatchError::HandlerNotFound {
                    request_type: type_name::<R>(),
                })?;

        let Ok(handler) = Arc::clone(&registration.entry).downcast::<Arc<H>>() else {
            tracing::error!(
                request = registration.request_type,
                registered = registration.kind.as_str(),
                expected = kind.as_str(),
                "handler contract mismatch"
            );
            return Err(DispatchError::HandlerMismatch {
                request_type: registration.request_type,
                expected: kind.as_str(),
            });
        };

        // `handler` is the stored `Arc<Arc<H>>`; the binding holds the inner `Arc<H>`.
        Ok(Arc::new(HandlerBinding::<H> {
            request_type: registration.request_type,
            handler_type: registration.handler_type,
            handler: Arc::clone(&*handler),
        }))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
