//! Global and request-scoped behavior lists.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::pipeline::Stage;
use super::{Behavior, GlobalBehavior};

// ---------------------------------------------------------------------------
// BehaviorRegistry
// ---------------------------------------------------------------------------

/// Global and request-scoped behaviors, in registration order.
///
/// Filled while the dispatcher is being built, read-only afterwards.
pub struct BehaviorRegistry {
    global: Vec<Arc<dyn GlobalBehavior>>,
    /// `TypeId` of the request -> `Vec<Arc<dyn Behavior<R>>>`, erased.
    scoped: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl BehaviorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            scoped: HashMap::new(),
        }
    }

    /// Append a behavior that runs for every request type.
    pub fn register_global<B: GlobalBehavior + 'static>(&mut self, behavior: B) {
        self.global.push(Arc::new(behavior));
    }

    /// Append a behavior that runs only for request type `R`.
    pub fn register<R, B>(&mut self, behavior: B)
    where
        R: Send + Sync + 'static,
        B: Behavior<R> + 'static,
    {
        let behavior: Arc<dyn Behavior<R>> = Arc::new(behavior);
        let entry = self
            .scoped
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Vec::<Arc<dyn Behavior<R>>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<Arc<dyn Behavior<R>>>>() {
            list.push(behavior);
        }
    }

    #[must_use]
    pub fn global_count(&self) -> usize {
        self.global.len()
    }

    /// Number of behaviors scoped to `R`.
    #[must_use]
    pub fn scoped_count<R: Send + Sync + 'static>(&self) -> usize {
        self.scoped_for::<R>().map_or(0, <[_]>::len)
    }

    fn scoped_for<R: Send + Sync + 'static>(&self) -> Option<&[Arc<dyn Behavior<R>>]> {
        self.scoped
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Vec<Arc<dyn Behavior<R>>>>())
            .map(Vec::as_slice)
    }

    /// Global behaviors followed by those scoped to `R`.
    pub(crate) fn stages_for<R: Send + Sync + 'static>(&self) -> Vec<Stage<R>> {
        let scoped = self.scoped_for::<R>().unwrap_or_default();
        let mut stages = Vec::with_capacity(self.global.len() + scoped.len());
        stages.extend(self.global.iter().cloned().map(Stage::Global));
        stages.extend(scoped.iter().cloned().map(Stage::Scoped));
        stages
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
