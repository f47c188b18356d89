//! Named action and guard lookup owned by the machine.
//!
//! States and transitions reference behavior by name; the registry maps
//! those names to functions at dispatch time. Lookups that miss are handled
//! by the interpreter: a missing action is skipped, a missing guard
//! suppresses its transition. Validation rejects dangling names at build
//! time, so runtime misses only occur for hand-assembled, unvalidated
//! machines.

use super::ids::{ActionId, Event, GuardId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Side-effecting callback invoked during entry, exit, or a transition.
/// Receives the context mutably and the triggering event.
pub type Action<C> = Arc<dyn Fn(&mut C, &Event) + Send + Sync>;

/// Predicate gating a transition. Sees the context read-only.
pub type GuardFn<C> = Arc<dyn Fn(&C, &Event) -> bool + Send + Sync>;

/// Name-to-function maps for a machine's actions and guards.
pub struct Registry<C> {
    actions: HashMap<ActionId, Action<C>>,
    guards: HashMap<GuardId, GuardFn<C>>,
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            guards: HashMap::new(),
        }
    }

    /// Register an action under a name, replacing any previous entry.
    pub fn register_action<F>(&mut self, id: impl Into<ActionId>, action: F)
    where
        F: Fn(&mut C, &Event) + Send + Sync + 'static,
    {
        self.actions.insert(id.into(), Arc::new(action));
    }

    /// Register a guard under a name, replacing any previous entry.
    pub fn register_guard<F>(&mut self, id: impl Into<GuardId>, guard: F)
    where
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        self.guards.insert(id.into(), Arc::new(guard));
    }

    pub fn action(&self, id: &ActionId) -> Option<&Action<C>> {
        self.actions.get(id)
    }

    pub fn guard(&self, id: &GuardId) -> Option<&GuardFn<C>> {
        self.guards.get(id)
    }

    pub fn has_action(&self, id: &ActionId) -> bool {
        self.actions.contains_key(id)
    }

    pub fn has_guard(&self, id: &GuardId) -> bool {
        self.guards.contains_key(id)
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("actions", &self.actions.len())
            .field("guards", &self.guards.len())
            .finish()
    }
}
