//! Builder for constructing state transitions.

use crate::core::{ActionId, EventId, GuardId, StateId, Transition, Trigger};
use std::time::Duration;

/// Builder for a single transition with a fluent API.
pub struct TransitionBuilder {
    trigger: Trigger,
    target: StateId,
    guard: Option<GuardId>,
    actions: Vec<ActionId>,
}

impl TransitionBuilder {
    /// A transition triggered by an event.
    pub fn on(event: impl Into<EventId>, target: impl Into<StateId>) -> Self {
        Self {
            trigger: Trigger::Event(event.into()),
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// A transition that fires after the owning state has been occupied
    /// for the duration.
    pub fn after(delay: Duration, target: impl Into<StateId>) -> Self {
        Self {
            trigger: Trigger::After(delay),
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Gate the transition on a named guard.
    pub fn guard(mut self, guard: impl Into<GuardId>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    /// Append a named action to run as part of the transition.
    pub fn action(mut self, action: impl Into<ActionId>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub(crate) fn build(self) -> Transition {
        Transition {
            trigger: self.trigger,
            target: self.target,
            guard: self.guard,
            actions: self.actions,
        }
    }
}
