//! Builder for constructing state machines.

use super::state::StateBuilder;
use crate::core::{Event, Machine, StateId, StateNode};
use crate::validate::{validate, ValidationError};
use std::collections::HashMap;

/// Builder for a whole machine with a fluent API.
///
/// `build` flattens the nested state tree, attaches the registered actions
/// and guards, and validates the result; an invalid machine comes back as
/// the full list of structural issues.
pub struct MachineBuilder<C> {
    id: String,
    initial: Option<StateId>,
    context: C,
    states: Vec<StateBuilder>,
    registry: crate::core::Registry<C>,
}

impl<C: Default> MachineBuilder<C> {
    /// Start a machine whose context begins at `C::default()`.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_context(id, C::default())
    }
}

impl<C> MachineBuilder<C> {
    /// Start a machine with an explicit starting context.
    pub fn with_context(id: impl Into<String>, context: C) -> Self {
        Self {
            id: id.into(),
            initial: None,
            context,
            states: Vec::new(),
            registry: crate::core::Registry::new(),
        }
    }

    /// Set the initial state id (required).
    pub fn initial(mut self, initial: impl Into<StateId>) -> Self {
        self.initial = Some(initial.into());
        self
    }

    /// Replace the starting context value.
    pub fn context(mut self, context: C) -> Self {
        self.context = context;
        self
    }

    /// Register a named action.
    pub fn action<F>(mut self, name: impl Into<crate::core::ActionId>, action: F) -> Self
    where
        F: Fn(&mut C, &Event) + Send + Sync + 'static,
    {
        self.registry.register_action(name, action);
        self
    }

    /// Register a named guard.
    pub fn guard<F>(mut self, name: impl Into<crate::core::GuardId>, guard: F) -> Self
    where
        F: Fn(&C, &Event) -> bool + Send + Sync + 'static,
    {
        self.registry.register_guard(name, guard);
        self
    }

    /// Add a root-level state (and everything nested inside it).
    pub fn state(mut self, state: StateBuilder) -> Self {
        self.states.push(state);
        self
    }

    /// Flatten, assemble, and validate the machine.
    pub fn build(self) -> Result<Machine<C>, ValidationError> {
        let mut table: HashMap<StateId, StateNode> = HashMap::new();
        for state in self.states {
            state.flatten(None, &mut table);
        }

        let initial = self.initial.unwrap_or_default();
        let mut machine = Machine::new(self.id, initial, self.context);
        for (_, node) in table {
            machine.add_state(node);
        }
        *machine.registry_mut() = self.registry;

        validate(&machine)?;
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StateKind;
    use crate::validate::IssueCode;

    #[test]
    fn fluent_api_builds_machine() {
        let machine = MachineBuilder::<u32>::new("counter")
            .initial("idle")
            .context(5)
            .action("inc", |ctx: &mut u32, _e: &Event| *ctx += 1)
            .state(StateBuilder::atomic("idle").on("START", "running"))
            .state(StateBuilder::atomic("running"))
            .build()
            .unwrap();

        assert_eq!(machine.id(), "counter");
        assert_eq!(machine.initial().as_str(), "idle");
        assert_eq!(*machine.context(), 5);
        assert_eq!(machine.states().len(), 2);
    }

    #[test]
    fn nested_states_are_wired() {
        let machine = MachineBuilder::<()>::new("nested")
            .initial("active")
            .state(
                StateBuilder::compound("active", "idle")
                    .child(StateBuilder::atomic("idle").on("START", "working"))
                    .child(StateBuilder::atomic("working").on("STOP", "idle")),
            )
            .build()
            .unwrap();

        let active = machine.state(&"active".into()).unwrap();
        assert_eq!(active.kind, StateKind::Compound);
        let idle = machine.state(&"idle".into()).unwrap();
        assert_eq!(idle.parent, Some("active".into()));
    }

    #[test]
    fn build_without_initial_fails_validation() {
        let err = MachineBuilder::<()>::new("bad")
            .state(StateBuilder::atomic("idle"))
            .build()
            .unwrap_err();
        assert!(err.has_code(IssueCode::MissingInitial));
    }

    #[test]
    fn build_surfaces_every_issue() {
        let err = MachineBuilder::<()>::new("bad")
            .initial("idle")
            .state(
                StateBuilder::atomic("idle")
                    .entry("ghost")
                    .on("GO", "nowhere"),
            )
            .build()
            .unwrap_err();

        assert!(err.has_code(IssueCode::MissingAction));
        assert!(err.has_code(IssueCode::InvalidTarget));
    }

    #[test]
    fn guards_and_actions_land_in_registry() {
        let machine = MachineBuilder::<u32>::new("m")
            .initial("idle")
            .action("bump", |ctx: &mut u32, _e: &Event| *ctx += 1)
            .guard("ready", |ctx: &u32, _e: &Event| *ctx > 0)
            .state(StateBuilder::atomic("idle"))
            .build()
            .unwrap();

        assert!(machine.registry().has_action(&"bump".into()));
        assert!(machine.registry().has_guard(&"ready".into()));
    }
}
