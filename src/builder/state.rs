//! Builder for individual states and their nested children.

use super::transition::TransitionBuilder;
use crate::core::{
    ActionId, EventId, HistoryKind, StateId, StateKind, StateNode, Transition,
};
use std::collections::HashMap;
use std::time::Duration;

/// Builder for one state node, carrying its nested children.
///
/// States are composed by value: child builders are moved into their parent
/// with [`StateBuilder::child`], and the whole tree is flattened when the
/// machine builds.
pub struct StateBuilder {
    id: StateId,
    kind: StateKind,
    initial: Option<StateId>,
    history_default: Option<StateId>,
    entry: Vec<ActionId>,
    exit: Vec<ActionId>,
    transitions: Vec<Transition>,
    children: Vec<StateBuilder>,
}

impl StateBuilder {
    fn with_kind(id: impl Into<StateId>, kind: StateKind) -> Self {
        Self {
            id: id.into(),
            kind,
            initial: None,
            history_default: None,
            entry: Vec::new(),
            exit: Vec::new(),
            transitions: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A leaf state.
    pub fn atomic(id: impl Into<StateId>) -> Self {
        Self::with_kind(id, StateKind::Atomic)
    }

    /// A compound state with the given initial child.
    pub fn compound(id: impl Into<StateId>, initial: impl Into<StateId>) -> Self {
        let mut builder = Self::with_kind(id, StateKind::Compound);
        builder.initial = Some(initial.into());
        builder
    }

    /// A terminal state; occupancy makes the interpreter report done.
    pub fn final_state(id: impl Into<StateId>) -> Self {
        Self::with_kind(id, StateKind::Final)
    }

    /// A parallel state whose children are orthogonal regions.
    pub fn parallel(id: impl Into<StateId>) -> Self {
        Self::with_kind(id, StateKind::Parallel)
    }

    /// A shallow history pseudo-state with a fallback target.
    pub fn shallow_history(id: impl Into<StateId>, default: impl Into<StateId>) -> Self {
        let mut builder = Self::with_kind(id, StateKind::History(HistoryKind::Shallow));
        builder.history_default = Some(default.into());
        builder
    }

    /// A deep history pseudo-state with a fallback target.
    pub fn deep_history(id: impl Into<StateId>, default: impl Into<StateId>) -> Self {
        let mut builder = Self::with_kind(id, StateKind::History(HistoryKind::Deep));
        builder.history_default = Some(default.into());
        builder
    }

    /// Append a named entry action.
    pub fn entry(mut self, action: impl Into<ActionId>) -> Self {
        self.entry.push(action.into());
        self
    }

    /// Append a named exit action.
    pub fn exit(mut self, action: impl Into<ActionId>) -> Self {
        self.exit.push(action.into());
        self
    }

    /// Append a plain event transition with no guard or actions.
    pub fn on(mut self, event: impl Into<EventId>, target: impl Into<StateId>) -> Self {
        self.transitions.push(Transition::on(event, target));
        self
    }

    /// Append a plain delayed transition with no guard or actions.
    pub fn after(mut self, delay: Duration, target: impl Into<StateId>) -> Self {
        self.transitions.push(Transition::after(delay, target));
        self
    }

    /// Append a transition assembled with [`TransitionBuilder`].
    pub fn transition(mut self, builder: TransitionBuilder) -> Self {
        self.transitions.push(builder.build());
        self
    }

    /// Nest a child state (or region, for parallel states).
    pub fn child(mut self, child: StateBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Flatten this builder and its descendants into the state table.
    pub(crate) fn flatten(self, parent: Option<StateId>, table: &mut HashMap<StateId, StateNode>) {
        // an atomic state that was given children is really a compound
        let kind = if self.kind == StateKind::Atomic && !self.children.is_empty() {
            StateKind::Compound
        } else {
            self.kind
        };

        let mut node = StateNode::new(self.id.clone(), kind);
        node.parent = parent;
        node.initial = self.initial;
        node.history_default = self.history_default;
        node.entry = self.entry;
        node.exit = self.exit;
        node.transitions = self.transitions;
        node.children = self.children.iter().map(|c| c.id.clone()).collect();
        table.insert(self.id.clone(), node);

        for child in self.children {
            child.flatten(Some(self.id.clone()), table);
        }
    }
}
