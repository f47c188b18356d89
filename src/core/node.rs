//! State nodes and transitions of the immutable machine description.
//!
//! These are plain data: states reference each other and their parents by
//! [`StateId`] only, so the machine can hold them in a flat table without
//! owning back-pointers.

use super::ids::{ActionId, EventId, GuardId, StateId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The kind of a state node.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// Leaf state with no children.
    Atomic,
    /// State with ordered children and a designated initial child.
    Compound,
    /// Terminal leaf; occupancy signals completion.
    Final,
    /// Pseudo-state that redirects entry to the last-occupied descendant
    /// of its parent compound.
    History(HistoryKind),
    /// State whose children are orthogonal regions, all active at once.
    Parallel,
}

/// How a history state remembers previous occupancy.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// Remembers only the immediate child of the parent compound.
    Shallow,
    /// Remembers the full leaf under the parent compound.
    Deep,
}

/// What causes a transition to fire.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when a matching event is dispatched.
    Event(EventId),
    /// Fires after the owning state has been continuously occupied for the
    /// duration.
    After(Duration),
}

/// A single transition: trigger, target, optional guard, ordered actions.
///
/// Transitions on a state are scanned in declaration order; the first one
/// whose trigger matches and whose guard passes wins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transition {
    pub trigger: Trigger,
    pub target: StateId,
    pub guard: Option<GuardId>,
    pub actions: Vec<ActionId>,
}

impl Transition {
    /// An event-triggered transition with no guard or actions.
    pub fn on(event: impl Into<EventId>, target: impl Into<StateId>) -> Self {
        Self {
            trigger: Trigger::Event(event.into()),
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }

    /// A delayed transition with no guard or actions.
    pub fn after(delay: Duration, target: impl Into<StateId>) -> Self {
        Self {
            trigger: Trigger::After(delay),
            target: target.into(),
            guard: None,
            actions: Vec::new(),
        }
    }
}

/// A single state node, immutable once the machine is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateNode {
    pub id: StateId,
    pub kind: StateKind,
    /// Parent state; `None` for root-level states.
    pub parent: Option<StateId>,
    /// Initial child; required for compound states, ignored elsewhere.
    pub initial: Option<StateId>,
    /// Ordered children; meaningful for compound and parallel states.
    pub children: Vec<StateId>,
    pub entry: Vec<ActionId>,
    pub exit: Vec<ActionId>,
    pub transitions: Vec<Transition>,
    /// Fallback target when a history state is entered with no record.
    pub history_default: Option<StateId>,
}

impl StateNode {
    /// A bare node of the given kind with no links or actions.
    pub fn new(id: impl Into<StateId>, kind: StateKind) -> Self {
        Self {
            id: id.into(),
            kind,
            parent: None,
            initial: None,
            children: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            transitions: Vec::new(),
            history_default: None,
        }
    }

    pub fn is_compound(&self) -> bool {
        self.kind == StateKind::Compound
    }

    pub fn is_final(&self) -> bool {
        self.kind == StateKind::Final
    }

    pub fn is_parallel(&self) -> bool {
        self.kind == StateKind::Parallel
    }

    /// The history flavor, if this is a history pseudo-state.
    pub fn history_kind(&self) -> Option<HistoryKind> {
        match self.kind {
            StateKind::History(kind) => Some(kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_has_no_links() {
        let node = StateNode::new("idle", StateKind::Atomic);
        assert_eq!(node.id, "idle");
        assert!(node.parent.is_none());
        assert!(node.children.is_empty());
        assert!(node.transitions.is_empty());
    }

    #[test]
    fn kind_predicates() {
        assert!(StateNode::new("a", StateKind::Compound).is_compound());
        assert!(StateNode::new("b", StateKind::Final).is_final());
        assert!(StateNode::new("c", StateKind::Parallel).is_parallel());
        assert_eq!(
            StateNode::new("d", StateKind::History(HistoryKind::Deep)).history_kind(),
            Some(HistoryKind::Deep)
        );
        assert_eq!(StateNode::new("e", StateKind::Atomic).history_kind(), None);
    }

    #[test]
    fn transition_constructors() {
        let t = Transition::on("GO", "next");
        assert_eq!(t.trigger, Trigger::Event(EventId::from("GO")));
        assert_eq!(t.target, "next");
        assert!(t.guard.is_none());

        let d = Transition::after(Duration::from_millis(50), "timeout");
        assert_eq!(d.trigger, Trigger::After(Duration::from_millis(50)));
    }

    #[test]
    fn node_roundtrip_serialization() {
        let mut node = StateNode::new("active", StateKind::Compound);
        node.initial = Some("idle".into());
        node.children = vec!["idle".into(), "working".into()];
        node.transitions.push(Transition::on("PAUSE", "paused"));

        let json = serde_json::to_string(&node).unwrap();
        let back: StateNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, node.id);
        assert_eq!(back.kind, node.kind);
        assert_eq!(back.children, node.children);
        assert_eq!(back.transitions[0].target, "paused");
    }
}
