//! The immutable machine description and its structural queries.
//!
//! States live in a flat table keyed by id; parent/child links are ids, not
//! references, so the table has no ownership cycles. All queries are total:
//! unknown ids yield empty or identity results rather than panics.

use super::ids::StateId;
use super::node::{StateKind, StateNode};
use super::registry::Registry;
use std::collections::HashMap;

/// A complete, immutable statechart description.
///
/// `C` is the user-defined context type carried by interpreters of this
/// machine; the engine never inspects it. A machine is assembled by the
/// builder (or by populating the table directly) and checked once by
/// [`crate::validate::validate`].
#[derive(Debug)]
pub struct Machine<C> {
    id: String,
    initial: StateId,
    context: C,
    states: HashMap<StateId, StateNode>,
    registry: Registry<C>,
}

impl<C> Machine<C> {
    /// A machine with the given id, initial state, and starting context,
    /// ready to be populated.
    pub fn new(id: impl Into<String>, initial: impl Into<StateId>, context: C) -> Self {
        Self {
            id: id.into(),
            initial: initial.into(),
            context,
            states: HashMap::new(),
            registry: Registry::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn initial(&self) -> &StateId {
        &self.initial
    }

    /// The starting context value handed to each new interpreter.
    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn states(&self) -> &HashMap<StateId, StateNode> {
        &self.states
    }

    pub fn state(&self, id: &StateId) -> Option<&StateNode> {
        self.states.get(id)
    }

    /// Insert a state node, replacing any node with the same id.
    pub fn add_state(&mut self, node: StateNode) {
        self.states.insert(node.id.clone(), node);
    }

    pub fn registry(&self) -> &Registry<C> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<C> {
        &mut self.registry
    }

    /// Parent of a state, if it has one.
    pub fn parent(&self, id: &StateId) -> Option<&StateId> {
        self.states.get(id)?.parent.as_ref()
    }

    /// Ancestors from immediate parent up to the root, leaf-first.
    pub fn ancestors(&self, id: &StateId) -> Vec<StateId> {
        let mut ancestors = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            // a malformed parent cycle would spin forever; bail once the
            // chain exceeds the state count
            if ancestors.len() > self.states.len() {
                break;
            }
            ancestors.push(parent.clone());
            current = parent;
        }
        ancestors
    }

    /// Full path from the root down to (and including) the state.
    pub fn path(&self, id: &StateId) -> Vec<StateId> {
        let mut path = self.ancestors(id);
        path.reverse();
        path.push(id.clone());
        path
    }

    /// Resolve a state to the leaf reached by following `initial` children.
    ///
    /// Compound states recurse through their initial child; every other
    /// kind (atomic, final, history, parallel) resolves to itself.
    pub fn initial_leaf(&self, id: &StateId) -> StateId {
        let mut current = id.clone();
        let mut hops = 0;
        while let Some(node) = self.states.get(&current) {
            if hops > self.states.len() {
                break;
            }
            match (&node.kind, &node.initial) {
                (StateKind::Compound, Some(next)) => {
                    current = next.clone();
                    hops += 1;
                }
                _ => break,
            }
        }
        current
    }

    /// True if `id` has `ancestor` somewhere above it.
    pub fn is_descendant(&self, id: &StateId, ancestor: &StateId) -> bool {
        self.ancestors(id).contains(ancestor)
    }

    /// Lowest common ancestor: the deepest state on both paths.
    ///
    /// `None` means the paths share no prefix — the common ancestor is
    /// "above the root", as for transitions between root-level siblings.
    pub fn lca(&self, a: &StateId, b: &StateId) -> Option<StateId> {
        let path_a = self.path(a);
        let path_b = self.path(b);
        path_a
            .iter()
            .zip(path_b.iter())
            .take_while(|(x, y)| x == y)
            .last()
            .map(|(x, _)| x.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::StateKind;

    /// active ── idle
    ///        └─ working ── loading
    ///                   └─ processing
    /// done
    fn sample_machine() -> Machine<()> {
        let mut machine = Machine::new("test", "active", ());

        let mut active = StateNode::new("active", StateKind::Compound);
        active.initial = Some("idle".into());
        active.children = vec!["idle".into(), "working".into()];
        machine.add_state(active);

        let mut idle = StateNode::new("idle", StateKind::Atomic);
        idle.parent = Some("active".into());
        machine.add_state(idle);

        let mut working = StateNode::new("working", StateKind::Compound);
        working.parent = Some("active".into());
        working.initial = Some("loading".into());
        working.children = vec!["loading".into(), "processing".into()];
        machine.add_state(working);

        for id in ["loading", "processing"] {
            let mut node = StateNode::new(id, StateKind::Atomic);
            node.parent = Some("working".into());
            machine.add_state(node);
        }

        machine.add_state(StateNode::new("done", StateKind::Final));
        machine
    }

    #[test]
    fn ancestors_are_leaf_first() {
        let machine = sample_machine();
        let ancestors = machine.ancestors(&"loading".into());
        assert_eq!(ancestors, vec![StateId::from("working"), "active".into()]);
        assert!(machine.ancestors(&"active".into()).is_empty());
        assert!(machine.ancestors(&"missing".into()).is_empty());
    }

    #[test]
    fn path_is_root_first_and_inclusive() {
        let machine = sample_machine();
        let path = machine.path(&"loading".into());
        assert_eq!(
            path,
            vec![
                StateId::from("active"),
                "working".into(),
                "loading".into()
            ]
        );
        assert_eq!(machine.path(&"done".into()), vec![StateId::from("done")]);
    }

    #[test]
    fn initial_leaf_follows_compound_chain() {
        let machine = sample_machine();
        assert_eq!(machine.initial_leaf(&"active".into()), "idle");
        assert_eq!(machine.initial_leaf(&"working".into()), "loading");
        assert_eq!(machine.initial_leaf(&"idle".into()), "idle");
        assert_eq!(machine.initial_leaf(&"done".into()), "done");
        // unknown ids resolve to themselves
        assert_eq!(machine.initial_leaf(&"missing".into()), "missing");
    }

    #[test]
    fn initial_leaf_terminates_on_cyclic_initials() {
        let mut machine = Machine::new("cyclic", "a", ());
        let mut a = StateNode::new("a", StateKind::Compound);
        a.initial = Some("b".into());
        a.children = vec!["b".into()];
        let mut b = StateNode::new("b", StateKind::Compound);
        b.initial = Some("a".into());
        b.children = vec!["a".into()];
        machine.add_state(a);
        machine.add_state(b);

        // not a valid machine, but the query must still return
        let _ = machine.initial_leaf(&"a".into());
    }

    #[test]
    fn is_descendant_checks_ancestry() {
        let machine = sample_machine();
        assert!(machine.is_descendant(&"loading".into(), &"working".into()));
        assert!(machine.is_descendant(&"loading".into(), &"active".into()));
        assert!(!machine.is_descendant(&"loading".into(), &"done".into()));
        assert!(!machine.is_descendant(&"active".into(), &"loading".into()));
        // a state is not its own descendant
        assert!(!machine.is_descendant(&"idle".into(), &"idle".into()));
    }

    #[test]
    fn lca_finds_deepest_shared_state() {
        let machine = sample_machine();
        assert_eq!(
            machine.lca(&"loading".into(), &"processing".into()),
            Some("working".into())
        );
        assert_eq!(
            machine.lca(&"loading".into(), &"idle".into()),
            Some("active".into())
        );
        assert_eq!(
            machine.lca(&"loading".into(), &"working".into()),
            Some("working".into())
        );
        // root-level siblings share nothing
        assert_eq!(machine.lca(&"active".into(), &"done".into()), None);
        assert_eq!(machine.lca(&"loading".into(), &"done".into()), None);
    }

    #[test]
    fn lca_of_state_with_itself() {
        let machine = sample_machine();
        assert_eq!(
            machine.lca(&"loading".into(), &"loading".into()),
            Some("loading".into())
        );
    }
}
