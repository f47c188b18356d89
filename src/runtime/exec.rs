//! Transition resolution and execution.
//!
//! The choreography for a single transition is fixed: exit set leaf-to-root
//! up to (not including) the LCA, then the transition's own actions, then
//! the entry set root-to-leaf below the LCA. History is recorded as states
//! exit, before the target is entered. Timers are cancelled per exited
//! state and scheduled per entered state.

use super::{Core, Phase, Shared};
use crate::core::{ActionId, Event, GuardId, HistoryKind, StateId, StateKind, Trigger};
use std::collections::HashSet;
use tracing::{debug, trace};

impl<C> Shared<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Resolve and execute at most one transition for an external event.
    pub(crate) fn dispatch(&self, core: &mut Core<C>, event: &Event) {
        let leaf = core.leaf.clone();
        let leaf_is_parallel = self
            .machine
            .state(&leaf)
            .is_some_and(|node| node.kind == StateKind::Parallel);

        if !leaf_is_parallel {
            if let Some((source, index)) = self.find_transition(core, &leaf, event, None) {
                self.execute(core, &source, index, event);
            }
            return;
        }

        // the parallel state and its ancestors win over the regions
        if let Some((source, index)) = self.find_transition(core, &leaf, event, None) {
            self.execute(core, &source, index, event);
            return;
        }

        // broadcast: each region resolves independently, in declaration
        // order, and sees the context mutations of earlier regions
        let regions = match self.machine.state(&leaf) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for region in &regions {
            let from = match core.active_regions.get(region) {
                Some(from) => from.clone(),
                None => continue,
            };
            if let Some((source, index)) = self.find_transition(core, &from, event, Some(region)) {
                self.execute_in_region(core, region, &source, index, event);
            }
        }
    }

    /// Walk from `start` toward the root looking for the first transition
    /// whose event matches and whose guard passes. A failing guard keeps
    /// scanning the same state's remaining transitions. `boundary` stops
    /// the walk after that state (regions never bubble past themselves).
    pub(crate) fn find_transition(
        &self,
        core: &Core<C>,
        start: &StateId,
        event: &Event,
        boundary: Option<&StateId>,
    ) -> Option<(StateId, usize)> {
        let mut current = start.clone();
        loop {
            let node = self.machine.state(&current)?;
            for (index, transition) in node.transitions.iter().enumerate() {
                let Trigger::Event(ref expected) = transition.trigger else {
                    continue;
                };
                if expected != event.id() {
                    continue;
                }
                if self.guard_passes(core, transition.guard.as_ref(), event) {
                    return Some((current, index));
                }
            }
            if boundary == Some(&current) {
                return None;
            }
            current = node.parent.clone()?;
        }
    }

    /// A missing guard id suppresses the transition; no guard permits it.
    pub(crate) fn guard_passes(
        &self,
        core: &Core<C>,
        guard: Option<&GuardId>,
        event: &Event,
    ) -> bool {
        match guard {
            None => true,
            Some(id) => match self.machine.registry().guard(id) {
                Some(predicate) => predicate(&core.context, event),
                None => false,
            },
        }
    }

    /// Execute the transition at `source.transitions[index]` from the
    /// current configuration.
    pub(crate) fn execute(&self, core: &mut Core<C>, source: &StateId, index: usize, event: &Event) {
        let Some(node) = self.machine.state(source) else {
            return;
        };
        let Some(transition) = node.transitions.get(index) else {
            return;
        };
        let written = transition.target.clone();
        let Some(resolved) = self.resolve_target(core, &written) else {
            return;
        };

        trace!(source = %source, target = %resolved, event = %event.id(), "transition");

        let start_leaf = core.leaf.clone();

        // leaving a parallel configuration tears down every region before
        // the parallel state itself exits
        if self
            .machine
            .state(&start_leaf)
            .is_some_and(|n| n.kind == StateKind::Parallel)
        {
            self.exit_regions(core, &start_leaf, event);
        }

        // written target == source is an external self-transition: the
        // source exits and re-enters, so the boundary is its parent
        let lca = if written == *source {
            self.machine.parent(source).cloned()
        } else {
            self.machine.lca(source, &resolved)
        };

        self.exit_upward(core, &start_leaf, lca.as_ref(), event);
        self.run_actions(core, &transition.actions, event);
        self.enter_below(core, &resolved, lca.as_ref(), event);
    }

    /// Resolve a written target to the state actually entered: history
    /// states resolve through the recorded maps (falling back to their
    /// default), parallel states stay as written, anything else follows
    /// `initial` children to a leaf.
    pub(crate) fn resolve_target(&self, core: &Core<C>, written: &StateId) -> Option<StateId> {
        let node = self.machine.state(written)?;
        match node.kind {
            StateKind::History(kind) => {
                let parent = node.parent.as_ref()?;
                let fallback = || {
                    node.history_default
                        .as_ref()
                        .map(|default| self.machine.initial_leaf(default))
                };
                match kind {
                    HistoryKind::Deep => core.deep_history.get(parent).cloned().or_else(fallback),
                    HistoryKind::Shallow => core
                        .shallow_history
                        .get(parent)
                        .map(|child| self.machine.initial_leaf(child))
                        .or_else(fallback),
                }
            }
            StateKind::Parallel => Some(written.clone()),
            _ => Some(self.machine.initial_leaf(written)),
        }
    }

    /// Exit states from `from_leaf` up to (not including) the LCA, in
    /// leaf-to-root order. `None` exits everything up to the root.
    pub(crate) fn exit_upward(
        &self,
        core: &mut Core<C>,
        from_leaf: &StateId,
        lca: Option<&StateId>,
        event: &Event,
    ) {
        let mut current = from_leaf.clone();
        loop {
            if Some(&current) == lca {
                break;
            }
            self.exit_state(core, &current, from_leaf, event);
            match self.machine.parent(&current) {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
    }

    /// Exit one state: cancel its timers, run its exit actions, record
    /// history on its compound parent.
    pub(crate) fn exit_state(
        &self,
        core: &mut Core<C>,
        id: &StateId,
        from_leaf: &StateId,
        event: &Event,
    ) {
        self.cancel_timers(core, id);
        if let Some(node) = self.machine.state(id) {
            self.run_actions(core, &node.exit, event);
        }
        self.record_history(core, id, from_leaf);
    }

    /// Every exit updates the compound parent's history, whether or not
    /// the parent itself exits in this transition.
    fn record_history(&self, core: &mut Core<C>, exited: &StateId, from_leaf: &StateId) {
        let Some(parent) = self.machine.parent(exited) else {
            return;
        };
        let parent_is_compound = self
            .machine
            .state(parent)
            .is_some_and(|node| node.kind == StateKind::Compound);
        if !parent_is_compound {
            return;
        }
        core.shallow_history.insert(parent.clone(), exited.clone());
        core.deep_history.insert(parent.clone(), from_leaf.clone());
    }

    /// Enter states on `path(resolved)` strictly below the LCA, root-to-leaf.
    /// A parallel state on the spine takes over entry and becomes the leaf.
    fn enter_below(
        &self,
        core: &mut Core<C>,
        resolved: &StateId,
        lca: Option<&StateId>,
        event: &Event,
    ) {
        let path = self.machine.path(resolved);
        let from = match lca {
            None => 0,
            Some(l) => path
                .iter()
                .position(|s| s == l)
                .map(|i| i + 1)
                .unwrap_or(0),
        };
        self.enter_states(core, &path[from..], resolved, event);
    }

    /// Enter each state in order: entry actions, then its delayed
    /// transitions are scheduled. Sets the leaf when the spine completes.
    pub(crate) fn enter_states(
        &self,
        core: &mut Core<C>,
        states: &[StateId],
        final_leaf: &StateId,
        event: &Event,
    ) {
        for id in states {
            let Some(node) = self.machine.state(id) else {
                continue;
            };
            if node.kind == StateKind::Parallel {
                self.enter_parallel(core, id, event);
                return;
            }
            self.run_actions(core, &node.entry, event);
            self.schedule_after(core, id);
        }
        core.leaf = final_leaf.clone();
    }

    /// Run a list of named actions in order. Missing names are skipped.
    pub(crate) fn run_actions(&self, core: &mut Core<C>, actions: &[ActionId], event: &Event) {
        for id in actions {
            if let Some(action) = self.machine.registry().action(id) {
                action(&mut core.context, event);
            }
        }
    }

    /// Schedule the `After` transitions of a freshly entered state.
    /// Zero delays queue for the immediate cascade instead of a timer.
    pub(crate) fn schedule_after(&self, core: &mut Core<C>, state: &StateId) {
        let Some(node) = self.machine.state(state) else {
            return;
        };
        for (index, transition) in node.transitions.iter().enumerate() {
            let Trigger::After(delay) = transition.trigger else {
                continue;
            };
            let key = (state.clone(), index);
            if delay.is_zero() {
                core.pending_immediate.push(key);
                continue;
            }
            let weak = self.weak.clone();
            let fire_key = key.clone();
            let handle = self.timers.schedule(
                delay,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.on_timer_fire(&fire_key.0, fire_key.1);
                    }
                }),
            );
            core.timers.insert(key, handle);
        }
    }

    /// Drop (and thereby cancel) every timer owned by a state, along with
    /// its queued zero-delay firings.
    pub(crate) fn cancel_timers(&self, core: &mut Core<C>, state: &StateId) {
        core.timers.retain(|(owner, _), _| owner != state);
        core.pending_immediate.retain(|(owner, _)| owner != state);
    }

    /// Timer callback: serialize with user operations, then re-check that
    /// the owning state is still occupied before firing. Cancellation is
    /// best-effort, so a timer can race past its cancel into this lock.
    pub(crate) fn on_timer_fire(&self, state: &StateId, index: usize) {
        let mut core = self.lock_core();
        core.timers.remove(&(state.clone(), index));
        if core.phase != Phase::Running {
            return;
        }
        if !self.occupies(&core, state) {
            return;
        }
        debug!(state = %state, "delayed transition firing");
        self.fire_scheduled(&mut core, state, index);
        self.run_immediate(&mut core);
    }

    /// Fire one scheduled (delayed or zero-delay) transition with the
    /// empty event, routing through region machinery when the owner lives
    /// inside an active region.
    fn fire_scheduled(&self, core: &mut Core<C>, state: &StateId, index: usize) {
        let event = Event::empty();
        let Some(node) = self.machine.state(state) else {
            return;
        };
        let Some(transition) = node.transitions.get(index) else {
            return;
        };
        if !self.guard_passes(core, transition.guard.as_ref(), &event) {
            return;
        }

        let leaf = core.leaf.clone();
        let leaf_is_parallel = self
            .machine
            .state(&leaf)
            .is_some_and(|n| n.kind == StateKind::Parallel);
        if leaf_is_parallel && *state != leaf && !self.machine.is_descendant(&leaf, state) {
            if let Some(region) = self.region_of(&leaf, state) {
                self.execute_in_region(core, &region, state, index, &event);
            }
            return;
        }
        self.execute(core, state, index, &event);
    }

    /// Fire queued zero-delay transitions until none remain. Entries are
    /// processed in scheduling order (root-most entered state first); a
    /// repeated entry within one cascade is dropped so immediate cycles
    /// cannot spin.
    pub(crate) fn run_immediate(&self, core: &mut Core<C>) {
        let mut fired: HashSet<(StateId, usize)> = HashSet::new();
        while core.phase == Phase::Running && !core.pending_immediate.is_empty() {
            let key = core.pending_immediate.remove(0);
            if !self.occupies(core, &key.0) {
                continue;
            }
            if !fired.insert(key.clone()) {
                continue;
            }
            self.fire_scheduled(core, &key.0, key.1);
        }
    }
}
