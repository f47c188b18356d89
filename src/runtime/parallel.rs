//! Parallel state entry, exit, and region-scoped transitions.
//!
//! While a parallel state is active the interpreter's leaf is the parallel
//! state itself and each region tracks its own leaf. Regions are entered,
//! broadcast to, and exited in declaration order; a region's transitions
//! are resolved within its own subtree and never escape it.

use super::{Core, Shared};
use crate::core::{Event, StateId};
use tracing::{debug, trace};

impl<C> Shared<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Enter a parallel state: its own entry actions and timers first,
    /// then each region down to its initial leaf, in declaration order.
    pub(crate) fn enter_parallel(&self, core: &mut Core<C>, parallel: &StateId, event: &Event) {
        let Some(node) = self.machine.state(parallel) else {
            return;
        };
        debug!(parallel = %parallel, "entering parallel state");
        self.run_actions(core, &node.entry, event);
        self.schedule_after(core, parallel);

        for region in &node.children {
            let leaf = self.machine.initial_leaf(region);
            let path = self.machine.path(&leaf);
            let from = path.iter().position(|s| s == region).unwrap_or(0);
            for id in &path[from..] {
                if let Some(state) = self.machine.state(id) {
                    self.run_actions(core, &state.entry, event);
                    self.schedule_after(core, id);
                }
            }
            core.active_regions.insert(region.clone(), leaf);
        }
        core.leaf = parallel.clone();
    }

    /// Tear down every region of an active parallel state: each region
    /// exits from its leaf up to and including the region root, in
    /// declaration order. The parallel state itself exits afterwards as
    /// part of the ordinary exit walk.
    pub(crate) fn exit_regions(&self, core: &mut Core<C>, parallel: &StateId, event: &Event) {
        let Some(node) = self.machine.state(parallel) else {
            return;
        };
        for region in &node.children {
            let from = match core.active_regions.get(region) {
                Some(from) => from.clone(),
                None => continue,
            };
            let mut current = from.clone();
            loop {
                self.exit_state(core, &current, &from, event);
                if current == *region {
                    break;
                }
                match self.machine.parent(&current) {
                    Some(parent) => current = parent.clone(),
                    None => break,
                }
            }
        }
        core.active_regions.clear();
    }

    /// Execute a transition owned by a state inside a region, with exit
    /// and entry sets clipped to the region's subtree. A resolved target
    /// outside the region is ignored: regions cannot escape themselves.
    pub(crate) fn execute_in_region(
        &self,
        core: &mut Core<C>,
        region: &StateId,
        source: &StateId,
        index: usize,
        event: &Event,
    ) {
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
        if resolved != *region && !self.machine.is_descendant(&resolved, region) {
            return;
        }
        let from = match core.active_regions.get(region) {
            Some(from) => from.clone(),
            None => return,
        };

        trace!(region = %region, source = %source, target = %resolved, "region transition");

        let lca = if written == *source {
            self.machine.parent(source).cloned()
        } else {
            self.machine.lca(source, &resolved)
        };

        // exit clipped at the region root
        let mut current = from.clone();
        loop {
            if Some(&current) == lca.as_ref() {
                break;
            }
            self.exit_state(core, &current, &from, event);
            if current == *region {
                break;
            }
            match self.machine.parent(&current) {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }

        self.run_actions(core, &transition.actions, event);

        // entry below the LCA, clipped to the region subtree
        let path = self.machine.path(&resolved);
        let start = match &lca {
            None => 0,
            Some(l) => path
                .iter()
                .position(|s| s == l)
                .map(|i| i + 1)
                .unwrap_or(0),
        };
        for id in &path[start..] {
            if *id != *region && !self.machine.is_descendant(id, region) {
                continue;
            }
            if let Some(state) = self.machine.state(id) {
                self.run_actions(core, &state.entry, event);
                self.schedule_after(core, id);
            }
        }

        core.active_regions.insert(region.clone(), resolved);
    }
}
