//! The statechart interpreter.
//!
//! An [`Interpreter`] owns the runtime state of one machine execution: the
//! current leaf, per-region leaves while inside a parallel state, history
//! records, the user context, and the scheduled timers. Every public
//! operation serializes on one internal lock, so events, context updates,
//! and timer firings never interleave; a whole transition (exits, transition
//! actions, entries) is atomic with respect to other calls on the same
//! interpreter.
//!
//! Runtime conditions never fail: unknown events, calls before `start` or
//! after `stop`, and repeated `start`/`stop` are silent no-ops. The only
//! fallible operation is construction, which re-validates the machine.
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{MachineBuilder, StateBuilder};
//! use statecraft::core::Event;
//! use statecraft::runtime::Interpreter;
//!
//! let machine = MachineBuilder::<()>::new("toggle")
//!     .initial("off")
//!     .state(StateBuilder::atomic("off").on("FLIP", "on"))
//!     .state(StateBuilder::atomic("on").on("FLIP", "off"))
//!     .build()
//!     .unwrap();
//!
//! let interp = Interpreter::new(machine).unwrap();
//! interp.start();
//! assert!(interp.matches("off"));
//! interp.send(Event::new("FLIP"));
//! assert!(interp.matches("on"));
//! interp.stop();
//! ```

mod exec;
mod parallel;

use crate::core::{Event, Machine, StateId, StateKind};
use crate::timer::{ThreadTimers, TimerHandle, TimerService};
use crate::validate::{validate, ValidationError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::debug;

/// Lifecycle of an interpreter instance. `Stopped` is terminal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Phase {
    Unstarted,
    Running,
    Stopped,
}

/// Key for a scheduled delayed transition: owning state and its index in
/// that state's transition list.
pub(crate) type TimerKey = (StateId, usize);

/// Mutable runtime state, guarded by the interpreter lock.
pub(crate) struct Core<C> {
    pub(crate) context: C,
    pub(crate) phase: Phase,
    /// Current leaf, or the parallel state itself while inside one.
    pub(crate) leaf: StateId,
    /// Per-region leaves while inside a parallel state; empty otherwise.
    pub(crate) active_regions: HashMap<StateId, StateId>,
    /// Last immediate child occupied, per compound state.
    pub(crate) shallow_history: HashMap<StateId, StateId>,
    /// Last leaf occupied, per compound state.
    pub(crate) deep_history: HashMap<StateId, StateId>,
    pub(crate) timers: HashMap<TimerKey, TimerHandle>,
    /// Zero-delay transitions queued during entry, fired once the entered
    /// spine's entry actions have all run.
    pub(crate) pending_immediate: Vec<TimerKey>,
}

pub(crate) struct Shared<C> {
    pub(crate) machine: Arc<Machine<C>>,
    pub(crate) timers: Arc<dyn TimerService>,
    pub(crate) weak: Weak<Shared<C>>,
    pub(crate) core: Mutex<Core<C>>,
}

impl<C> Shared<C> {
    pub(crate) fn lock_core(&self) -> MutexGuard<'_, Core<C>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A point-in-time view of the interpreter's position and context.
#[derive(Clone, Debug)]
pub struct StateSnapshot<C> {
    /// Current leaf, or the parallel state id while inside one.
    pub leaf: StateId,
    /// Per-region leaves while inside a parallel state; empty otherwise.
    pub active_regions: HashMap<StateId, StateId>,
    pub context: C,
}

/// The statechart runtime: processes events against one machine.
///
/// Not safe for unserialized concurrent use in the sense that calls from
/// many threads are each atomic but interleave in lock order; for ordering
/// guarantees across calls, serialize externally. Multiple interpreters may
/// share one machine.
pub struct Interpreter<C>
where
    C: Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<C>>,
}

impl<C> Interpreter<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Build an interpreter over a validated machine using thread-backed
    /// timers. Fails with the full issue list if the machine is invalid.
    pub fn new(machine: impl Into<Arc<Machine<C>>>) -> Result<Self, ValidationError> {
        Self::with_timers(machine, Arc::new(ThreadTimers))
    }

    /// Build an interpreter with an injected timer service (deterministic
    /// virtual time in tests, for instance).
    pub fn with_timers(
        machine: impl Into<Arc<Machine<C>>>,
        timers: Arc<dyn TimerService>,
    ) -> Result<Self, ValidationError> {
        let machine = machine.into();
        validate(&machine)?;
        let context = machine.context().clone();
        let shared = Arc::new_cyclic(|weak| Shared {
            machine,
            timers,
            weak: weak.clone(),
            core: Mutex::new(Core {
                context,
                phase: Phase::Unstarted,
                leaf: StateId::default(),
                active_regions: HashMap::new(),
                shallow_history: HashMap::new(),
                deep_history: HashMap::new(),
                timers: HashMap::new(),
                pending_immediate: Vec::new(),
            }),
        });
        Ok(Self { shared })
    }

    /// The machine this interpreter runs.
    pub fn machine(&self) -> &Machine<C> {
        &self.shared.machine
    }

    /// Enter the machine's initial configuration and begin accepting
    /// events. Idempotent after the first call; a stopped interpreter
    /// stays stopped.
    pub fn start(&self) {
        let mut core = self.shared.lock_core();
        self.shared.start_core(&mut core);
    }

    /// Dispatch one event. At most one transition executes (one per region
    /// during a parallel broadcast); an event nothing responds to is
    /// ignored. No-op unless running.
    pub fn send(&self, event: Event) {
        let mut core = self.shared.lock_core();
        if core.phase != Phase::Running {
            return;
        }
        self.shared.dispatch(&mut core, &event);
        self.shared.run_immediate(&mut core);
    }

    /// Snapshot the current leaf, region leaves, and context.
    pub fn state(&self) -> StateSnapshot<C> {
        let core = self.shared.lock_core();
        StateSnapshot {
            leaf: core.leaf.clone(),
            active_regions: core.active_regions.clone(),
            context: core.context.clone(),
        }
    }

    /// True if `id` is the current leaf, an ancestor of it, or the same
    /// for any active region leaf.
    pub fn matches(&self, id: impl Into<StateId>) -> bool {
        let id = id.into();
        let core = self.shared.lock_core();
        self.shared.occupies(&core, &id)
    }

    /// True once the interpreter is running and the leaf is a final state.
    pub fn done(&self) -> bool {
        let core = self.shared.lock_core();
        core.phase == Phase::Running
            && self
                .shared
                .machine
                .state(&core.leaf)
                .is_some_and(|node| node.kind == StateKind::Final)
    }

    /// Mutate the context under the interpreter lock, serialized with
    /// actions and timer callbacks.
    pub fn update_context(&self, f: impl FnOnce(&mut C)) {
        let mut core = self.shared.lock_core();
        f(&mut core.context);
    }

    /// Cancel all timers and retire the interpreter. Terminal: a stopped
    /// interpreter ignores all further events and cannot be restarted.
    pub fn stop(&self) {
        let mut core = self.shared.lock_core();
        if core.phase != Phase::Running {
            return;
        }
        debug!(machine = self.shared.machine.id(), "interpreter stopping");
        core.phase = Phase::Stopped;
        core.timers.clear();
        core.pending_immediate.clear();
    }
}

impl<C> std::fmt::Debug for Interpreter<C>
where
    C: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.shared.lock_core();
        f.debug_struct("Interpreter")
            .field("machine", &self.shared.machine.id())
            .field("phase", &core.phase)
            .field("leaf", &core.leaf)
            .finish_non_exhaustive()
    }
}

impl<C> Shared<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub(crate) fn start_core(&self, core: &mut Core<C>) {
        if core.phase != Phase::Unstarted {
            return;
        }
        core.phase = Phase::Running;
        let initial = self.machine.initial().clone();
        debug!(machine = self.machine.id(), initial = %initial, "interpreter starting");

        let event = Event::empty();
        match self.machine.state(&initial) {
            Some(node) if node.kind == StateKind::Parallel => {
                self.enter_parallel(core, &initial, &event);
            }
            Some(_) => {
                let leaf = self.machine.initial_leaf(&initial);
                let path = self.machine.path(&leaf);
                let from = path.iter().position(|s| s == &initial).unwrap_or(0);
                self.enter_states(core, &path[from..], &leaf, &event);
            }
            // unreachable for validated machines
            None => core.leaf = initial,
        }
        self.run_immediate(core);
    }

    /// Occupancy check: `id` lies on the path of the leaf or of any active
    /// region leaf.
    pub(crate) fn occupies(&self, core: &Core<C>, id: &StateId) -> bool {
        if core.leaf == *id || self.machine.is_descendant(&core.leaf, id) {
            return true;
        }
        core.active_regions
            .values()
            .any(|leaf| leaf == id || self.machine.is_descendant(leaf, id))
    }

    pub(crate) fn region_of(&self, parallel: &StateId, state: &StateId) -> Option<StateId> {
        self.machine
            .state(parallel)?
            .children
            .iter()
            .find(|region| *region == state || self.machine.is_descendant(state, region))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::validate::IssueCode;

    fn toggle() -> Machine<u32> {
        MachineBuilder::<u32>::new("toggle")
            .initial("off")
            .action("bump", |ctx: &mut u32, _e: &Event| *ctx += 1)
            .state(
                StateBuilder::atomic("off")
                    .transition(TransitionBuilder::on("FLIP", "on").action("bump")),
            )
            .state(StateBuilder::atomic("on").on("FLIP", "off"))
            .build()
            .unwrap()
    }

    #[test]
    fn construction_rejects_invalid_machines() {
        let mut machine = Machine::new("bad", "missing", 0u32);
        machine.add_state(crate::core::StateNode::new(
            "idle",
            crate::core::StateKind::Atomic,
        ));
        let err = Interpreter::new(machine).unwrap_err();
        assert!(err.has_code(IssueCode::InitialNotFound));
    }

    #[test]
    fn state_is_empty_before_start() {
        let interp = Interpreter::new(toggle()).unwrap();
        assert!(interp.state().leaf.is_empty());
        assert!(!interp.done());
        assert!(!interp.matches("off"));
    }

    #[test]
    fn send_before_start_is_ignored() {
        let interp = Interpreter::new(toggle()).unwrap();
        interp.send(Event::new("FLIP"));
        assert!(interp.state().leaf.is_empty());
        assert_eq!(interp.state().context, 0);
    }

    #[test]
    fn start_is_idempotent() {
        let machine = MachineBuilder::<u32>::new("m")
            .initial("idle")
            .action("bump", |ctx: &mut u32, _e: &Event| *ctx += 1)
            .state(StateBuilder::atomic("idle").entry("bump"))
            .build()
            .unwrap();

        let interp = Interpreter::new(machine).unwrap();
        interp.start();
        interp.start();
        assert_eq!(interp.state().context, 1);
    }

    #[test]
    fn stop_is_terminal() {
        let interp = Interpreter::new(toggle()).unwrap();
        interp.start();
        interp.stop();
        interp.stop();

        interp.send(Event::new("FLIP"));
        assert_eq!(interp.state().leaf, "off");
        assert_eq!(interp.state().context, 0);

        // a stopped interpreter cannot be restarted
        interp.start();
        interp.send(Event::new("FLIP"));
        assert_eq!(interp.state().leaf, "off");
    }

    #[test]
    fn update_context_is_applied() {
        let interp = Interpreter::new(toggle()).unwrap();
        interp.start();
        interp.update_context(|ctx| *ctx = 42);
        assert_eq!(interp.state().context, 42);
    }

    #[test]
    fn snapshot_reflects_leaf_and_context() {
        let interp = Interpreter::new(toggle()).unwrap();
        interp.start();
        interp.send(Event::new("FLIP"));

        let snapshot = interp.state();
        assert_eq!(snapshot.leaf, "on");
        assert_eq!(snapshot.context, 1);
        assert!(snapshot.active_regions.is_empty());
    }

    #[test]
    fn unknown_event_changes_nothing() {
        let interp = Interpreter::new(toggle()).unwrap();
        interp.start();
        interp.send(Event::new("UNKNOWN"));
        assert_eq!(interp.state().leaf, "off");
        assert_eq!(interp.state().context, 0);
    }

    #[test]
    fn machines_are_shareable_across_interpreters() {
        let machine = Arc::new(toggle());
        let a = Interpreter::new(machine.clone()).unwrap();
        let b = Interpreter::new(machine).unwrap();
        a.start();
        b.start();
        a.send(Event::new("FLIP"));
        assert_eq!(a.state().leaf, "on");
        assert_eq!(b.state().leaf, "off");
    }
}
