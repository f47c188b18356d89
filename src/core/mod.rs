//! The immutable intermediate representation of a statechart.
//!
//! This module defines the vocabulary shared by the authoring layer, the
//! validator, the interpreter, and the exporter:
//! - Identifier newtypes and the runtime [`Event`]
//! - [`StateNode`] / [`Transition`] data with kind tags
//! - The [`Machine`] table and its structural queries
//! - The [`Registry`] mapping action and guard names to functions
//!
//! Everything here is immutable after build and freely shareable across
//! interpreters.

mod ids;
mod machine;
mod node;
mod registry;

pub use ids::{ActionId, Event, EventId, GuardId, StateId};
pub use machine::Machine;
pub use node::{HistoryKind, StateKind, StateNode, Transition, Trigger};
pub use registry::{Action, GuardFn, Registry};
