//! Statecraft: a hierarchical statechart interpreter.
//!
//! Describe an event-driven state machine — compound states, parallel
//! regions, shallow and deep history, guarded transitions, entry/exit
//! actions, delayed transitions — and execute it deterministically against
//! a stream of events while it maintains a user-defined context value.
//!
//! # Core Concepts
//!
//! - **Machine**: the immutable description, built fluently and validated
//!   once ([`builder`], [`validate`])
//! - **Interpreter**: the runtime that starts, receives events, fires
//!   timers, and tracks history ([`runtime`])
//! - **Context**: a user-chosen value; actions mutate it, guards read it
//! - **Export**: a read-only XState JSON projection for visualization
//!   ([`export`])
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use statecraft::core::Event;
//! use statecraft::runtime::Interpreter;
//!
//! #[derive(Clone, Default)]
//! struct Order {
//!     items: u32,
//! }
//!
//! let machine = MachineBuilder::<Order>::new("order")
//!     .initial("cart")
//!     .action("addItem", |order: &mut Order, _e: &Event| order.items += 1)
//!     .guard("hasItems", |order: &Order, _e: &Event| order.items > 0)
//!     .state(
//!         StateBuilder::atomic("cart")
//!             .transition(TransitionBuilder::on("ADD", "cart").action("addItem"))
//!             .transition(TransitionBuilder::on("CHECKOUT", "paid").guard("hasItems")),
//!     )
//!     .state(StateBuilder::final_state("paid"))
//!     .build()
//!     .unwrap();
//!
//! let interp = Interpreter::new(machine).unwrap();
//! interp.start();
//!
//! interp.send(Event::new("CHECKOUT")); // guard blocks: no items yet
//! assert!(interp.matches("cart"));
//!
//! interp.send(Event::new("ADD"));
//! interp.send(Event::new("CHECKOUT"));
//! assert!(interp.done());
//! ```

pub mod builder;
pub mod core;
pub mod export;
pub mod runtime;
pub mod timer;
pub mod validate;

pub use crate::core::{
    ActionId, Event, EventId, GuardId, HistoryKind, Machine, StateId, StateKind, StateNode,
    Transition, Trigger,
};
pub use builder::{MachineBuilder, StateBuilder, TransitionBuilder};
pub use runtime::{Interpreter, StateSnapshot};
pub use validate::{validate, Issue, IssueCode, ValidationError};
