//! Builder API for ergonomic state machine construction.
//!
//! This module provides fluent, by-value builders for assembling a
//! [`Machine`](crate::core::Machine): states nest inside their parents, and
//! [`MachineBuilder::build`] flattens the tree into the machine's id-keyed
//! table and validates it. A machine that builds successfully is ready to
//! hand to an interpreter.
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{MachineBuilder, StateBuilder};
//! use statecraft::core::Event;
//!
//! #[derive(Clone, Default)]
//! struct Ctx {
//!     laps: u32,
//! }
//!
//! let machine = MachineBuilder::<Ctx>::new("traffic")
//!     .initial("green")
//!     .action("count", |ctx: &mut Ctx, _e: &Event| ctx.laps += 1)
//!     .state(StateBuilder::atomic("green").on("TIMER", "yellow"))
//!     .state(StateBuilder::atomic("yellow").on("TIMER", "red"))
//!     .state(
//!         StateBuilder::atomic("red")
//!             .transition(statecraft::builder::TransitionBuilder::on("TIMER", "green").action("count")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(machine.initial().as_str(), "green");
//! ```

pub mod machine;
pub mod state;
pub mod transition;

pub use machine::MachineBuilder;
pub use state::StateBuilder;
pub use transition::TransitionBuilder;
