//! Bracket Builder and Round Propagator.
//!
//! Slot `i` of a round feeds match `i / 2` of the next round at position
//! `i mod 2`. The builder seeds round 1 of the main bracket and nothing else;
//! every later slot is written by [`propagate`].

pub mod builder;
pub mod propagator;

pub use builder::{BracketPlan, build_bracket};
pub use propagator::{PropagationReport, SlotFill, propagate};
