//! Position lifecycle module
//!
//! Position data, the per-position state machine, and its transition actions

mod machine;
mod types;

pub use machine::{MachineAction, PositionMachine};
pub use types::{Breach, Position, PositionId, PositionState, Side};
