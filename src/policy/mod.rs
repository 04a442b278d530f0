//! Stop policy module
//!
//! Pure computation of protective levels: initial stop/take-profit placement,
//! ATR trailing with a tightening-only ratchet, and the breakeven lift.

mod stops;

pub use stops::{compute_levels, Levels, PolicyConfig};
