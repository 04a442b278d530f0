//! perp-sentinel: Adaptive position and risk management engine for crypto perpetuals
//!
//! This library provides the core components for:
//! - ATR-based volatility estimation with Wilder smoothing
//! - Adaptive stop-loss and take-profit policy with a trailing ratchet
//! - Per-position lifecycle state machines
//! - Idempotent order execution with bounded retries
//! - A concurrent registry fanning price ticks out to live positions
//! - CSV replay feeds for deterministic runs
//! - Full observability stack

pub mod cli;
pub mod config;
pub mod engine;
pub mod events;
pub mod execution;
pub mod feed;
pub mod model;
pub mod policy;
pub mod position;
pub mod registry;
pub mod telemetry;
