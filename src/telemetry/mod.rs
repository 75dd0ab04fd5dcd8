//! # Telemetry Module
//!
//! Latest charger readings and everything computed from them.
//!
//! This module handles:
//! - Keeping the last value of every VE.Direct field
//! - Deriving battery power, charge percentage and charging state
//! - Building the snapshot published after each poll
//! - Writing snapshots to rotating JSONL files

pub mod field;
pub mod store;
pub mod derived;
pub mod snapshot;
pub mod logger;
