//! # Solar Bridge Library
//!
//! Read a Victron MPPT charge controller over VE.Direct and switch loads
//! with a relay board.
//!
//! This library provides the frame parser, the telemetry store with its
//! simulation fallback, derived battery values and the polling driver that
//! ties them to the relay board.

pub mod config;
pub mod error;
pub mod vedirect;
pub mod serial;
pub mod telemetry;
pub mod relay;
pub mod poller;
