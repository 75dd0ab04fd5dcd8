//! # Relay Module
//!
//! Relay-switched loads (fridge, fans) on GPIO outputs.
//!
//! This module handles:
//! - Driving GPIO lines through sysfs, or in memory when simulated
//! - Active-low relay boards
//! - Mapping load names to relay channels
//! - Parsing on/off commands

pub mod pin;
pub mod board;
