//! # VE.Direct Protocol Module
//!
//! Implementation of the Victron VE.Direct text protocol.
//!
//! This module handles:
//! - Known field keys, units and enumeration tables
//! - Splitting raw serial reads into `KEY\tVALUE` records
//! - Generating synthetic frames when no charger is attached

pub mod protocol;
pub mod parser;
pub mod simulator;
