//! # VE.Direct Simulator
//!
//! Generates plausible telemetry when no charge controller is attached.

use super::parser::{TelemetryFrame, TelemetryRecord};
use super::protocol::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::ops::Range;

/// Product ID reported in simulation
pub const SIMULATED_PID: &str = "0xA060";

/// Firmware version reported in simulation
pub const SIMULATED_FIRMWARE: &str = "156";

/// Serial number reported in simulation
pub const SIMULATED_SERIAL: &str = "HQ2129WD7QV";

/// Checksum placeholder reported in simulation
pub const SIMULATED_CHECKSUM: &str = "ABCDE";

/// Range of simulated values for a numeric key (upper bound exclusive)
pub fn numeric_range(key: &str) -> Option<Range<i64>> {
    match key {
        KEY_V => Some(9_000..14_500),
        KEY_I => Some(-5_000..5_000),
        KEY_IL => Some(0..5_000),
        KEY_VPV => Some(0..20_000),
        KEY_PPV => Some(0..100),
        KEY_HSDS => Some(0..365),
        KEY_H19 | KEY_H20 | KEY_H21 | KEY_H22 | KEY_H23 => Some(0..200),
        _ => None,
    }
}

/// Source of synthetic telemetry frames
pub struct Simulator {
    rng: StdRng,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator").finish_non_exhaustive()
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic simulator, for reproducible tests
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Produce one record for every known field
    ///
    /// Identity fields are fixed, enumerated fields pick a documented code
    /// and numeric fields are drawn from [`numeric_range`].
    pub fn next_frame(&mut self) -> TelemetryFrame {
        let records = FIELD_DEFS
            .iter()
            .map(|def| TelemetryRecord::new(def.key, self.value_for(def)))
            .collect();

        TelemetryFrame::from_records(records)
    }

    fn value_for(&mut self, def: &FieldDef) -> String {
        match def.key {
            KEY_PID => return SIMULATED_PID.to_string(),
            KEY_FW => return SIMULATED_FIRMWARE.to_string(),
            KEY_SERIAL => return SIMULATED_SERIAL.to_string(),
            KEY_CHECKSUM => return SIMULATED_CHECKSUM.to_string(),
            KEY_LOAD => return "ON".to_string(),
            _ => {}
        }

        match def.kind {
            FieldKind::Enumerated(table) => table
                .choose(&mut self.rng)
                .map(|(code, _)| code.to_string())
                .unwrap_or_default(),
            FieldKind::Numeric(_) => {
                let range = numeric_range(def.key).unwrap_or(0..1);
                self.rng.gen_range(range).to_string()
            }
            FieldKind::Text => String::new(),
        }
    }
}
