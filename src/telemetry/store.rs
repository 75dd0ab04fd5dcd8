//! # Telemetry Store
//!
//! Holds the latest value of every known VE.Direct field and refreshes it
//! from the serial link, or from the simulator when no charger is present.
//!
//! ## Sources
//!
//! | Mode | Behaviour of [`TelemetryStore::update`] |
//! |------|------------------------------------------|
//! | Serial | drain the port, parse, apply |
//! | Simulation | apply a synthetic frame |
//!
//! Simulation is entered when the port cannot be opened at start-up and is
//! never left; there is no reconnect.
//!
//! ## Usage
//!
//! ```
//! use solar_bridge::telemetry::store::TelemetryStore;
//! use solar_bridge::vedirect::parser::parse_frame;
//!
//! let mut store = TelemetryStore::simulated();
//! let report = store.apply_frame(&parse_frame(b"V\t12800\r\nCS\t3\r\n"));
//! assert_eq!(report.applied, 2);
//! assert_eq!(store.battery_voltage_mv(), Some(12800));
//! assert_eq!(store.state_of_operation(), Some("Bulk"));
//! ```

use super::field::TelemetryField;
use crate::config::SerialConfig;
use crate::error::Result;
use crate::serial::VeDirectSerial;
use crate::vedirect::parser::{parse_frame, TelemetryFrame};
use crate::vedirect::protocol::*;
use crate::vedirect::simulator::Simulator;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where fresh telemetry comes from
#[derive(Debug)]
enum TelemetrySource {
    Serial(VeDirectSerial),
    Simulated(Simulator),
}

/// Outcome of applying one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Records stored
    pub applied: usize,
    /// Records without a key/value pair
    pub malformed: usize,
    /// Records whose key is not known
    pub unknown: usize,
    /// Records whose value could not be parsed for the field's type
    pub invalid: usize,
}

impl UpdateReport {
    /// Number of warnings raised while applying the frame
    pub fn warnings(&self) -> usize {
        self.malformed + self.unknown + self.invalid
    }
}

/// Latest value of every known telemetry field
#[derive(Debug)]
pub struct TelemetryStore {
    fields: HashMap<&'static str, TelemetryField>,
    source: TelemetrySource,
}

impl TelemetryStore {
    /// Open the serial link described by `config`
    ///
    /// Falls back to simulation if the port cannot be opened. The fallback is
    /// permanent for this store.
    pub fn open(config: &SerialConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        match VeDirectSerial::open_with_paths(&[config.port.as_str()], config.baud_rate, timeout) {
            Ok(serial) => Self::with_serial(serial),
            Err(e) => {
                warn!("Serial link unavailable ({}), switching to simulation", e);
                Self::simulated()
            }
        }
    }

    /// Store fed from an opened serial link
    pub fn with_serial(serial: VeDirectSerial) -> Self {
        info!("Reading VE.Direct telemetry from {}", serial.device_path());
        Self::with_source(TelemetrySource::Serial(serial))
    }

    /// Store fed from the simulator
    pub fn simulated() -> Self {
        Self::with_simulator(Simulator::new())
    }

    pub fn with_simulator(simulator: Simulator) -> Self {
        Self::with_source(TelemetrySource::Simulated(simulator))
    }

    fn with_source(source: TelemetrySource) -> Self {
        let fields = FIELD_DEFS
            .iter()
            .map(|def| (def.key, TelemetryField::new(def)))
            .collect();

        Self { fields, source }
    }

    /// True when values are synthesized instead of read
    pub fn simulation(&self) -> bool {
        matches!(self.source, TelemetrySource::Simulated(_))
    }

    /// Run one poll cycle
    ///
    /// # Errors
    ///
    /// Returns error if the serial read fails. Stored values are left as
    /// they were.
    pub async fn update(&mut self) -> Result<UpdateReport> {
        let frame = match &mut self.source {
            TelemetrySource::Serial(serial) => parse_frame(&serial.read_available().await?),
            TelemetrySource::Simulated(simulator) => simulator.next_frame(),
        };

        let report = self.apply_frame(&frame);
        debug!(
            "Telemetry update: {} applied, {} warnings",
            report.applied,
            report.warnings()
        );
        Ok(report)
    }

    /// Store every record of `frame` whose key is known
    pub fn apply_frame(&mut self, frame: &TelemetryFrame) -> UpdateReport {
        let now = Utc::now();
        let mut report = UpdateReport {
            malformed: frame.malformed,
            ..UpdateReport::default()
        };

        for record in &frame.records {
            match self.fields.get_mut(record.key.as_str()) {
                Some(field) => match field.set(&record.value, now) {
                    Ok(()) => report.applied += 1,
                    Err(invalid) => {
                        warn!("Value not valid for {}: {:?}", invalid.key, invalid.value);
                        report.invalid += 1;
                    }
                },
                None => {
                    warn!("Key not defined {:?}", record);
                    report.unknown += 1;
                }
            }
        }

        report
    }

    /// Field for a known key
    pub fn field(&self, key: &str) -> Option<&TelemetryField> {
        self.fields.get(key)
    }

    /// All fields, in wire order
    pub fn fields(&self) -> impl Iterator<Item = &TelemetryField> {
        FIELD_DEFS.iter().filter_map(move |def| self.fields.get(def.key))
    }

    /// Raw text of a field
    pub fn raw(&self, key: &str) -> Option<String> {
        self.field(key).and_then(TelemetryField::raw)
    }

    /// Numeric field in display units
    pub fn converted(&self, key: &str) -> Option<f64> {
        self.field(key).and_then(TelemetryField::converted)
    }

    /// True once the identity fields (PID, FW, SER#) have been received
    pub fn is_ready(&self) -> bool {
        [KEY_PID, KEY_FW, KEY_SERIAL]
            .iter()
            .all(|key| self.raw(key).is_some_and(|v| !v.is_empty()))
    }

    fn numeric(&self, key: &str) -> Option<i64> {
        self.field(key).and_then(TelemetryField::numeric)
    }

    fn description(&self, key: &str) -> Option<&'static str> {
        self.field(key).and_then(TelemetryField::description)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(TelemetryField::text)
    }

    pub fn product_id(&self) -> Option<&'static str> {
        self.description(KEY_PID)
    }

    pub fn firmware(&self) -> Option<&str> {
        self.text(KEY_FW)
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.text(KEY_SERIAL)
    }

    pub fn state_of_operation(&self) -> Option<&'static str> {
        self.description(KEY_CS)
    }

    pub fn tracker_operation_mode(&self) -> Option<&'static str> {
        self.description(KEY_MPPT)
    }

    pub fn off_reason(&self) -> Option<&'static str> {
        self.description(KEY_OR)
    }

    pub fn error_reason(&self) -> Option<&'static str> {
        self.description(KEY_ERR)
    }

    pub fn day_seq_number(&self) -> Option<i64> {
        self.numeric(KEY_HSDS)
    }

    pub fn checksum(&self) -> Option<&str> {
        self.text(KEY_CHECKSUM)
    }

    /// Load output state as reported ("ON" / "OFF")
    pub fn load_state(&self) -> Option<&str> {
        self.text(KEY_LOAD)
    }

    /// Load current in mA
    pub fn load_current_ma(&self) -> Option<i64> {
        self.numeric(KEY_IL)
    }

    /// Battery voltage in mV
    pub fn battery_voltage_mv(&self) -> Option<i64> {
        self.numeric(KEY_V)
    }

    /// Battery current in mA, positive while charging
    pub fn battery_current_ma(&self) -> Option<i64> {
        self.numeric(KEY_I)
    }

    /// Panel voltage in mV
    pub fn panel_voltage_mv(&self) -> Option<i64> {
        self.numeric(KEY_VPV)
    }

    /// Panel power in W
    pub fn panel_power_w(&self) -> Option<i64> {
        self.numeric(KEY_PPV)
    }

    /// Yield total in 0.01 kWh
    pub fn yield_total(&self) -> Option<i64> {
        self.numeric(KEY_H19)
    }

    /// Yield today in 0.01 kWh
    pub fn yield_today(&self) -> Option<i64> {
        self.numeric(KEY_H20)
    }

    /// Maximum power today in W
    pub fn max_power_today(&self) -> Option<i64> {
        self.numeric(KEY_H21)
    }

    /// Yield yesterday in 0.01 kWh
    pub fn yield_yesterday(&self) -> Option<i64> {
        self.numeric(KEY_H22)
    }

    /// Maximum power yesterday in W
    pub fn max_power_yesterday(&self) -> Option<i64> {
        self.numeric(KEY_H23)
    }
}
