//! # VE.Direct Protocol Constants and Tables
//!
//! Field definitions, units and enumeration tables for the text-mode
//! VE.Direct protocol spoken by Victron SmartSolar MPPT chargers.

/// VE.Direct baud rate (19,200 baud, 8N1)
pub const VEDIRECT_BAUD_RATE: u32 = 19_200;

/// Record separator between `KEY\tVALUE` lines
pub const RECORD_SEPARATOR: &str = "\r\n";

/// Separator between the key and the value of a record
pub const FIELD_SEPARATOR: char = '\t';

/// Lookup table from raw code to description
pub type EnumTable = &'static [(&'static str, &'static str)];

/// Product ID (PID)
pub const PID_VALUES: EnumTable = &[("0xA060", "SmartSolar MPPT 100|20 48V")];

/// State of operation (CS)
pub const CS_VALUES: EnumTable = &[
    ("0", "Off"),
    ("2", "Fault"),
    ("3", "Bulk"),
    ("4", "Absorption"),
    ("5", "Float"),
    ("6", "Storage"),
    ("7", "Equalize (manual)"),
    ("9", "Inverting"),
    ("11", "Power supply"),
    ("245", "Starting-up"),
    ("246", "Repeated absorption"),
    ("247", "Auto equalize / Recondition"),
    ("248", "BatterySafe"),
    ("252", "External Control"),
];

/// Tracker operation mode (MPPT)
pub const MPPT_VALUES: EnumTable = &[
    ("0", "Off"),
    ("1", "Voltage or current limited"),
    ("2", "MPP Tracker active"),
];

/// Off reason (OR)
pub const OR_VALUES: EnumTable = &[
    ("0x00000000", "No reason"),
    ("0x00000001", "No input power"),
    ("0x00000002", "Switched off (power switch)"),
    ("0x00000004", "Switched off (device mode register) "),
    ("0x00000008", "Remote input"),
    ("0x00000010", "Protection active "),
    ("0x00000020", "Paygo"),
    ("0x00000040", "BMS"),
    ("0x00000080", "Engine shutdown"),
    ("0x00000100", "Analysing input voltage"),
];

/// Error code (ERR)
pub const ERR_VALUES: EnumTable = &[
    ("0", "No error"),
    ("2", "Battery voltage too high"),
    ("17", "Charger temperature too high"),
    ("18", "Charger over current"),
    ("19", "Charger current reversed"),
    ("20", "Bulk time limit exceeded"),
    ("21", "Current sensor issue (sensor bias/sensor broken)"),
    ("26", "Terminals overheated"),
    ("28", "Converter issue (dual converter models only)"),
    ("33", "Input voltage too high (solar panel)"),
    ("34", "Input current too high (solar panel)"),
    ("38", "Input shutdown (due to excessive battery voltage)"),
    ("39", "Input shutdown (due to current flow during off mode)"),
    ("65", "Lost communication with one of devices"),
    ("66", "Synchronised charging device configuration issue"),
    ("67", "BMS connection lost"),
    ("68", "Network misconfigured"),
    ("116", "Factory calibration data lost"),
    ("117", "Invalid/incompatible firmware"),
    ("119", "User settings invalid"),
];

/// Look up the description of a raw code
///
/// Returns `None` for reserved or undocumented codes.
pub fn lookup(table: EnumTable, raw: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(code, _)| *code == raw)
        .map(|(_, description)| *description)
}

/// Physical unit of a numeric field, as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Millivolt,
    Milliampere,
    Watt,
    /// 0.01 kWh
    CentiKilowattHour,
    Day,
}

impl Unit {
    /// Factor converting the wire value to the display unit (V, A, W, kWh)
    pub const fn factor(self) -> f64 {
        match self {
            Unit::Millivolt | Unit::Milliampere => 0.001,
            Unit::CentiKilowattHour => 0.01,
            Unit::Watt | Unit::Day => 1.0,
        }
    }

    /// Display unit symbol after conversion
    pub const fn symbol(self) -> &'static str {
        match self {
            Unit::Millivolt => "V",
            Unit::Milliampere => "A",
            Unit::Watt => "W",
            Unit::CentiKilowattHour => "kWh",
            Unit::Day => "d",
        }
    }
}

/// How the raw value of a field is interpreted
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Numeric(Unit),
    Enumerated(EnumTable),
    Text,
}

/// Static definition of one known telemetry field
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub key: &'static str,
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Product ID
pub const KEY_PID: &str = "PID";
/// Firmware version
pub const KEY_FW: &str = "FW";
/// Serial number
pub const KEY_SERIAL: &str = "SER#";
/// State of operation
pub const KEY_CS: &str = "CS";
/// Tracker operation mode
pub const KEY_MPPT: &str = "MPPT";
/// Off reason
pub const KEY_OR: &str = "OR";
/// Day sequence number
pub const KEY_HSDS: &str = "HSDS";
/// Block checksum
pub const KEY_CHECKSUM: &str = "Checksum";
/// Load current (mA)
pub const KEY_IL: &str = "IL";
/// Error code
pub const KEY_ERR: &str = "ERR";
/// Load output state
pub const KEY_LOAD: &str = "LOAD";
/// Battery voltage (mV)
pub const KEY_V: &str = "V";
/// Panel voltage (mV)
pub const KEY_VPV: &str = "VPV";
/// Panel power (W)
pub const KEY_PPV: &str = "PPV";
/// Battery current (mA)
pub const KEY_I: &str = "I";
/// Yield total (0.01 kWh)
pub const KEY_H19: &str = "H19";
/// Yield today (0.01 kWh)
pub const KEY_H20: &str = "H20";
/// Maximum power today (W)
pub const KEY_H21: &str = "H21";
/// Yield yesterday (0.01 kWh)
pub const KEY_H22: &str = "H22";
/// Maximum power yesterday (W)
pub const KEY_H23: &str = "H23";

/// Every key the store accepts, in wire order
pub const FIELD_DEFS: &[FieldDef] = &[
    FieldDef { key: KEY_PID, name: "Product ID", kind: FieldKind::Enumerated(PID_VALUES) },
    FieldDef { key: KEY_FW, name: "Firmware Version", kind: FieldKind::Text },
    FieldDef { key: KEY_SERIAL, name: "Serial Number", kind: FieldKind::Text },
    FieldDef { key: KEY_CS, name: "State of operation", kind: FieldKind::Enumerated(CS_VALUES) },
    FieldDef { key: KEY_MPPT, name: "Tracker operation mode", kind: FieldKind::Enumerated(MPPT_VALUES) },
    FieldDef { key: KEY_OR, name: "Off Reason", kind: FieldKind::Enumerated(OR_VALUES) },
    FieldDef { key: KEY_HSDS, name: "Day seq number", kind: FieldKind::Numeric(Unit::Day) },
    FieldDef { key: KEY_CHECKSUM, name: "CheckSum", kind: FieldKind::Text },
    FieldDef { key: KEY_IL, name: "Load Current", kind: FieldKind::Numeric(Unit::Milliampere) },
    FieldDef { key: KEY_ERR, name: "Error", kind: FieldKind::Enumerated(ERR_VALUES) },
    FieldDef { key: KEY_LOAD, name: "Load state", kind: FieldKind::Text },
    FieldDef { key: KEY_V, name: "Battery Voltage", kind: FieldKind::Numeric(Unit::Millivolt) },
    FieldDef { key: KEY_VPV, name: "Panel Voltage", kind: FieldKind::Numeric(Unit::Millivolt) },
    FieldDef { key: KEY_PPV, name: "Panel Power", kind: FieldKind::Numeric(Unit::Watt) },
    FieldDef { key: KEY_I, name: "Battery Current", kind: FieldKind::Numeric(Unit::Milliampere) },
    FieldDef { key: KEY_H19, name: "Yield total", kind: FieldKind::Numeric(Unit::CentiKilowattHour) },
    FieldDef { key: KEY_H20, name: "Yield today", kind: FieldKind::Numeric(Unit::CentiKilowattHour) },
    FieldDef { key: KEY_H21, name: "Max power today", kind: FieldKind::Numeric(Unit::Watt) },
    FieldDef { key: KEY_H22, name: "Yield yesterday", kind: FieldKind::Numeric(Unit::CentiKilowattHour) },
    FieldDef { key: KEY_H23, name: "Max power yesterday", kind: FieldKind::Numeric(Unit::Watt) },
];

/// Find the definition of a known key
pub fn field_def(key: &str) -> Option<&'static FieldDef> {
    FIELD_DEFS.iter().find(|def| def.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_codes() {
        assert_eq!(lookup(PID_VALUES, "0xA060"), Some("SmartSolar MPPT 100|20 48V"));
        assert_eq!(lookup(CS_VALUES, "3"), Some("Bulk"));
        assert_eq!(lookup(CS_VALUES, "252"), Some("External Control"));
        assert_eq!(lookup(MPPT_VALUES, "2"), Some("MPP Tracker active"));
        assert_eq!(lookup(OR_VALUES, "0x00000100"), Some("Analysing input voltage"));
        assert_eq!(lookup(ERR_VALUES, "119"), Some("User settings invalid"));
    }

    #[test]
    fn test_lookup_reserved_code_is_none() {
        assert_eq!(lookup(CS_VALUES, "1"), None);
        assert_eq!(lookup(ERR_VALUES, "120"), None);
        assert_eq!(lookup(OR_VALUES, "0x00000003"), None);
        assert_eq!(lookup(PID_VALUES, "0xA061"), None);
    }

    #[test]
    fn test_field_defs_cover_wire_keys() {
        let keys: Vec<&str> = FIELD_DEFS.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), 20);
        for key in [
            "PID", "FW", "SER#", "CS", "MPPT", "OR", "HSDS", "Checksum", "IL", "ERR",
            "LOAD", "V", "VPV", "PPV", "I", "H19", "H20", "H21", "H22", "H23",
        ] {
            assert!(keys.contains(&key), "missing key {}", key);
        }
    }

    #[test]
    fn test_field_def_lookup() {
        assert!(field_def("V").is_some());
        assert!(field_def("v").is_none());
        assert!(field_def("BMV").is_none());
    }

    #[test]
    fn test_unit_factors() {
        assert_eq!(Unit::Millivolt.factor(), 0.001);
        assert_eq!(Unit::Milliampere.factor(), 0.001);
        assert_eq!(Unit::CentiKilowattHour.factor(), 0.01);
        assert_eq!(Unit::Watt.factor(), 1.0);
        assert_eq!(Unit::CentiKilowattHour.symbol(), "kWh");
    }
}
