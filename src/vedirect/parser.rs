//! # VE.Direct Frame Parser
//!
//! Splits a raw serial read into `KEY\tVALUE` records.

use super::protocol::{FIELD_SEPARATOR, RECORD_SEPARATOR};
use tracing::warn;

/// One `KEY\tVALUE` pair taken from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub key: String,
    pub value: String,
}

impl TelemetryRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Records extracted from a single read of the serial buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// Well-formed records in wire order
    pub records: Vec<TelemetryRecord>,
    /// Number of records skipped for having fewer than two fields
    pub malformed: usize,
}

impl TelemetryFrame {
    pub fn from_records(records: Vec<TelemetryRecord>) -> Self {
        Self {
            records,
            malformed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a raw byte buffer into a telemetry frame
///
/// Non-ASCII bytes are dropped. The last record is always discarded since a
/// read can stop in the middle of a line. Records without a TAB are logged
/// and skipped; tokens after the value are ignored.
///
/// # Examples
///
/// ```
/// use solar_bridge::vedirect::parser::parse_frame;
///
/// let frame = parse_frame(b"V\t12800\r\nI\t-350\r\nPP");
/// assert_eq!(frame.records.len(), 2);
/// assert_eq!(frame.records[0].key, "V");
/// assert_eq!(frame.records[1].value, "-350");
/// ```
pub fn parse_frame(buffer: &[u8]) -> TelemetryFrame {
    let text: String = buffer
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect();

    let mut lines: Vec<&str> = text.split(RECORD_SEPARATOR).collect();
    // possibly truncated by the read boundary
    lines.pop();

    let mut frame = TelemetryFrame::default();
    for line in lines {
        let mut fields = line.split(FIELD_SEPARATOR);
        match (fields.next(), fields.next()) {
            (Some(key), Some(value)) => frame.records.push(TelemetryRecord::new(key, value)),
            _ => {
                warn!("Field structure not valid: {:?}", line);
                frame.malformed += 1;
            }
        }
    }

    frame
}
