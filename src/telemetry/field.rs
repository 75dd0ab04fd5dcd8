//! # Telemetry Fields
//!
//! Latest value of one VE.Direct key, typed by how the key is interpreted.

use crate::vedirect::protocol::{lookup, EnumTable, FieldDef, FieldKind, Unit};
use chrono::{DateTime, Utc};

/// Raw value of a field, tagged by interpretation
///
/// `None` raw values are the placeholder a field holds until its key is
/// first received.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric {
        /// Text as received, e.g. `012800`
        raw: Option<String>,
        /// Parsed integer in wire units
        value: Option<i64>,
        unit: Unit,
        factor: f64,
    },
    Enumerated {
        raw: Option<String>,
        table: EnumTable,
    },
    Text {
        raw: Option<String>,
    },
}

/// Why a raw value was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    pub key: &'static str,
    pub value: String,
}

/// Latest known value of one telemetry key
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryField {
    pub key: &'static str,
    pub name: &'static str,
    pub value: FieldValue,
    /// When the value was last set from a frame
    pub updated_at: Option<DateTime<Utc>>,
}

impl TelemetryField {
    /// Create a field holding the placeholder value
    pub fn new(def: &FieldDef) -> Self {
        let value = match def.kind {
            FieldKind::Numeric(unit) => FieldValue::Numeric {
                raw: None,
                value: None,
                unit,
                factor: unit.factor(),
            },
            FieldKind::Enumerated(table) => FieldValue::Enumerated { raw: None, table },
            FieldKind::Text => FieldValue::Text { raw: None },
        };

        Self {
            key: def.key,
            name: def.name,
            value,
            updated_at: None,
        }
    }

    /// Store a raw value received from the wire
    ///
    /// Numeric fields only accept integers; anything else leaves the field
    /// unchanged. The received text is kept as is alongside the parsed value. Enumerated fields accept any code, including undocumented
    /// ones.
    pub fn set(&mut self, raw: &str, at: DateTime<Utc>) -> std::result::Result<(), InvalidValue> {
        let key = self.key;
        match &mut self.value {
            FieldValue::Numeric { raw: current, value, .. } => {
                let parsed = raw.trim().parse::<i64>().map_err(|_| InvalidValue {
                    key,
                    value: raw.to_string(),
                })?;
                *current = Some(raw.to_string());
                *value = Some(parsed);
            }
            FieldValue::Enumerated { raw: current, .. } | FieldValue::Text { raw: current } => {
                *current = Some(raw.to_string());
            }
        }
        self.updated_at = Some(at);
        Ok(())
    }

    /// Raw value exactly as received
    pub fn raw(&self) -> Option<String> {
        match &self.value {
            FieldValue::Numeric { raw, .. }
            | FieldValue::Enumerated { raw, .. }
            | FieldValue::Text { raw } => raw.clone(),
        }
    }

    /// Raw integer of a numeric field
    pub fn numeric(&self) -> Option<i64> {
        match &self.value {
            FieldValue::Numeric { value, .. } => *value,
            _ => None,
        }
    }

    /// Numeric value in display units (V, A, W, kWh)
    pub fn converted(&self) -> Option<f64> {
        match &self.value {
            FieldValue::Numeric { value, factor, .. } => value.map(|v| v as f64 * *factor),
            _ => None,
        }
    }

    /// Description of an enumerated field's code, if the code is documented
    pub fn description(&self) -> Option<&'static str> {
        match &self.value {
            FieldValue::Enumerated { raw: Some(raw), table } => lookup(*table, raw),
            _ => None,
        }
    }

    /// Display value: description for enumerations, raw text otherwise
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Enumerated { .. } => self.description(),
            FieldValue::Text { raw } => raw.as_deref(),
            FieldValue::Numeric { .. } => None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.updated_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vedirect::protocol::field_def;

    fn field(key: &str) -> TelemetryField {
        TelemetryField::new(field_def(key).unwrap())
    }

    #[test]
    fn test_new_field_holds_placeholder() {
        let f = field("V");
        assert!(!f.is_set());
        assert_eq!(f.raw(), None);
        assert_eq!(f.numeric(), None);
        assert_eq!(f.converted(), None);
    }

    #[test]
    fn test_numeric_conversion() {
        let mut f = field("V");
        f.set("12800", Utc::now()).unwrap();
        assert_eq!(f.numeric(), Some(12800));
        assert!((f.converted().unwrap() - 12.8).abs() < 1e-9);

        let mut f = field("H19");
        f.set("1234", Utc::now()).unwrap();
        assert!((f.converted().unwrap() - 12.34).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_rejects_non_integer() {
        let mut f = field("I");
        f.set("-350", Utc::now()).unwrap();

        let err = f.set("abc", Utc::now()).unwrap_err();
        assert_eq!(err.key, "I");
        assert_eq!(err.value, "abc");
        assert_eq!(f.numeric(), Some(-350));
    }

    #[test]
    fn test_numeric_keeps_received_text() {
        let mut f = field("V");
        f.set("012800", Utc::now()).unwrap();
        assert_eq!(f.raw().as_deref(), Some("012800"));
        assert_eq!(f.numeric(), Some(12800));

        let mut f = field("H19");
        f.set("+5", Utc::now()).unwrap();
        assert_eq!(f.raw().as_deref(), Some("+5"));
        assert_eq!(f.numeric(), Some(5));
        assert!((f.converted().unwrap() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_enumerated_description() {
        let mut f = field("CS");
        f.set("5", Utc::now()).unwrap();
        assert_eq!(f.description(), Some("Float"));
        assert_eq!(f.text(), Some("Float"));
        assert_eq!(f.raw().as_deref(), Some("5"));
    }

    #[test]
    fn test_enumerated_unmapped_code_is_absent() {
        let mut f = field("ERR");
        f.set("250", Utc::now()).unwrap();
        assert!(f.is_set());
        assert_eq!(f.raw().as_deref(), Some("250"));
        assert_eq!(f.description(), None);
    }

    #[test]
    fn test_text_field_passthrough() {
        let mut f = field("SER#");
        f.set("HQ2129WD7QV", Utc::now()).unwrap();
        assert_eq!(f.text(), Some("HQ2129WD7QV"));
        assert_eq!(f.description(), None);
        assert_eq!(f.converted(), None);
    }
}
