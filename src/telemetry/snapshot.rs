//! # Telemetry Snapshot
//!
//! Everything published after a poll cycle: converted charger readings,
//! derived battery figures and relay states.

use super::derived;
use super::store::TelemetryStore;
use crate::relay::board::LoadState;
use crate::vedirect::protocol::{
    KEY_H19, KEY_H20, KEY_H21, KEY_H22, KEY_H23, KEY_I, KEY_IL, KEY_PPV, KEY_V, KEY_VPV,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Charger identity and status
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargerStatus {
    pub product: Option<String>,
    pub firmware: Option<String>,
    pub serial_number: Option<String>,
    pub state_of_operation: Option<String>,
    pub tracker_mode: Option<String>,
    pub off_reason: Option<String>,
    pub error: Option<String>,
    pub day_seq_number: Option<i64>,
}

/// Battery readings and derived values
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatteryStatus {
    pub voltage_v: Option<f64>,
    pub current_a: Option<f64>,
    pub power_in_w: Option<f64>,
    pub power_out_w: Option<f64>,
    pub charge_percent: Option<f64>,
    pub charging: Option<bool>,
}

/// Solar panel readings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelStatus {
    pub voltage_v: Option<f64>,
    pub power_w: Option<f64>,
    pub current_a: Option<f64>,
    pub yield_today_kwh: Option<f64>,
    pub yield_yesterday_kwh: Option<f64>,
    pub yield_total_kwh: Option<f64>,
    pub max_power_today_w: Option<f64>,
    pub max_power_yesterday_w: Option<f64>,
}

/// Load output readings
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadStatus {
    pub on: Option<bool>,
    pub current_a: Option<f64>,
    pub power_w: Option<f64>,
}

/// One relay-switched load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayLoadStatus {
    pub name: String,
    pub on: bool,
    pub current_a: Option<f64>,
    /// Relay load current times battery voltage
    pub power_w: Option<f64>,
}

/// State published after every poll cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    /// False when the last update failed; values are then the last known ones
    pub available: bool,
    pub simulation: bool,
    pub charger: ChargerStatus,
    pub battery: BatteryStatus,
    pub panel: PanelStatus,
    pub load: LoadStatus,
    pub relays: Vec<RelayLoadStatus>,
}

impl TelemetrySnapshot {
    /// Build a snapshot from the store and the current relay states
    pub fn capture(store: &TelemetryStore, relays: &[LoadState], available: bool) -> Self {
        let voltage = store.battery_voltage_mv();
        let current = store.battery_current_ma();
        let load_current = store.load_current_ma();
        let both = voltage.zip(current);

        let charger = ChargerStatus {
            product: store.product_id().map(str::to_string),
            firmware: store.firmware().map(str::to_string),
            serial_number: store.serial_number().map(str::to_string),
            state_of_operation: store.state_of_operation().map(str::to_string),
            tracker_mode: store.tracker_operation_mode().map(str::to_string),
            off_reason: store.off_reason().map(str::to_string),
            error: store.error_reason().map(str::to_string),
            day_seq_number: store.day_seq_number(),
        };

        let battery = BatteryStatus {
            voltage_v: store.converted(KEY_V),
            current_a: store.converted(KEY_I),
            power_in_w: both.map(|(v, i)| derived::power_into_battery(v, i)),
            power_out_w: both.map(|(v, i)| derived::power_out_of_battery(v, i)),
            charge_percent: voltage.map(derived::charge_percent),
            charging: current.map(derived::is_charging),
        };

        let panel = PanelStatus {
            voltage_v: store.converted(KEY_VPV),
            power_w: store.converted(KEY_PPV),
            current_a: store
                .panel_power_w()
                .zip(store.panel_voltage_mv())
                .map(|(p, v)| derived::panel_current(p, v)),
            yield_today_kwh: store.converted(KEY_H20),
            yield_yesterday_kwh: store.converted(KEY_H22),
            yield_total_kwh: store.converted(KEY_H19),
            max_power_today_w: store.converted(KEY_H21),
            max_power_yesterday_w: store.converted(KEY_H23),
        };

        let load = LoadStatus {
            on: store.load_state().map(|s| s == "ON"),
            current_a: store.converted(KEY_IL),
            power_w: voltage
                .zip(load_current)
                .map(|(v, il)| derived::load_power(v, il)),
        };

        let relays = relays
            .iter()
            .map(|relay| RelayLoadStatus {
                name: relay.name.clone(),
                on: relay.on,
                current_a: load_current.map(|il| derived::relay_load_current(il, relay.on)),
                power_w: voltage
                    .zip(load_current)
                    .map(|(v, il)| derived::relay_load_power(v, il, relay.on)),
            })
            .collect();

        Self {
            timestamp: Utc::now(),
            available,
            simulation: store.simulation(),
            charger,
            battery,
            panel,
            load,
            relays,
        }
    }

    /// Same values, flagged as stale after a failed update
    pub fn mark_unavailable(mut self) -> Self {
        self.available = false;
        self.timestamp = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vedirect::parser::parse_frame;

    fn store_with(buffer: &[u8]) -> TelemetryStore {
        let mut store = TelemetryStore::simulated();
        store.apply_frame(&parse_frame(buffer));
        store
    }

    #[test]
    fn test_empty_store_snapshot() {
        let store = TelemetryStore::simulated();
        let snap = TelemetrySnapshot::capture(&store, &[], true);

        assert!(snap.available);
        assert!(snap.simulation);
        assert_eq!(snap.battery, BatteryStatus::default());
        assert_eq!(snap.charger, ChargerStatus::default());
        assert!(snap.relays.is_empty());
    }

    #[test]
    fn test_discharging_battery() {
        let store = store_with(b"V\t12000\r\nI\t-3000\r\nIL\t3000\r\nLOAD\tON\r\n");
        let snap = TelemetrySnapshot::capture(&store, &[], true);

        assert_eq!(snap.battery.power_in_w, Some(0.0));
        assert_eq!(snap.battery.power_out_w, Some(36.0));
        assert_eq!(snap.battery.charge_percent, Some(60.0));
        assert_eq!(snap.battery.charging, Some(false));
        assert_eq!(snap.load.on, Some(true));
        assert_eq!(snap.load.power_w, Some(36.0));
    }

    #[test]
    fn test_charging_battery_and_panel() {
        let store = store_with(b"V\t12500\r\nI\t5000\r\nVPV\t18000\r\nPPV\t90\r\nH20\t150\r\nCS\t3\r\n");
        let snap = TelemetrySnapshot::capture(&store, &[], true);

        assert_eq!(snap.battery.power_in_w, Some(62.5));
        assert_eq!(snap.battery.power_out_w, Some(0.0));
        assert_eq!(snap.battery.charge_percent, Some(70.0));
        assert_eq!(snap.battery.charging, Some(true));
        assert_eq!(snap.panel.current_a, Some(5.0));
        assert!((snap.panel.yield_today_kwh.unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(snap.charger.state_of_operation.as_deref(), Some("Bulk"));
    }

    #[test]
    fn test_relay_loads() {
        let store = store_with(b"IL\t2000\r\nV\t12500\r\nVPV\t0\r\n");
        let relays = vec![
            LoadState { name: "fridge".to_string(), relay: 1, on: true },
            LoadState { name: "fan".to_string(), relay: 2, on: false },
        ];
        let snap = TelemetrySnapshot::capture(&store, &relays, true);

        assert_eq!(snap.relays[0].current_a, Some(1.5));
        assert_eq!(snap.relays[1].current_a, Some(0.0));
        assert_eq!(snap.relays[0].power_w, Some(18.75));
        assert_eq!(snap.relays[1].power_w, Some(0.0));
    }

    #[test]
    fn test_mark_unavailable_keeps_values() {
        let store = store_with(b"V\t13000\r\n");
        let snap = TelemetrySnapshot::capture(&store, &[], true).mark_unavailable();

        assert!(!snap.available);
        assert_eq!(snap.battery.charge_percent, Some(80.0));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let store = store_with(b"V\t13000\r\nERR\t0\r\n");
        let snap = TelemetrySnapshot::capture(&store, &[], true);

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["battery"]["charge_percent"], 80.0);
        assert_eq!(json["charger"]["error"], "No error");
        assert_eq!(json["available"], true);
    }
}
