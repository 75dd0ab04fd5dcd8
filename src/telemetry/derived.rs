//! # Derived Values
//!
//! Quantities computed from raw VE.Direct fields: battery power split by
//! direction, charge percentage, charging state and load figures.
//!
//! Raw inputs use wire units (mV, mA, W). Results are in V, A, W and %.
//!
//! ## Charge percentage
//!
//! Linear interpolation over a fixed voltage table:
//!
//! | Battery voltage | Charge |
//! |-----------------|--------|
//! | 9.0 V | 0 % |
//! | 10.0 V | 20 % |
//! | 11.0 V | 40 % |
//! | 12.0 V | 60 % |
//! | 13.0 V | 80 % |
//! | 14.0 V | 100 % |
//! | 15.0 V | 120 % |
//!
//! Below 9.0 V the charge is 0 %. Above 15.0 V it stays at the last entry.

/// (battery voltage in mV, charge in %)
pub const CHARGE_BREAKPOINTS: &[(i64, f64)] = &[
    (9_000, 0.0),
    (10_000, 20.0),
    (11_000, 40.0),
    (12_000, 60.0),
    (13_000, 80.0),
    (14_000, 100.0),
    (15_000, 120.0),
];

/// Standby draw of the load controller subtracted from relay loads, in A
pub const RELAY_LOAD_OFFSET_A: f64 = 0.5;

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    // normalize -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Battery power in W, signed like the current
///
/// # Examples
///
/// ```
/// use solar_bridge::telemetry::derived::power;
///
/// assert_eq!(power(12000, 5000), 60.0);
/// assert_eq!(power(12000, -3000), -36.0);
/// ```
pub fn power(voltage_mv: i64, current_ma: i64) -> f64 {
    round_to((voltage_mv as f64 * 0.001) * (current_ma as f64 * 0.001), 3)
}

/// Power flowing into the battery in W, zero while discharging
pub fn power_into_battery(voltage_mv: i64, current_ma: i64) -> f64 {
    if is_charging(current_ma) {
        power(voltage_mv, current_ma)
    } else {
        0.0
    }
}

/// Power drawn out of the battery in W, zero while charging
pub fn power_out_of_battery(voltage_mv: i64, current_ma: i64) -> f64 {
    if is_charging(current_ma) {
        0.0
    } else {
        round_to(-power(voltage_mv, current_ma), 3)
    }
}

/// True while current flows into the battery
pub fn is_charging(current_ma: i64) -> bool {
    current_ma > 0
}

/// Battery charge in %, rounded to one decimal
///
/// # Examples
///
/// ```
/// use solar_bridge::telemetry::derived::charge_percent;
///
/// assert_eq!(charge_percent(12000), 60.0);
/// assert_eq!(charge_percent(12500), 70.0);
/// assert_eq!(charge_percent(8000), 0.0);
/// ```
pub fn charge_percent(voltage_mv: i64) -> f64 {
    let (first_v, first_p) = CHARGE_BREAKPOINTS[0];
    if voltage_mv < first_v {
        return 0.0;
    }

    let (mut low_v, mut low_p) = (first_v, first_p);
    for &(high_v, high_p) in CHARGE_BREAKPOINTS {
        if voltage_mv == high_v {
            return round_to(high_p, 1);
        }
        if voltage_mv < high_v {
            let slope = (high_p - low_p) / (high_v - low_v) as f64;
            return round_to(low_p + slope * (voltage_mv - low_v) as f64, 1);
        }
        low_v = high_v;
        low_p = high_p;
    }

    // above the table
    round_to(low_p, 1)
}

/// Power drawn by the load output in W
pub fn load_power(battery_voltage_mv: i64, load_current_ma: i64) -> f64 {
    power(battery_voltage_mv, load_current_ma)
}

/// Panel current in A derived from panel power and voltage
///
/// Zero when the panel voltage is zero.
pub fn panel_current(panel_power_w: i64, panel_voltage_mv: i64) -> f64 {
    if panel_voltage_mv <= 0 {
        return 0.0;
    }
    round_to(panel_power_w as f64 / (panel_voltage_mv as f64 * 0.001), 3)
}

/// Current in A drawn by a load switched through a relay
///
/// The load output also feeds the controller electronics, so a fixed
/// offset is removed. A relay that is off draws nothing.
pub fn relay_load_current(load_current_ma: i64, relay_on: bool) -> f64 {
    if !relay_on {
        return 0.0;
    }
    round_to(load_current_ma as f64 * 0.001 - RELAY_LOAD_OFFSET_A, 3)
}

/// Power in W drawn by a load switched through a relay
///
/// Uses the battery voltage: the load output is fed from the battery, so
/// the panel voltage says nothing about it (and is zero at night).
pub fn relay_load_power(battery_voltage_mv: i64, load_current_ma: i64, relay_on: bool) -> f64 {
    let current = relay_load_current(load_current_ma, relay_on);
    round_to(current * battery_voltage_mv as f64 * 0.001, 3)
}
