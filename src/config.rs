//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, SolarBridgeError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub relays: RelayConfig,
    #[serde(default = "default_loads")]
    pub loads: Vec<LoadConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Longest wait for more bytes within one poll
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Poll cycle configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Relay board configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_gpio_root")]
    pub gpio_root: String,

    /// GPIO numbers of the relay channels, in channel order
    #[serde(default = "default_relay_pins")]
    pub pins: Vec<u32>,

    /// Active-low relay inputs
    #[serde(default = "default_inverted")]
    pub inverted: bool,

    /// Keep relay state in memory instead of driving GPIO
    #[serde(default)]
    pub simulated: bool,
}

/// A load wired to a relay channel
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    pub name: String,
    /// Index into `relays.pins`
    pub relay: usize,
}

/// Telemetry log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Application log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a daily rolling log file; stdout only when empty
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 19200 }
fn default_timeout_ms() -> u64 { 100 }

fn default_interval_ms() -> u64 { 2000 }

fn default_gpio_root() -> String { "/sys/class/gpio".to_string() }
fn default_relay_pins() -> Vec<u32> { vec![18, 23, 24, 27] }
fn default_inverted() -> bool { true }

fn default_loads() -> Vec<LoadConfig> {
    vec![
        LoadConfig { name: "fridge".to_string(), relay: 1 },
        LoadConfig { name: "fan".to_string(), relay: 2 },
    ]
}

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: default_interval_ms() }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            gpio_root: default_gpio_root(),
            pins: default_relay_pins(),
            inverted: default_inverted(),
            simulated: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            polling: PollingConfig::default(),
            relays: RelayConfig::default(),
            loads: default_loads(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> SolarBridgeError {
    SolarBridgeError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use solar_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200].contains(&self.serial.baud_rate) {
            return Err(invalid("baud_rate must be a standard rate (VE.Direct uses 19200)"));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        if self.polling.interval_ms < 100 || self.polling.interval_ms > 3_600_000 {
            return Err(invalid("interval_ms must be between 100 and 3600000"));
        }

        // A poll must finish its read before the next tick
        if self.serial.timeout_ms >= self.polling.interval_ms {
            return Err(invalid("timeout_ms must be shorter than polling interval_ms"));
        }

        if !self.relays.simulated && self.relays.gpio_root.is_empty() {
            return Err(invalid("gpio_root cannot be empty unless relays are simulated"));
        }

        let mut seen_pins = Vec::with_capacity(self.relays.pins.len());
        for &pin in &self.relays.pins {
            if seen_pins.contains(&pin) {
                return Err(invalid(format!("GPIO {} is used by more than one relay", pin)));
            }
            seen_pins.push(pin);
        }

        let mut seen_names: Vec<&str> = Vec::with_capacity(self.loads.len());
        for load in &self.loads {
            if load.name.trim().is_empty() || load.name.contains(char::is_whitespace) {
                return Err(invalid(format!("load name {:?} must be a single word", load.name)));
            }
            if seen_names.contains(&load.name.as_str()) {
                return Err(invalid(format!("load {} is defined twice", load.name)));
            }
            if load.relay >= self.relays.pins.len() {
                return Err(invalid(format!(
                    "load {} uses relay {} but only {} relays are configured",
                    load.name,
                    load.relay,
                    self.relays.pins.len()
                )));
            }
            seen_names.push(&load.name);
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyAMA0"

[polling]
interval_ms = 1000

[relays]
pins = [5, 6]
inverted = false
simulated = true

[[loads]]
name = "fridge"
relay = 0

[[loads]]
name = "fan"
relay = 1

[telemetry]
enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.relays.pins, vec![5, 6]);
        assert!(!config.relays.inverted);
        assert!(config.relays.simulated);
        assert_eq!(config.loads.len(), 2);
        assert_eq!(config.loads[1], LoadConfig { name: "fan".to_string(), relay: 1 });
        assert!(!config.telemetry.enabled);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.polling.interval_ms, 2000);
        assert_eq!(config.loads, default_loads());
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let config = Config::from_toml(include_str!("../config/default.toml")).unwrap();
        assert_eq!(config.serial.baud_rate, 19200);
        assert_eq!(config.polling.interval_ms, 2000);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/solar-bridge.toml");
        assert!(matches!(result, Err(SolarBridgeError::Io(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = Config::from_toml("[serial\nport = 1");
        assert!(matches!(result, Err(SolarBridgeError::Config(_))));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = create_valid_config();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = create_valid_config();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_not_shorter_than_interval() {
        let mut config = create_valid_config();
        config.serial.timeout_ms = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_short() {
        let mut config = create_valid_config();
        config.polling.interval_ms = 50;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_interval_too_long() {
        let mut config = create_valid_config();
        config.polling.interval_ms = 3_600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_pins() {
        let mut config = create_valid_config();
        config.relays.pins = vec![18, 23, 18];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_gpio_root_allowed_when_simulated() {
        let mut config = create_valid_config();
        config.relays.gpio_root = String::new();
        assert!(config.validate().is_err());

        config.relays.simulated = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_relay_out_of_range() {
        let mut config = create_valid_config();
        config.loads.push(LoadConfig { name: "pump".to_string(), relay: 4 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_load_name() {
        let mut config = create_valid_config();
        config.loads.push(LoadConfig { name: "fridge".to_string(), relay: 3 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_name_with_space() {
        let mut config = create_valid_config();
        config.loads[0].name = "big fridge".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = create_valid_config();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = create_valid_config();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyUSB0");
        assert_eq!(default_baud_rate(), 19200);
        assert_eq!(default_timeout_ms(), 100);
        assert_eq!(default_interval_ms(), 2000);
        assert_eq!(default_gpio_root(), "/sys/class/gpio");
        assert_eq!(default_relay_pins(), vec![18, 23, 24, 27]);
        assert!(default_inverted());
        assert!(default_telemetry_enabled());
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_max_records_per_file(), 10000);
        assert_eq!(default_max_files_to_keep(), 10);
        assert_eq!(default_log_level(), "info");
    }
}
