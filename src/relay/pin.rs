//! # GPIO Output Pins
//!
//! Digital outputs driving the relay coils.

use crate::error::{Result, SolarBridgeError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A digital output line
#[cfg_attr(test, mockall::automock)]
pub trait OutputPin: Send {
    /// Drive the line high
    fn set_high(&mut self) -> Result<()>;

    /// Drive the line low
    fn set_low(&mut self) -> Result<()>;

    /// Current level of the line
    fn is_high(&self) -> Result<bool>;
}

/// GPIO line exposed through the Linux sysfs interface
///
/// `root` is normally `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsPin {
    number: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `number` under `root` and configure it as an output
    ///
    /// # Errors
    ///
    /// Returns error if the pin cannot be exported or configured
    pub fn open(root: &Path, number: u32) -> Result<Self> {
        let pin_dir = root.join(format!("gpio{}", number));
        if !pin_dir.exists() {
            fs::write(root.join("export"), number.to_string()).map_err(|e| {
                SolarBridgeError::Relay(format!("Failed to export GPIO {}: {}", number, e))
            })?;
        }

        fs::write(pin_dir.join("direction"), "out").map_err(|e| {
            SolarBridgeError::Relay(format!("Failed to configure GPIO {}: {}", number, e))
        })?;
        debug!("GPIO {} configured as output", number);

        Ok(Self {
            number,
            value_path: pin_dir.join("value"),
        })
    }

    fn write(&self, level: &str) -> Result<()> {
        fs::write(&self.value_path, level).map_err(|e| {
            SolarBridgeError::Relay(format!("Failed to write GPIO {}: {}", self.number, e))
        })
    }
}

impl OutputPin for SysfsPin {
    fn set_high(&mut self) -> Result<()> {
        self.write("1")
    }

    fn set_low(&mut self) -> Result<()> {
        self.write("0")
    }

    fn is_high(&self) -> Result<bool> {
        let value = fs::read_to_string(&self.value_path).map_err(|e| {
            SolarBridgeError::Relay(format!("Failed to read GPIO {}: {}", self.number, e))
        })?;
        Ok(value.trim() == "1")
    }
}

/// In-memory pin used when no GPIO hardware is available
#[derive(Debug, Default)]
pub struct SimulatedPin {
    high: bool,
}

impl SimulatedPin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputPin for SimulatedPin {
    fn set_high(&mut self) -> Result<()> {
        self.high = true;
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        self.high = false;
        Ok(())
    }

    fn is_high(&self) -> Result<bool> {
        Ok(self.high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_sysfs(numbers: &[u32]) -> TempDir {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("export"), "").unwrap();
        for n in numbers {
            let dir = root.path().join(format!("gpio{}", n));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("direction"), "in").unwrap();
            fs::write(dir.join("value"), "0").unwrap();
        }
        root
    }

    #[test]
    fn test_sysfs_pin_configures_output() {
        let root = fake_sysfs(&[18]);
        SysfsPin::open(root.path(), 18).unwrap();

        let direction = fs::read_to_string(root.path().join("gpio18/direction")).unwrap();
        assert_eq!(direction, "out");
    }

    #[test]
    fn test_sysfs_pin_writes_levels() {
        let root = fake_sysfs(&[23]);
        let mut pin = SysfsPin::open(root.path(), 23).unwrap();

        pin.set_high().unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio23/value")).unwrap(), "1");
        assert!(pin.is_high().unwrap());

        pin.set_low().unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio23/value")).unwrap(), "0");
        assert!(!pin.is_high().unwrap());
    }

    #[test]
    fn test_sysfs_pin_missing_root_fails() {
        let result = SysfsPin::open(Path::new("/nonexistent/gpio/root"), 24);
        match result {
            Err(SolarBridgeError::Relay(msg)) => assert!(msg.contains("24")),
            other => panic!("Expected Relay error, got: {:?}", other),
        }
    }

    #[test]
    fn test_simulated_pin() {
        let mut pin = SimulatedPin::new();
        assert!(!pin.is_high().unwrap());
        pin.set_high().unwrap();
        assert!(pin.is_high().unwrap());
        pin.set_low().unwrap();
        assert!(!pin.is_high().unwrap());
    }
}
