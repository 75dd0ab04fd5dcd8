//! # Relay Board
//!
//! Relay outputs and the named loads wired to them.
//!
//! The board used in the installation has active-low inputs: driving the
//! GPIO low energizes the relay. Set `inverted = true` for such boards.
//!
//! ## Usage
//!
//! ```
//! use solar_bridge::relay::board::{Relay, RelayBoard};
//! use solar_bridge::relay::pin::SimulatedPin;
//!
//! let relays = vec![Relay::new(Box::new(SimulatedPin::new()), true)?];
//! let mut board = RelayBoard::new(relays, vec![("fridge".to_string(), 0)])?;
//!
//! board.switch("fridge", true)?;
//! assert!(board.is_on("fridge")?);
//! # Ok::<(), solar_bridge::error::SolarBridgeError>(())
//! ```

use super::pin::{OutputPin, SimulatedPin, SysfsPin};
use crate::config::{LoadConfig, RelayConfig};
use crate::error::{Result, SolarBridgeError};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// One relay channel
pub struct Relay {
    pin: Box<dyn OutputPin>,
    inverted: bool,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("inverted", &self.inverted)
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Take ownership of `pin` and switch the relay off
    ///
    /// # Errors
    ///
    /// Returns error if the pin cannot be driven
    pub fn new(pin: Box<dyn OutputPin>, inverted: bool) -> Result<Self> {
        let mut relay = Self { pin, inverted };
        relay.off()?;
        Ok(relay)
    }

    pub fn on(&mut self) -> Result<()> {
        if self.inverted {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        }
    }

    pub fn off(&mut self) -> Result<()> {
        if self.inverted {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    pub fn set(&mut self, on: bool) -> Result<()> {
        if on {
            self.on()
        } else {
            self.off()
        }
    }

    pub fn is_on(&self) -> Result<bool> {
        Ok(self.pin.is_high()? != self.inverted)
    }
}

/// State of one named load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadState {
    pub name: String,
    pub relay: usize,
    pub on: bool,
}

/// Relay channels and the loads attached to them
#[derive(Debug)]
pub struct RelayBoard {
    relays: Vec<Relay>,
    loads: Vec<(String, usize)>,
}

impl RelayBoard {
    /// # Errors
    ///
    /// Returns error if a load refers to a relay that does not exist
    pub fn new(relays: Vec<Relay>, loads: Vec<(String, usize)>) -> Result<Self> {
        for (name, index) in &loads {
            if *index >= relays.len() {
                return Err(SolarBridgeError::Relay(format!(
                    "Load {} uses relay {} but the board has {} relays",
                    name,
                    index,
                    relays.len()
                )));
            }
        }
        Ok(Self { relays, loads })
    }

    /// Build the board described by the configuration
    ///
    /// With `simulated = true` no GPIO is touched.
    ///
    /// # Errors
    ///
    /// Returns error if a GPIO line cannot be configured
    pub fn from_config(config: &RelayConfig, loads: &[LoadConfig]) -> Result<Self> {
        let root = Path::new(&config.gpio_root);
        let mut relays = Vec::with_capacity(config.pins.len());
        for &number in &config.pins {
            let pin: Box<dyn OutputPin> = if config.simulated {
                Box::new(SimulatedPin::new())
            } else {
                Box::new(SysfsPin::open(root, number)?)
            };
            relays.push(Relay::new(pin, config.inverted)?);
        }

        let loads = loads.iter().map(|l| (l.name.clone(), l.relay)).collect();
        let board = Self::new(relays, loads)?;
        info!(
            "Relay board ready: {} relays, {} loads{}",
            board.relays.len(),
            board.loads.len(),
            if config.simulated { " (simulated)" } else { "" }
        );
        Ok(board)
    }

    fn relay_index(&self, load: &str) -> Result<usize> {
        self.loads
            .iter()
            .find(|(name, _)| name == load)
            .map(|(_, index)| *index)
            .ok_or_else(|| SolarBridgeError::UnknownLoad(load.to_string()))
    }

    /// Switch a named load on or off
    ///
    /// # Errors
    ///
    /// Returns error if the load is unknown or the pin cannot be driven
    pub fn switch(&mut self, load: &str, on: bool) -> Result<()> {
        let index = self.relay_index(load)?;
        self.relays[index].set(on)?;
        info!("Switched {} {}", load, if on { "on" } else { "off" });
        Ok(())
    }

    /// Whether a named load is currently powered
    pub fn is_on(&self, load: &str) -> Result<bool> {
        let index = self.relay_index(load)?;
        self.relays[index].is_on()
    }

    /// State of every configured load
    ///
    /// A relay whose level cannot be read is reported off.
    pub fn states(&self) -> Vec<LoadState> {
        self.loads
            .iter()
            .map(|(name, index)| {
                let on = self.relays[*index].is_on().unwrap_or_else(|e| {
                    warn!("Failed to read relay for {}: {}", name, e);
                    false
                });
                LoadState {
                    name: name.clone(),
                    relay: *index,
                    on,
                }
            })
            .collect()
    }

    /// Switch every relay off
    pub fn all_off(&mut self) -> Result<()> {
        for relay in &mut self.relays {
            relay.off()?;
        }
        Ok(())
    }
}

/// Request to switch a named load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCommand {
    pub load: String,
    pub on: bool,
}

impl FromStr for RelayCommand {
    type Err = SolarBridgeError;

    /// Parse commands of the form `on <load>` / `off <load>`
    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let on = match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("on") => true,
            Some("off") => false,
            _ => {
                return Err(SolarBridgeError::Relay(format!(
                    "Invalid command {:?}, expected 'on <load>' or 'off <load>'",
                    s.trim()
                )))
            }
        };
        let load = match (words.next(), words.next()) {
            (Some(load), None) => load.to_string(),
            _ => {
                return Err(SolarBridgeError::Relay(format!(
                    "Invalid command {:?}, expected exactly one load name",
                    s.trim()
                )))
            }
        };
        Ok(Self { load, on })
    }
}
