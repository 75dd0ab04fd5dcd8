//! # Error Types
//!
//! Custom error types for Solar Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Solar Bridge
#[derive(Debug, Error)]
pub enum SolarBridgeError {
    /// Serial link errors (open, read)
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No VE.Direct device found (tried: {0})")]
    SerialPortNotFound(String),

    /// A poll cycle could not complete
    #[error("Update failed: {0}")]
    UpdateFailed(String),

    /// GPIO / relay errors
    #[error("Relay error: {0}")]
    Relay(String),

    /// Command referenced a load that is not configured
    #[error("Unknown load: {0}")]
    UnknownLoad(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Telemetry serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Solar Bridge
pub type Result<T> = std::result::Result<T, SolarBridgeError>;
