//! # Serial Communication Module
//!
//! Handles the serial link to the VE.Direct port of the charge controller.
//!
//! This module handles:
//! - Opening the serial port at 19,200 baud (8N1)
//! - Draining whatever the charger has sent since the last poll
//! - Bounding every read with a short timeout so a poll never blocks

pub mod port_trait;

use crate::error::{Result, SolarBridgeError};
use crate::vedirect::protocol::VEDIRECT_BAUD_RATE;
use bytes::{Bytes, BytesMut};
use port_trait::{SerialPortIO, TokioSerialPort};
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default VE.Direct device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // VE.Direct to USB cable
    "/dev/ttyAMA0", // Raspberry Pi UART header
];

/// Upper bound on bytes drained in one poll
pub const MAX_READ_BYTES: usize = 4096;

/// Size of a single read from the port
const READ_CHUNK_SIZE: usize = 256;

/// VE.Direct Serial Port Handler
///
/// Owns the connection to the charge controller.
pub struct VeDirectSerial {
    /// Serial port handle
    port: Box<dyn SerialPortIO>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
    /// Longest wait for the next chunk of data
    read_timeout: Duration,
    /// Scratch buffer reused across polls
    buffer: BytesMut,
}

impl std::fmt::Debug for VeDirectSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VeDirectSerial")
            .field("device_path", &self.device_path)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl VeDirectSerial {
    /// Open connection to the charge controller at one of the default paths
    ///
    /// # Errors
    ///
    /// Returns error if no VE.Direct device could be opened
    pub fn open(read_timeout: Duration) -> Result<Self> {
        Self::open_with_paths(DEFAULT_DEVICE_PATHS, VEDIRECT_BAUD_RATE, read_timeout)
    }

    /// Open connection to the charge controller with custom device paths
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyUSB0"])
    /// * `baud_rate` - Line speed, 19,200 for VE.Direct
    /// * `read_timeout` - Longest wait for the next chunk of data
    ///
    /// # Returns
    ///
    /// * `Result<VeDirectSerial>` - Connected serial port or error
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Successfully opened VE.Direct device at {}", path);
                    return Ok(Self::from_port(
                        Box::new(TokioSerialPort::new(port)),
                        path,
                        read_timeout,
                    ));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(SolarBridgeError::SerialPortNotFound(paths.join(", ")))
    }

    /// Wrap an already opened port
    pub fn from_port(port: Box<dyn SerialPortIO>, device_path: &str, read_timeout: Duration) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
            read_timeout,
            buffer: BytesMut::with_capacity(MAX_READ_BYTES),
        }
    }

    /// Open a specific serial port with VE.Direct settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| SolarBridgeError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Drain the bytes received since the last call
    ///
    /// Keeps reading until the line stays quiet for `read_timeout`, the
    /// stream ends, or [`MAX_READ_BYTES`] have been collected. An empty
    /// result means the charger sent nothing.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying read fails
    pub async fn read_available(&mut self) -> Result<Bytes> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        self.buffer.clear();

        while self.buffer.len() < MAX_READ_BYTES {
            match tokio::time::timeout(self.read_timeout, self.port.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    let room = MAX_READ_BYTES - self.buffer.len();
                    self.buffer.extend_from_slice(&chunk[..n.min(room)]);
                }
                Ok(Err(e)) => {
                    return Err(SolarBridgeError::Serial(format!(
                        "Failed to read from {}: {}",
                        self.device_path, e
                    )));
                }
                Err(_elapsed) => break,
            }
        }

        debug!("Read {} bytes from {}", self.buffer.len(), self.device_path);
        Ok(self.buffer.split().freeze())
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[cfg(test)]
mod tests {
    use super::port_trait::mocks::MockSerialPort;
    use super::port_trait::StreamPort;
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_constants() {
        assert_eq!(VEDIRECT_BAUD_RATE, 19_200);
        assert_eq!(DEFAULT_DEVICE_PATHS.len(), 2);
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyUSB0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = VeDirectSerial::open_with_paths(invalid_paths, VEDIRECT_BAUD_RATE, TIMEOUT);

        match result.unwrap_err() {
            SolarBridgeError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = VeDirectSerial::open_with_paths(empty_paths, VEDIRECT_BAUD_RATE, TIMEOUT);
        assert!(matches!(result, Err(SolarBridgeError::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = VeDirectSerial::open_port("/dev/nonexistent_serial_device_12345", VEDIRECT_BAUD_RATE);

        match result.unwrap_err() {
            SolarBridgeError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_available_collects_chunks() {
        let mock = MockSerialPort::new();
        mock.push_data(b"V\t12800\r\n");
        mock.push_data(b"I\t-350\r\n");
        let mut serial = VeDirectSerial::from_port(Box::new(mock), "mock", TIMEOUT);

        let data = serial.read_available().await.unwrap();
        assert_eq!(&data[..], b"V\t12800\r\nI\t-350\r\n");

        // Nothing more queued: quiet line yields an empty read
        let data = serial.read_available().await.unwrap();
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn test_read_available_propagates_errors() {
        let mock = MockSerialPort::new();
        mock.push_error(std::io::ErrorKind::BrokenPipe);
        let mut serial = VeDirectSerial::from_port(Box::new(mock), "mock", TIMEOUT);

        match serial.read_available().await {
            Err(SolarBridgeError::Serial(msg)) => assert!(msg.contains("mock")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_available_is_capped() {
        let mock = MockSerialPort::new();
        for _ in 0..(MAX_READ_BYTES / READ_CHUNK_SIZE + 4) {
            mock.push_data(&[b'x'; READ_CHUNK_SIZE]);
        }
        let mut serial = VeDirectSerial::from_port(Box::new(mock), "mock", TIMEOUT);

        let data = serial.read_available().await.unwrap();
        assert_eq!(data.len(), MAX_READ_BYTES);
    }

    #[tokio::test]
    async fn test_read_available_stops_at_end_of_stream() {
        let stream = tokio_test::io::Builder::new()
            .read(b"PID\t0xA060\r\n")
            .read(b"FW\t156\r\n")
            .build();
        let mut serial = VeDirectSerial::from_port(Box::new(StreamPort::new(stream)), "stream", TIMEOUT);

        let data = serial.read_available().await.unwrap();
        assert_eq!(&data[..], b"PID\t0xA060\r\nFW\t156\r\n");
    }

    // Integration test - only runs if a charge controller is connected
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_read_with_real_hardware() {
        match VeDirectSerial::open(Duration::from_millis(1100)) {
            Ok(mut serial) => {
                let data = serial.read_available().await.unwrap();
                println!("Read {} bytes from {}", data.len(), serial.device_path());
            }
            Err(_) => println!("No VE.Direct hardware detected (this is OK for CI/CD)"),
        }
    }
}
