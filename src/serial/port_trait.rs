//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Read whatever bytes are available into `buf`
    ///
    /// Returns `Ok(0)` when the stream has ended.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Wrapper around any async byte stream that implements SerialPortIO
///
/// In production the stream is a `tokio_serial::SerialStream`; tests plug in
/// `tokio_test::io::Mock`.
pub struct StreamPort<R> {
    stream: R,
}

impl<R> StreamPort<R> {
    pub fn new(stream: R) -> Self {
        Self { stream }
    }
}

/// Port type used against real hardware
pub type TokioSerialPort = StreamPort<tokio_serial::SerialStream>;

#[async_trait]
impl<R> SerialPortIO for StreamPort<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }
}
