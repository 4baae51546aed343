//! Serial/USB transport implementation.
//!
//! The CMS50D+ enumerates as a USB serial adapter and talks 8N1 with
//! software flow control.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Default baud rate for CMS50D+ devices.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default time to wait for a single byte.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Default serial port path.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Configuration for serial transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Time to wait for a byte before reporting end of input.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT)
    }
}

/// Serial transport for CMS50D+ communication.
pub struct SerialTransport {
    config: SerialConfig,
    stream: Option<BufReader<SerialStream>>,
}

impl SerialTransport {
    /// Creates a new serial transport with the given configuration.
    #[must_use]
    pub const fn new(config: SerialConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    /// Creates a new serial transport for the given port with default settings.
    #[must_use]
    pub fn with_port(port: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(port))
    }

    /// Returns the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.stream.is_some() {
                return Ok(());
            }

            tracing::info!("connecting to serial port: {}", self.config.port);

            let stream = tokio_serial::new(&self.config.port, self.config.baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::Software)
                .timeout(self.config.read_timeout)
                .open_native_async()
                .map_err(Error::Serial)?;

            self.stream = Some(BufReader::new(stream));

            tracing::info!("connected to serial port");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.stream.take().is_some() {
                tracing::info!("disconnected from serial port");
            }
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

            tracing::trace!("sending {} bytes", data.len());

            // BufReader passes writes through to the port
            stream.write_all(&data).await.map_err(Error::Io)?;
            stream.flush().await.map_err(Error::Io)?;

            Ok(())
        })
    }

    fn read_byte(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<u8>>> + Send + '_>> {
        let timeout = self.config.read_timeout;
        Box::pin(async move {
            let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

            match tokio::time::timeout(timeout, stream.read_u8()).await {
                Ok(Ok(byte)) => Ok(Some(byte)),
                Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
                Ok(Err(e)) => {
                    tracing::error!("serial read error: {}", e);
                    Err(Error::Io(e))
                }
                Err(_) => Ok(None),
            }
        })
    }

    fn clear_input(&mut self) -> Result<()> {
        let Some(reader) = self.stream.take() else {
            return Err(Error::NotConnected);
        };

        // Drop bytes buffered on our side as well as in the driver
        let buffered = reader.buffer().len();
        let stream = reader.into_inner();
        let cleared = stream.clear(ClearBuffer::Input);
        self.stream = Some(BufReader::new(stream));
        cleared.map_err(Error::Serial)?;

        if buffered > 0 {
            tracing::debug!("discarded {} buffered bytes", buffered);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
