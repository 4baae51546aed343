//! Main [`Oximeter`] client implementation.
//!
//! This module provides the [`Oximeter`] client that owns the transport,
//! sends commands and turns the incoming byte stream into packages.
//! Streaming sessions built on top of it live in [`crate::session`].

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::commands::{Command, DEFAULT_KEEPALIVE_INTERVAL, Keepalive, encode_command};
use crate::error::{Error, ProtocolError, Result};
use crate::protocol::{
    NORMAL_DISCONNECT_REASONS, Package, PackageType, PacketFramer, decode_package,
};
use crate::transport::{SerialTransport, Transport, serial::SerialConfig};

/// Default spacing between consecutive stored samples.
pub const DEFAULT_STORAGE_INTERVAL: Duration = Duration::from_secs(1);

/// Timing configuration for streaming sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Idle time after which a keepalive command is sent.
    pub keepalive_interval: Duration,
    /// Time between consecutive stored samples.
    pub storage_interval: Duration,
}

impl SessionConfig {
    /// Sets the keepalive interval.
    #[must_use]
    pub const fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the stored sample interval.
    #[must_use]
    pub const fn storage_interval(mut self, interval: Duration) -> Self {
        self.storage_interval = interval;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            storage_interval: DEFAULT_STORAGE_INTERVAL,
        }
    }
}

/// Client for communicating with a CMS50D+ pulse oximeter.
pub struct Oximeter<T> {
    transport: T,
    framer: PacketFramer,
    keepalive: Keepalive,
    storage_interval: Duration,
    input_ended: bool,
}

impl Oximeter<SerialTransport> {
    /// Creates a new client for a serial port.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0")
    ///
    /// # Returns
    ///
    /// A new client (not yet connected).
    #[must_use]
    pub fn serial(port: impl Into<String>) -> Self {
        Self::with_serial_config(SerialConfig::new(port))
    }

    /// Creates a new client with custom serial configuration.
    #[must_use]
    pub fn with_serial_config(config: SerialConfig) -> Self {
        Self::new(SerialTransport::new(config))
    }
}

impl<T: Transport> Oximeter<T> {
    /// Creates a new client with the given transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        let config = SessionConfig::default();
        Self {
            transport,
            framer: PacketFramer::new(),
            keepalive: Keepalive::new(config.keepalive_interval),
            storage_interval: config.storage_interval,
            input_ended: false,
        }
    }

    /// Applies session timing configuration.
    #[must_use]
    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.keepalive = Keepalive::new(config.keepalive_interval);
        self.storage_interval = config.storage_interval;
        self
    }

    /// Returns the spacing between consecutive stored samples.
    #[must_use]
    pub const fn storage_interval(&self) -> Duration {
        self.storage_interval
    }

    /// Opens the transport.
    pub async fn connect(&mut self) -> Result<()> {
        self.transport.connect().await
    }

    /// Closes the transport.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the client and returns the transport.
    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }

    // ==================== Commands ====================

    /// Sends a command to the device.
    ///
    /// Every command resets the keepalive timer.
    pub async fn send_command(&mut self, command: Command) -> Result<()> {
        tracing::debug!("sending {:?}", command);
        self.send_packet(command.encode()?).await
    }

    /// Sends an arbitrary opcode with parameters as a command package.
    pub async fn send_opcode(&mut self, opcode: u8, data: &[u8]) -> Result<()> {
        tracing::debug!("sending opcode 0x{opcode:02x}");
        self.send_packet(encode_command(opcode, data)?).await
    }

    async fn send_packet(&mut self, packet: Bytes) -> Result<()> {
        tracing::trace!("raw command: {}", hex::encode(&packet));
        self.transport.send(packet).await?;
        self.keepalive.mark_sent(Instant::now());
        Ok(())
    }

    /// Sends a keepalive if the keepalive interval has elapsed since the last
    /// command.
    ///
    /// Returns true if a keepalive was sent.
    pub async fn send_keepalive(&mut self) -> Result<bool> {
        if !self.keepalive.is_due(Instant::now()) {
            return Ok(false);
        }
        self.send_command(Command::Keepalive).await?;
        Ok(true)
    }

    /// Discards buffered input on both the transport and the framer.
    pub fn clear_input(&mut self) -> Result<()> {
        self.transport.clear_input()?;
        self.framer.clear();
        self.input_ended = false;
        Ok(())
    }

    // ==================== Packet Reads ====================

    /// Reads the next raw packet of an open-ended stream.
    ///
    /// A keepalive check runs before every byte read. Returns `Ok(None)` once
    /// the input has ended and the last packet was delivered.
    pub async fn next_packet(&mut self) -> Result<Option<Bytes>> {
        if self.input_ended {
            return Ok(None);
        }
        loop {
            self.send_keepalive().await?;
            match self.transport.read_byte().await? {
                Some(byte) => {
                    if let Some(packet) = self.framer.push(byte)? {
                        tracing::trace!("raw packet: {}", hex::encode(&packet));
                        return Ok(Some(packet));
                    }
                }
                None => {
                    self.input_ended = true;
                    let packet = self.framer.finish()?;
                    tracing::trace!("final raw packet: {}", hex::encode(&packet));
                    return Ok(Some(packet));
                }
            }
        }
    }

    /// Reads exactly `amount` raw packets.
    ///
    /// No keepalives are sent. A byte starting the packet after the last one
    /// stays buffered for the next read.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::TooFewPackets` if the input ends first.
    pub async fn read_packets(&mut self, amount: usize) -> Result<Vec<Bytes>> {
        let mut packets = Vec::with_capacity(amount);
        while packets.len() < amount {
            match self.transport.read_byte().await? {
                Some(byte) => {
                    if let Some(packet) = self.framer.push(byte)? {
                        packets.push(packet);
                    }
                }
                None => {
                    let packet = self.framer.finish()?;
                    packets.push(packet);
                    if packets.len() < amount {
                        return Err(ProtocolError::TooFewPackets {
                            expected: amount,
                            got: packets.len(),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(packets)
    }

    /// Reads and decodes the next package of an open-ended stream.
    ///
    /// A disconnect notice with a normal reason code ends the stream and
    /// yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::DisconnectReason` for any other reason code.
    pub async fn next_package(&mut self) -> Result<Option<Package>> {
        let Some(packet) = self.next_packet().await? else {
            return Ok(None);
        };
        let package = decode_package(&packet)?;

        if package.package_type == u8::from(PackageType::DisconnectNotice) {
            let reason = package.payload[0];
            self.input_ended = true;
            if NORMAL_DISCONNECT_REASONS.contains(&reason) {
                tracing::info!("device ended session (reason 0x{reason:02x})");
                return Ok(None);
            }
            return Err(Error::Protocol(ProtocolError::DisconnectReason(reason)));
        }

        Ok(Some(package))
    }
}
