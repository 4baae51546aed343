//! Device commands for CMS50D+ sessions.
//!
//! Commands are `Command` packages whose payload is the opcode followed by
//! optional parameters, always padded to 7 bytes with zeros.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use crate::error::FramingError;
use crate::protocol::{CommandOpcode, MAX_PAYLOAD_SIZE, PackageType, encode_package_padded};

/// Padding byte for command payloads.
pub const COMMAND_PADDING_BYTE: u8 = 0x00;

/// Default idle time after which a keepalive is sent.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Commands understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Start streaming realtime measurements.
    StartRealtime,
    /// Stop streaming realtime measurements.
    StopRealtime,
    /// Start transferring a stored segment.
    StartStorage {
        /// User whose recordings are transferred.
        user_index: u8,
        /// Recorded segment to transfer.
        segment: u8,
    },
    /// Stop transferring stored data.
    StopStorage,
    /// Keep the device from timing out.
    Keepalive,
}

impl Command {
    /// Returns the opcode of this command.
    #[must_use]
    pub const fn opcode(self) -> CommandOpcode {
        match self {
            Self::StartRealtime => CommandOpcode::StartRealtime,
            Self::StopRealtime => CommandOpcode::StopRealtime,
            Self::StartStorage { .. } => CommandOpcode::StartStorage,
            Self::StopStorage => CommandOpcode::StopStorage,
            Self::Keepalive => CommandOpcode::Keepalive,
        }
    }

    /// Encodes the command into a raw packet ready for the wire.
    pub fn encode(self) -> Result<Bytes, FramingError> {
        match self {
            Self::StartStorage {
                user_index,
                segment,
            } => encode_command(self.opcode().into(), &[user_index, segment]),
            _ => encode_command(self.opcode().into(), &[]),
        }
    }
}

/// Encodes an arbitrary command opcode with parameters.
///
/// # Errors
///
/// Returns `FramingError::PayloadTooLong` if opcode and parameters exceed
/// 7 bytes.
pub fn encode_command(opcode: u8, data: &[u8]) -> Result<Bytes, FramingError> {
    let mut payload = Vec::with_capacity(MAX_PAYLOAD_SIZE);
    payload.push(opcode);
    payload.extend_from_slice(data);
    encode_package_padded(
        PackageType::Command.into(),
        &payload,
        MAX_PAYLOAD_SIZE,
        COMMAND_PADDING_BYTE,
    )
}

/// Tracks when the last command went out so idle sessions can be kept alive.
#[derive(Debug, Clone)]
pub struct Keepalive {
    interval: Duration,
    last_sent: Instant,
}

impl Keepalive {
    /// Creates a tracker that considers a command sent right now.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: Instant::now(),
        }
    }

    /// Returns the keepalive interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true once more than the interval has passed since the last
    /// command.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_sent) > self.interval
    }

    /// Records that a command was sent.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = now;
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self::new(DEFAULT_KEEPALIVE_INTERVAL)
    }
}
