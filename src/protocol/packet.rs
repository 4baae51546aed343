//! Package type definitions for the CMS50D+ protocol.
//!
//! The package type is the first byte of every raw packet and selects the
//! payload layout that follows.

use crate::types::RecordKind;

/// Package types exchanged with the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PackageType {
    /// Realtime measurement (7 bytes).
    Realtime = 0x01,
    /// Stored measurement with perfusion index (4 bytes).
    StoragePi = 0x09,
    /// Device ends the session; first payload byte is the reason code.
    DisconnectNotice = 0x0D,
    /// Three stored measurements without perfusion index (3 x 2 bytes).
    StorageMulti = 0x0F,
    /// Command sent to the device (padded to 7 bytes).
    Command = 0x7D,
}

impl PackageType {
    /// Attempts to parse a package type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Realtime),
            0x09 => Some(Self::StoragePi),
            0x0D => Some(Self::DisconnectNotice),
            0x0F => Some(Self::StorageMulti),
            0x7D => Some(Self::Command),
            _ => None,
        }
    }

    /// Returns the record kind carried by this package type.
    #[must_use]
    pub const fn record_kind(self) -> Option<RecordKind> {
        match self {
            Self::Realtime => Some(RecordKind::Realtime),
            Self::StoragePi | Self::StorageMulti => Some(RecordKind::Storage),
            Self::DisconnectNotice | Self::Command => None,
        }
    }

    /// Returns the payload length of a single record of this type.
    ///
    /// For `StorageMulti` this is the length of one sub-reading.
    #[must_use]
    pub const fn record_len(self) -> Option<usize> {
        match self {
            Self::Realtime => Some(7),
            Self::StoragePi => Some(4),
            Self::StorageMulti => Some(2),
            Self::DisconnectNotice | Self::Command => None,
        }
    }

    /// Returns true if records of this type carry a perfusion index.
    #[must_use]
    pub const fn has_pi(self) -> bool {
        matches!(self, Self::Realtime | Self::StoragePi)
    }
}

impl From<PackageType> for u8 {
    fn from(pkg: PackageType) -> Self {
        pkg as Self
    }
}

/// Disconnect reason codes that end a session normally.
pub const NORMAL_DISCONNECT_REASONS: [u8; 2] = [0x00, 0x01];
