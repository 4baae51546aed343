//! Package encoding and decoding for the CMS50D+ protocol.
//!
//! Every byte on the wire reserves bit 7 as a synchronization marker: the
//! type byte has it clear, every following byte has it set. The data bit
//! displaced from each payload byte travels in the high byte:
//! ```text
//! ┌──────────┬────────────┬──────────────────────────┐
//! │  type    │ high byte  │   payload (bit 7 set)    │
//! │ 0xxxxxxx │ 1gfedcba   │   1 to 7 bytes           │
//! └──────────┴────────────┴──────────────────────────┘
//! ```
//! Bit `i` of the high byte holds bit 7 of payload byte `i`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FramingError;

/// Synchronization bit mask.
pub const SYNC_BIT: u8 = 0x80;

/// Minimum raw packet size (type + high byte + one payload byte).
pub const MIN_PACKET_SIZE: usize = 3;

/// Maximum raw packet size (type + high byte + seven payload bytes).
pub const MAX_PACKET_SIZE: usize = 9;

/// Maximum package payload size.
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - 2;

/// A decoded package: type code plus full 8-bit payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Package {
    /// Package type code (0-127).
    pub package_type: u8,
    /// Payload with bit 7 of every byte restored.
    pub payload: Vec<u8>,
}

impl Package {
    /// Creates a new package.
    #[must_use]
    pub fn new(package_type: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            package_type,
            payload: payload.into(),
        }
    }
}

/// Returns `byte` with bit `index` set to `value`.
#[must_use]
pub const fn set_bit(byte: u8, value: bool, index: u8) -> u8 {
    let mask = 1 << index;
    if value { byte | mask } else { byte & !mask }
}

/// Decodes a raw packet into a package.
///
/// # Errors
///
/// Returns a `FramingError` if:
/// - The packet is shorter than 3 or longer than 9 bytes
/// - The type byte has bit 7 set, or any later byte has it clear
pub fn decode_package(raw: &[u8]) -> Result<Package, FramingError> {
    if raw.len() < MIN_PACKET_SIZE {
        return Err(FramingError::TooShort(raw.len()));
    }
    if raw.len() > MAX_PACKET_SIZE {
        return Err(FramingError::TooLong(raw.len()));
    }

    if raw[0] & SYNC_BIT != 0 {
        return Err(FramingError::BadSyncBit {
            index: 0,
            byte: raw[0],
        });
    }
    // The high byte is checked like any payload byte
    if let Some((index, &byte)) = raw
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, b)| *b & SYNC_BIT == 0)
    {
        return Err(FramingError::BadSyncBit { index, byte });
    }

    let high_byte = raw[1];
    let payload = raw[2..]
        .iter()
        .enumerate()
        .map(|(idx, &byte)| set_bit(byte, high_byte & (1 << idx) != 0, 7))
        .collect();

    Ok(Package {
        package_type: raw[0],
        payload,
    })
}

/// Encodes a package into a raw packet without padding.
///
/// # Errors
///
/// Returns `FramingError::PayloadTooLong` if the payload exceeds 7 bytes.
pub fn encode_package(package_type: u8, payload: &[u8]) -> Result<Bytes, FramingError> {
    encode_package_padded(package_type, payload, 0, 0x00)
}

/// Encodes a package into a raw packet, right-padding the payload with
/// `padding_byte` up to `padding` bytes.
///
/// A `padding` of 0 disables padding.
///
/// # Errors
///
/// Returns a `FramingError` if:
/// - The payload exceeds 7 bytes
/// - `padding` is non-zero and shorter than the payload, or exceeds 7
pub fn encode_package_padded(
    package_type: u8,
    payload: &[u8],
    padding: usize,
    padding_byte: u8,
) -> Result<Bytes, FramingError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FramingError::PayloadTooLong(payload.len()));
    }

    let mut padded = payload.to_vec();
    if padding > 0 {
        if padding < payload.len() {
            return Err(FramingError::PaddingTooShort {
                padding,
                len: payload.len(),
            });
        }
        if padding > MAX_PAYLOAD_SIZE {
            return Err(FramingError::PaddingTooLong(padding));
        }
        padded.resize(padding, padding_byte);
    }

    let high_byte = padded
        .iter()
        .enumerate()
        .fold(SYNC_BIT, |high, (idx, &byte)| high | ((byte & SYNC_BIT) >> (7 - idx)));

    let mut buf = BytesMut::with_capacity(2 + padded.len());
    buf.put_u8(set_bit(package_type, false, 7));
    buf.put_u8(high_byte);
    for byte in padded {
        buf.put_u8(set_bit(byte, true, 7));
    }
    Ok(buf.freeze())
}
