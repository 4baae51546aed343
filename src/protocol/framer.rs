//! Raw packet framing for the CMS50D+ byte stream.
//!
//! The device sends a continuous stream with no length prefix. A byte with
//! bit 7 clear starts a packet; bytes with bit 7 set continue it. A packet is
//! complete once the next start byte arrives or the input ends.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FramingError;
use crate::protocol::codec::{MAX_PACKET_SIZE, MIN_PACKET_SIZE, SYNC_BIT};

/// Byte-at-a-time raw packet framer.
#[derive(Debug, Default)]
pub struct PacketFramer {
    buffer: BytesMut,
    discarded: usize,
}

impl PacketFramer {
    /// Creates a new framer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_PACKET_SIZE),
            discarded: 0,
        }
    }

    /// Feeds one byte into the framer.
    ///
    /// Returns `Ok(Some(packet))` when the byte starts a new packet and thereby
    /// completes the one in progress, `Ok(None)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a `FramingError` if:
    /// - The completed packet has fewer than 3 bytes
    /// - The packet in progress would grow beyond 9 bytes
    pub fn push(&mut self, byte: u8) -> Result<Option<Bytes>, FramingError> {
        if byte & SYNC_BIT == 0 {
            let previous = std::mem::replace(
                &mut self.buffer,
                BytesMut::with_capacity(MAX_PACKET_SIZE),
            );
            self.buffer.put_u8(byte);
            if previous.is_empty() {
                return Ok(None);
            }
            return Self::complete(previous).map(Some);
        }

        if self.buffer.is_empty() {
            // Continuation byte without a start byte, e.g. mid-packet after a flush
            self.discarded += 1;
            tracing::trace!("discarding stray byte 0x{byte:02x}");
            return Ok(None);
        }
        if self.buffer.len() >= MAX_PACKET_SIZE {
            return Err(FramingError::TooManyBytes);
        }
        self.buffer.put_u8(byte);
        Ok(None)
    }

    /// Flushes the packet in progress at end of input.
    ///
    /// # Errors
    ///
    /// Returns `FramingError::TooFewBytes` if fewer than 3 bytes were
    /// accumulated, including when nothing was received at all.
    pub fn finish(&mut self) -> Result<Bytes, FramingError> {
        let packet = std::mem::take(&mut self.buffer);
        Self::complete(packet)
    }

    fn complete(packet: BytesMut) -> Result<Bytes, FramingError> {
        if packet.len() < MIN_PACKET_SIZE {
            return Err(FramingError::TooFewBytes(packet.len()));
        }
        Ok(packet.freeze())
    }

    /// Returns the number of bytes of the packet in progress.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns how many stray continuation bytes were dropped so far.
    #[must_use]
    pub const fn discarded(&self) -> usize {
        self.discarded
    }

    /// Drops the packet in progress.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
