//! Transport layer for oximeter communication.
//!
//! The protocol core only needs a duplex byte stream with a bounded read
//! timeout and a way to discard stale input. Currently only USB/Serial is
//! implemented.

#[cfg(test)]
pub(crate) mod mock;
pub mod serial;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::error::Result;

/// Trait for transport implementations.
pub trait Transport: Send {
    /// Connects to the device.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Disconnects from the device.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Writes data to the device and flushes it.
    fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Reads a single byte.
    ///
    /// Resolves to `Ok(None)` when no byte arrived within the read timeout.
    fn read_byte(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<u8>>> + Send + '_>>;

    /// Discards any input received but not yet read.
    fn clear_input(&mut self) -> Result<()>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;
}

pub use serial::SerialTransport;
