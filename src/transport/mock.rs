//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::{Package, decode_package};
use crate::transport::Transport;

/// Transport that replays scripted bytes and records everything written.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    /// Bytes already waiting before the session starts; dropped by `clear_input`.
    pub stale: VecDeque<u8>,
    /// Bytes the device sends during the session.
    pub incoming: VecDeque<u8>,
    /// Raw packets written to the device.
    pub sent: Vec<Bytes>,
    /// Simulated time each read takes.
    pub read_delay: Option<Duration>,
    /// Fail with an I/O error once `incoming` is exhausted instead of timing out.
    pub fail_at_end: bool,
    /// Fail every write.
    pub fail_send: bool,
    pub clears: usize,
    connected: bool,
}

impl MockTransport {
    pub fn new(incoming: impl IntoIterator<Item = u8>) -> Self {
        Self {
            incoming: incoming.into_iter().collect(),
            connected: true,
            ..Self::default()
        }
    }

    /// Transport on which the device never sends anything.
    pub fn idle() -> Self {
        Self::new(std::iter::empty())
    }

    /// Decodes every written packet.
    pub fn sent_packages(&self) -> Vec<Package> {
        self.sent
            .iter()
            .map(|raw| decode_package(raw).unwrap())
            .collect()
    }

    /// Returns the opcode of every written command.
    pub fn sent_opcodes(&self) -> Vec<u8> {
        self.sent_packages()
            .iter()
            .map(|package| package.payload[0])
            .collect()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.connected = false;
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(Error::NotConnected);
            }
            if self.fail_send {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mock write failure",
                )));
            }
            self.sent.push(data);
            Ok(())
        })
    }

    fn read_byte(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<u8>>> + Send + '_>> {
        Box::pin(async move {
            if !self.connected {
                return Err(Error::NotConnected);
            }
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(byte) = self.stale.pop_front() {
                return Ok(Some(byte));
            }
            match self.incoming.pop_front() {
                Some(byte) => Ok(Some(byte)),
                None if self.fail_at_end => Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "mock port closed",
                ))),
                None => Ok(None),
            }
        })
    }

    fn clear_input(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.stale.clear();
        self.clears += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
