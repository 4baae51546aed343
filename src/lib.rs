//! # cms50d
//!
//! A Rust client library for CMS50D+ pulse oximeters.
//!
//! This library talks to the oximeter over its USB serial bridge, streams live
//! measurements and transfers recordings stored on the device.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Sans-IO packet framing and decoding
//! - Guaranteed stop command on every session exit path
//! - Comprehensive error handling
//!
//! ## Quick Start
//!
//! ```no_run
//! use cms50d::Oximeter;
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cms50d::Error> {
//!     let mut oximeter = Oximeter::serial("/dev/ttyUSB0");
//!     oximeter.connect().await?;
//!
//!     let (tx, mut rx) = mpsc::channel(64);
//!     let cancel = CancellationToken::new();
//!     let printer = tokio::spawn(async move {
//!         while let Some(record) = rx.recv().await {
//!             println!("{record}");
//!         }
//!     });
//!
//!     oximeter.realtime_data(tx, &cancel).await?;
//!     let _ = printer.await;
//!
//!     oximeter.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Low-level protocol (package codec, packet framer, parsers)
//! - [`types`] - Measurement records and their field tables
//! - [`transport`] - Transport implementations (currently USB/Serial)
//! - [`commands`] - Device commands and keepalive timing
//! - [`client`] - High-level [`Oximeter`] client
//! - [`session`] - Realtime and storage streaming sessions

pub mod client;
pub mod commands;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{Oximeter, SessionConfig};
pub use commands::Command;
pub use error::{DecodeError, Error, FramingError, ProtocolError, Result};
pub use protocol::{CommandOpcode, Package, PackageType, PacketFramer};
pub use session::{SessionEnd, StorageRequest};
pub use transport::{
    SerialTransport,
    serial::{SerialConfig, list_ports},
};
pub use types::{
    FieldValue, MeasurementRecord, RealtimeField, RealtimeRecord, RecordField, RecordKind,
    StorageField, StorageRecord,
};
