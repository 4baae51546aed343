//! Error types for the cms50d library.

use thiserror::Error;

/// The main error type for oximeter operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error from the byte transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Packet framing or package encoding error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Package could not be mapped to a measurement record.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The device violated the streaming protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// Session configuration the client cannot apply.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Errors raised while splitting the byte stream into raw packets or while
/// converting between packages and raw packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// Raw packet shorter than type byte, high byte and one payload byte.
    #[error("raw packet too short: need at least 3 bytes, got {0}")]
    TooShort(usize),

    /// Raw packet longer than type byte, high byte and seven payload bytes.
    #[error("raw packet too long: at most 9 bytes, got {0}")]
    TooLong(usize),

    /// A byte carries the wrong synchronization bit for its position.
    #[error("invalid synchronization bit in byte {index} (0x{byte:02x})")]
    BadSyncBit { index: usize, byte: u8 },

    /// Package payload does not fit into a raw packet.
    #[error("package too long to encode: at most 7 bytes, got {0}")]
    PayloadTooLong(usize),

    /// Requested padding is shorter than the payload.
    #[error("padding too short: {padding} < payload length {len}")]
    PaddingTooShort { padding: usize, len: usize },

    /// Requested padding exceeds the maximum payload length.
    #[error("padding too long: {0} > 7")]
    PaddingTooLong(usize),

    /// Stream delivered a packet with fewer than 3 bytes.
    #[error("received too few bytes for a packet: {0}")]
    TooFewBytes(usize),

    /// Stream delivered more than 9 bytes without a new start byte.
    #[error("received too many bytes for a packet")]
    TooManyBytes,
}

/// Errors raised while mapping packages to measurement records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Package type code has no record layout.
    #[error("unsupported package type 0x{0:02x}")]
    UnsupportedType(u8),

    /// Payload length does not match the layout of the package type.
    #[error("invalid package length for type 0x{package_type:02x}: expected {expected}, got {got}")]
    InvalidLength {
        package_type: u8,
        expected: usize,
        got: usize,
    },

    /// An export column value could not be parsed.
    #[error("invalid value for column {column}: {value:?}")]
    InvalidField { column: &'static str, value: String },
}

/// Errors raised by the device-side streaming protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Device ended the session with an unrecognized reason code.
    #[error("device disconnected with reason code 0x{0:02x}")]
    DisconnectReason(u8),

    /// Input ended before the requested number of packets arrived.
    #[error("received too few packets: expected {expected}, got {got}")]
    TooFewPackets { expected: usize, got: usize },
}

/// Result type alias for oximeter operations.
pub type Result<T> = std::result::Result<T, Error>;
