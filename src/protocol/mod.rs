//! Protocol definitions for CMS50D+ communication.
//!
//! This module contains the low-level protocol types including:
//! - Package encoding/decoding
//! - Raw packet framing
//! - Package type definitions
//! - Command opcodes
//! - Measurement parsing

pub mod codec;
pub mod command;
pub mod framer;
pub mod packet;
pub mod parser;

pub use codec::{
    MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, MIN_PACKET_SIZE, Package, decode_package, encode_package,
    encode_package_padded, set_bit,
};
pub use command::CommandOpcode;
pub use framer::PacketFramer;
pub use packet::{NORMAL_DISCONNECT_REASONS, PackageType};
pub use parser::{
    encode_realtime, encode_storage, parse_realtime, parse_record, parse_storage,
    split_storage_multi,
};
