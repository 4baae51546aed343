//! Data types for oximeter measurements.
//!
//! This module contains the measurement records and the static field tables
//! describing their export schema.

pub mod fields;
pub mod record;

pub use fields::{FieldDescriptor, FieldKind, FieldValue, RealtimeField, RecordField, StorageField};
pub use record::{
    MeasurementRecord, PI_INVALID, PULSE_RATE_INVALID, RealtimeRecord, RecordKind, SPO2_INVALID,
    StorageRecord,
};
