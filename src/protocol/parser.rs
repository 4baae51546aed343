//! Measurement parsing for the CMS50D+ protocol.
//!
//! Maps decoded packages to measurement records and back. Bit 0 is the least
//! significant bit of each payload byte.

use chrono::NaiveDateTime;

use crate::error::DecodeError;
use crate::protocol::PackageType;
use crate::types::{MeasurementRecord, PI_INVALID, RealtimeRecord, RecordKind, StorageRecord};

/// Payload length of a multi-sample storage package (three 2-byte samples).
pub const STORAGE_MULTI_LEN: usize = 6;

/// Looks up the package type and checks the payload length of one record.
fn check_layout(
    package_type: u8,
    kind: RecordKind,
    payload: &[u8],
) -> Result<PackageType, DecodeError> {
    let pkg = PackageType::from_byte(package_type)
        .filter(|pkg| pkg.record_kind() == Some(kind))
        .ok_or(DecodeError::UnsupportedType(package_type))?;
    let expected = pkg
        .record_len()
        .ok_or(DecodeError::UnsupportedType(package_type))?;
    if payload.len() != expected {
        return Err(DecodeError::InvalidLength {
            package_type,
            expected,
            got: payload.len(),
        });
    }
    Ok(pkg)
}

/// Parses a realtime record.
///
/// Format:
/// ```text
/// [0] bits 0-3 signal strength, 4 searching too long, 5 low SpO2,
///     6 pulse beep, 7 probe error
/// [1] bits 0-6 pulse waveform, 7 searching pulse
/// [2] bits 0-3 bar graph, 4 PI valid, 5-7 reserved
/// [3] pulse rate
/// [4] SpO2
/// [5-6] PI (LE)
/// ```
pub fn parse_realtime(
    package_type: u8,
    payload: &[u8],
    time: NaiveDateTime,
) -> Result<RealtimeRecord, DecodeError> {
    check_layout(package_type, RecordKind::Realtime, payload)?;

    Ok(RealtimeRecord {
        time,
        package_type,
        signal_strength: payload[0] & 0x0f,
        searching_too_long: payload[0] & 0x10 != 0,
        low_spo2: payload[0] & 0x20 != 0,
        pulse_beep: payload[0] & 0x40 != 0,
        probe_error: payload[0] & 0x80 != 0,
        pulse_waveform: payload[1] & 0x7f,
        searching_pulse: payload[1] & 0x80 != 0,
        bar_graph: payload[2] & 0x0f,
        pi_valid: payload[2] & 0x10 != 0,
        reserved: (payload[2] & 0xe0) >> 5,
        pulse_rate: payload[3],
        spo2: payload[4],
        pi: u16::from_le_bytes([payload[5], payload[6]]),
    })
}

/// Encodes a realtime record into its 7-byte payload.
#[must_use]
pub fn encode_realtime(record: &RealtimeRecord) -> [u8; 7] {
    let mut payload = [0u8; 7];

    payload[0] = (record.signal_strength & 0x0f)
        | u8::from(record.searching_too_long) << 4
        | u8::from(record.low_spo2) << 5
        | u8::from(record.pulse_beep) << 6
        | u8::from(record.probe_error) << 7;

    payload[1] = (record.pulse_waveform & 0x7f) | u8::from(record.searching_pulse) << 7;

    payload[2] = (record.bar_graph & 0x0f)
        | u8::from(record.pi_valid) << 4
        | ((record.reserved << 5) & 0xe0);

    payload[3] = record.pulse_rate;
    payload[4] = record.spo2;
    payload[5..7].copy_from_slice(&record.pi.to_le_bytes());

    payload
}

/// Parses a storage record.
///
/// Format:
/// ```text
/// [0] SpO2
/// [1] pulse rate
/// [2-3] PI (LE), only for package types carrying a perfusion index
/// ```
pub fn parse_storage(
    package_type: u8,
    payload: &[u8],
    time: NaiveDateTime,
) -> Result<StorageRecord, DecodeError> {
    let pkg = check_layout(package_type, RecordKind::Storage, payload)?;

    let pi = pkg
        .has_pi()
        .then(|| u16::from_le_bytes([payload[2], payload[3]]));

    Ok(StorageRecord {
        time,
        package_type,
        spo2: payload[0],
        pulse_rate: payload[1],
        pi,
    })
}

/// Encodes a storage record into its payload (2 or 4 bytes).
///
/// The layout follows the package type: a perfusion index is written only
/// for types that carry one, as the invalid sentinel if the record has none.
#[must_use]
pub fn encode_storage(record: &StorageRecord) -> Vec<u8> {
    let mut payload = vec![record.spo2, record.pulse_rate];
    if record.pi_support() {
        let pi = record.pi.unwrap_or(PI_INVALID);
        payload.extend_from_slice(&pi.to_le_bytes());
    }
    payload
}

/// Parses a record of whichever kind the package type selects.
pub fn parse_record(
    package_type: u8,
    payload: &[u8],
    time: NaiveDateTime,
) -> Result<MeasurementRecord, DecodeError> {
    match PackageType::from_byte(package_type).and_then(PackageType::record_kind) {
        Some(RecordKind::Realtime) => parse_realtime(package_type, payload, time).map(Into::into),
        Some(RecordKind::Storage) => parse_storage(package_type, payload, time).map(Into::into),
        None => Err(DecodeError::UnsupportedType(package_type)),
    }
}

/// Splits a multi-sample storage payload into its three 2-byte sample slots.
///
/// A slot with a zero SpO2 or pulse rate byte holds no sample and yields
/// `None`. Slot order is preserved.
pub fn split_storage_multi(payload: &[u8]) -> Result<Vec<Option<&[u8]>>, DecodeError> {
    if payload.len() != STORAGE_MULTI_LEN {
        return Err(DecodeError::InvalidLength {
            package_type: PackageType::StorageMulti.into(),
            expected: STORAGE_MULTI_LEN,
            got: payload.len(),
        });
    }
    Ok(payload
        .chunks_exact(2)
        .map(|sample| (sample[0] != 0 && sample[1] != 0).then_some(sample))
        .collect())
}
