//! Measurement record types.

use std::fmt;

use chrono::{Local, NaiveDateTime};

use crate::error::DecodeError;
use crate::protocol::{PackageType, parser};
use crate::types::fields::{
    FieldDescriptor, FieldKind, FieldValue, RealtimeField, RecordField, StorageField,
};

/// Sentinel SpO2 value meaning "no valid reading".
pub const SPO2_INVALID: u8 = 0x7f;

/// Sentinel pulse rate meaning "no valid reading".
pub const PULSE_RATE_INVALID: u8 = 0xff;

/// Sentinel perfusion index meaning "no valid reading".
pub const PI_INVALID: u16 = 0xffff;

/// Kind of measurement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Live reading streamed while the finger is in the device.
    Realtime,
    /// Reading recorded on the device and transferred afterwards.
    Storage,
}

impl RecordKind {
    /// Returns the data type name used in the export schema.
    #[must_use]
    pub const fn datatype(self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Storage => "storage",
        }
    }

    /// Parses a data type name.
    #[must_use]
    pub fn from_datatype(name: &str) -> Option<Self> {
        match name {
            "realtime" => Some(Self::Realtime),
            "storage" => Some(Self::Storage),
            _ => None,
        }
    }

    /// Returns the export columns of this kind in order.
    #[must_use]
    pub fn columns(self) -> Vec<&'static str> {
        match self {
            Self::Realtime => RealtimeField::columns(),
            Self::Storage => StorageField::columns(),
        }
    }
}

/// A realtime measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeRecord {
    /// Time the package was decoded.
    pub time: NaiveDateTime,
    /// Originating package type code.
    pub package_type: u8,
    /// Oxygen saturation in percent (127 = invalid).
    pub spo2: u8,
    /// Pulse rate in bpm (255 = invalid).
    pub pulse_rate: u8,
    /// Pulse waveform amplitude (0-127).
    pub pulse_waveform: u8,
    /// Beep on this pulse.
    pub pulse_beep: bool,
    /// Bar graph level (0-15).
    pub bar_graph: u8,
    /// Perfusion index (65535 = invalid).
    pub pi: u16,
    /// Signal strength (0-15).
    pub signal_strength: u8,
    /// Probe error.
    pub probe_error: bool,
    /// Low SpO2 alarm.
    pub low_spo2: bool,
    /// Searching for pulse for too long.
    pub searching_too_long: bool,
    /// Searching for pulse.
    pub searching_pulse: bool,
    /// Device flags the perfusion index as valid.
    pub pi_valid: bool,
    /// Reserved bits (0-7).
    pub reserved: u8,
}

impl RealtimeRecord {
    /// Returns true if SpO2 holds the invalid sentinel.
    #[must_use]
    pub const fn spo2_invalid(&self) -> bool {
        self.spo2 == SPO2_INVALID
    }

    /// Returns true if the pulse rate holds the invalid sentinel.
    #[must_use]
    pub const fn pulse_rate_invalid(&self) -> bool {
        self.pulse_rate == PULSE_RATE_INVALID
    }

    /// Returns true if the perfusion index holds the invalid sentinel.
    #[must_use]
    pub const fn pi_invalid(&self) -> bool {
        self.pi == PI_INVALID
    }

    /// Encodes the record back into its package payload.
    #[must_use]
    pub fn to_package(&self) -> Vec<u8> {
        parser::encode_realtime(self).to_vec()
    }

    /// Returns the value of a single field.
    #[must_use]
    pub fn get(&self, field: RealtimeField) -> FieldValue {
        match field {
            RealtimeField::Time => FieldValue::Time(self.time),
            RealtimeField::SpO2 => FieldValue::Integer(self.spo2.into()),
            RealtimeField::PulseRate => FieldValue::Integer(self.pulse_rate.into()),
            RealtimeField::PulseWaveform => FieldValue::Integer(self.pulse_waveform.into()),
            RealtimeField::PulseBeep => FieldValue::Boolean(self.pulse_beep),
            RealtimeField::BarGraph => FieldValue::Integer(self.bar_graph.into()),
            RealtimeField::Pi => FieldValue::Integer(self.pi.into()),
            RealtimeField::SignalStrength => FieldValue::Integer(self.signal_strength.into()),
            RealtimeField::ProbeError => FieldValue::Boolean(self.probe_error),
            RealtimeField::LowSpO2 => FieldValue::Boolean(self.low_spo2),
            RealtimeField::SearchingTooLong => FieldValue::Boolean(self.searching_too_long),
            RealtimeField::SearchingPulse => FieldValue::Boolean(self.searching_pulse),
            RealtimeField::SpO2Invalid => FieldValue::Boolean(self.spo2_invalid()),
            RealtimeField::PulseRateInvalid => FieldValue::Boolean(self.pulse_rate_invalid()),
            RealtimeField::PiValid => FieldValue::Boolean(self.pi_valid),
            RealtimeField::PiInvalid => FieldValue::Boolean(self.pi_invalid()),
            RealtimeField::Reserved => FieldValue::Integer(self.reserved.into()),
            RealtimeField::DataType => FieldValue::Text(RecordKind::Realtime.datatype()),
            RealtimeField::PackageType => FieldValue::Integer(self.package_type.into()),
        }
    }

    /// Sets a single field.
    ///
    /// Derived fields (invalid flags, data type) are ignored.
    pub fn set(&mut self, field: RealtimeField, value: FieldValue) -> Result<(), DecodeError> {
        let descriptor = field.descriptor();
        if descriptor.derived {
            return Ok(());
        }
        let column = descriptor.column;
        let value = value.checked(&descriptor)?;
        match field {
            RealtimeField::Time => self.time = value.time(column)?,
            RealtimeField::SpO2 => self.spo2 = value.integer(column)?,
            RealtimeField::PulseRate => self.pulse_rate = value.integer(column)?,
            RealtimeField::PulseWaveform => self.pulse_waveform = value.integer(column)?,
            RealtimeField::PulseBeep => self.pulse_beep = value.boolean(column)?,
            RealtimeField::BarGraph => self.bar_graph = value.integer(column)?,
            RealtimeField::Pi => self.pi = value.integer(column)?,
            RealtimeField::SignalStrength => self.signal_strength = value.integer(column)?,
            RealtimeField::ProbeError => self.probe_error = value.boolean(column)?,
            RealtimeField::LowSpO2 => self.low_spo2 = value.boolean(column)?,
            RealtimeField::SearchingTooLong => self.searching_too_long = value.boolean(column)?,
            RealtimeField::SearchingPulse => self.searching_pulse = value.boolean(column)?,
            RealtimeField::PiValid => self.pi_valid = value.boolean(column)?,
            RealtimeField::Reserved => self.reserved = value.integer(column)?,
            RealtimeField::PackageType => {
                let package_type: u8 = value.integer(column)?;
                if PackageType::from_byte(package_type) != Some(PackageType::Realtime) {
                    return Err(DecodeError::UnsupportedType(package_type));
                }
                self.package_type = package_type;
            }
            RealtimeField::SpO2Invalid
            | RealtimeField::PulseRateInvalid
            | RealtimeField::PiInvalid
            | RealtimeField::DataType => {}
        }
        Ok(())
    }

    /// Returns (column, value) pairs in export order.
    #[must_use]
    pub fn columns(&self) -> Vec<(&'static str, FieldValue)> {
        RealtimeField::ALL
            .iter()
            .map(|&field| (field.column(), self.get(field)))
            .collect()
    }

    /// Rebuilds a record from exported (column, text) pairs.
    ///
    /// Unknown columns are ignored; missing columns keep the value of an
    /// all-zero package.
    pub fn from_columns<'a>(
        rows: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, DecodeError> {
        let mut record = parser::parse_realtime(
            PackageType::Realtime.into(),
            &[0; 7],
            Local::now().naive_local(),
        )?;
        for (column, text) in rows {
            if let Some(field) = RealtimeField::from_column(column) {
                let descriptor = field.descriptor();
                if descriptor.derived {
                    continue;
                }
                let value = FieldValue::parse(descriptor.column, descriptor.kind, text)?;
                record.set(field, value)?;
            }
        }
        Ok(record)
    }
}

impl fmt::Display for RealtimeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, RealtimeField::ALL, |field| self.get(field))
    }
}

/// A measurement transferred from device storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    /// Time assigned from the transfer start time and sample interval.
    pub time: NaiveDateTime,
    /// Originating package type code.
    pub package_type: u8,
    /// Oxygen saturation in percent (127 = invalid).
    pub spo2: u8,
    /// Pulse rate in bpm (255 = invalid).
    pub pulse_rate: u8,
    /// Perfusion index, `None` when the package type carries none.
    ///
    /// Only meaningful when [`StorageRecord::pi_support`] holds; encoding
    /// ignores it otherwise.
    pub pi: Option<u16>,
}

impl StorageRecord {
    /// Returns true if the originating package type carries a perfusion index.
    #[must_use]
    pub fn pi_support(&self) -> bool {
        PackageType::from_byte(self.package_type).is_some_and(PackageType::has_pi)
    }

    /// Returns true if SpO2 holds the invalid sentinel.
    #[must_use]
    pub const fn spo2_invalid(&self) -> bool {
        self.spo2 == SPO2_INVALID
    }

    /// Returns true if the pulse rate holds the invalid sentinel.
    #[must_use]
    pub const fn pulse_rate_invalid(&self) -> bool {
        self.pulse_rate == PULSE_RATE_INVALID
    }

    /// Returns whether the perfusion index holds the invalid sentinel, or
    /// `None` when the record carries no perfusion index.
    #[must_use]
    pub fn pi_invalid(&self) -> Option<bool> {
        self.pi.map(|pi| pi == PI_INVALID)
    }

    /// Encodes the record back into its package payload.
    #[must_use]
    pub fn to_package(&self) -> Vec<u8> {
        parser::encode_storage(self)
    }

    /// Returns the value of a single field.
    #[must_use]
    pub fn get(&self, field: StorageField) -> FieldValue {
        match field {
            StorageField::Time => FieldValue::Time(self.time),
            StorageField::SpO2 => FieldValue::Integer(self.spo2.into()),
            StorageField::PulseRate => FieldValue::Integer(self.pulse_rate.into()),
            StorageField::Pi => self
                .pi
                .map_or(FieldValue::NotApplicable, |pi| FieldValue::Integer(pi.into())),
            StorageField::PiSupport => FieldValue::Boolean(self.pi_support()),
            StorageField::PulseRateInvalid => FieldValue::Boolean(self.pulse_rate_invalid()),
            StorageField::SpO2Invalid => FieldValue::Boolean(self.spo2_invalid()),
            StorageField::PiInvalid => self
                .pi_invalid()
                .map_or(FieldValue::NotApplicable, FieldValue::Boolean),
            StorageField::DataType => FieldValue::Text(RecordKind::Storage.datatype()),
            StorageField::PackageType => FieldValue::Integer(self.package_type.into()),
        }
    }

    /// Sets a single field.
    ///
    /// Derived fields (support and invalid flags, data type) are ignored.
    /// The perfusion index only applies when the package type carries one;
    /// changing the package type adds or drops it accordingly.
    pub fn set(&mut self, field: StorageField, value: FieldValue) -> Result<(), DecodeError> {
        let descriptor = field.descriptor();
        if descriptor.derived {
            return Ok(());
        }
        let column = descriptor.column;
        let value = value.checked(&descriptor)?;
        match field {
            StorageField::Time => self.time = value.time(column)?,
            StorageField::SpO2 => self.spo2 = value.integer(column)?,
            StorageField::PulseRate => self.pulse_rate = value.integer(column)?,
            StorageField::Pi => {
                self.pi = if self.pi_support() {
                    Some(value.integer(column)?)
                } else {
                    None
                };
            }
            StorageField::PackageType => {
                let package_type: u8 = value.integer(column)?;
                match PackageType::from_byte(package_type) {
                    Some(PackageType::StoragePi) => {
                        self.pi.get_or_insert(0);
                    }
                    Some(PackageType::StorageMulti) => self.pi = None,
                    _ => return Err(DecodeError::UnsupportedType(package_type)),
                }
                self.package_type = package_type;
            }
            StorageField::PiSupport
            | StorageField::PulseRateInvalid
            | StorageField::SpO2Invalid
            | StorageField::PiInvalid
            | StorageField::DataType => {}
        }
        Ok(())
    }

    /// Returns (column, value) pairs in export order.
    #[must_use]
    pub fn columns(&self) -> Vec<(&'static str, FieldValue)> {
        StorageField::ALL
            .iter()
            .map(|&field| (field.column(), self.get(field)))
            .collect()
    }

    /// Rebuilds a record from exported (column, text) pairs.
    ///
    /// The package type column is applied first since it decides whether a
    /// perfusion index applies.
    pub fn from_columns<'a>(
        rows: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, DecodeError> {
        let mut record = Self {
            time: Local::now().naive_local(),
            package_type: PackageType::StorageMulti.into(),
            spo2: 0,
            pulse_rate: 0,
            pi: None,
        };
        let mut rows: Vec<(StorageField, &str)> = rows
            .into_iter()
            .filter_map(|(column, text)| StorageField::from_column(column).map(|f| (f, text)))
            .filter(|(field, _)| !field.descriptor().derived)
            .collect();
        rows.sort_by_key(|(field, _)| *field != StorageField::PackageType);

        for (field, text) in rows {
            let descriptor = field.descriptor();
            let value = FieldValue::parse(descriptor.column, descriptor.kind, text)?;
            record.set(field, value)?;
        }
        Ok(record)
    }
}

impl fmt::Display for StorageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, StorageField::ALL, |field| self.get(field))
    }
}

/// A decoded measurement of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementRecord {
    /// Realtime measurement.
    Realtime(RealtimeRecord),
    /// Stored measurement.
    Storage(StorageRecord),
}

impl MeasurementRecord {
    /// Returns the record kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Realtime(_) => RecordKind::Realtime,
            Self::Storage(_) => RecordKind::Storage,
        }
    }

    /// Returns the record timestamp.
    #[must_use]
    pub const fn time(&self) -> NaiveDateTime {
        match self {
            Self::Realtime(r) => r.time,
            Self::Storage(r) => r.time,
        }
    }

    /// Returns the originating package type code.
    #[must_use]
    pub const fn package_type(&self) -> u8 {
        match self {
            Self::Realtime(r) => r.package_type,
            Self::Storage(r) => r.package_type,
        }
    }

    /// Encodes the record back into its package payload.
    #[must_use]
    pub fn to_package(&self) -> Vec<u8> {
        match self {
            Self::Realtime(r) => r.to_package(),
            Self::Storage(r) => r.to_package(),
        }
    }

    /// Returns (column, value) pairs in export order.
    #[must_use]
    pub fn columns(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            Self::Realtime(r) => r.columns(),
            Self::Storage(r) => r.columns(),
        }
    }

    /// Rebuilds a record from exported (column, text) pairs, using the
    /// `DataType` column to pick the record kind.
    pub fn from_columns<'a>(
        rows: impl IntoIterator<Item = (&'a str, &'a str)> + Clone,
    ) -> Result<Self, DecodeError> {
        let datatype = rows
            .clone()
            .into_iter()
            .find_map(|(column, text)| (column == "DataType").then_some(text))
            .unwrap_or_default();
        match RecordKind::from_datatype(datatype.trim()) {
            Some(RecordKind::Realtime) => RealtimeRecord::from_columns(rows).map(Self::Realtime),
            Some(RecordKind::Storage) => StorageRecord::from_columns(rows).map(Self::Storage),
            None => Err(DecodeError::InvalidField {
                column: "DataType",
                value: datatype.to_owned(),
            }),
        }
    }
}

impl From<RealtimeRecord> for MeasurementRecord {
    fn from(record: RealtimeRecord) -> Self {
        Self::Realtime(record)
    }
}

impl From<StorageRecord> for MeasurementRecord {
    fn from(record: StorageRecord) -> Self {
        Self::Storage(record)
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Realtime(r) => r.fmt(f),
            Self::Storage(r) => r.fmt(f),
        }
    }
}

fn write_fields<F: RecordField>(
    f: &mut fmt::Formatter<'_>,
    fields: &[F],
    value: impl Fn(F) -> FieldValue,
) -> fmt::Result {
    for (idx, &field) in fields.iter().enumerate() {
        let descriptor = field.descriptor();
        if idx > 0 {
            f.write_str(",\n")?;
        }
        write!(f, "{} = {}", descriptor.label, value(field))?;
        if value(field) != FieldValue::NotApplicable {
            f.write_str(descriptor.unit)?;
        }
    }
    Ok(())
}

impl FieldValue {
    fn checked(self, descriptor: &FieldDescriptor) -> Result<Self, DecodeError> {
        match (self, descriptor.kind) {
            (Self::Integer(value), FieldKind::Integer { max }) if value > max => {
                Err(mismatch(descriptor.column, self))
            }
            _ => Ok(self),
        }
    }

    fn time(self, column: &'static str) -> Result<NaiveDateTime, DecodeError> {
        match self {
            Self::Time(time) => Ok(time),
            other => Err(mismatch(column, other)),
        }
    }

    fn integer<T: TryFrom<u32>>(self, column: &'static str) -> Result<T, DecodeError> {
        match self {
            Self::Integer(value) => T::try_from(value).map_err(|_| mismatch(column, self)),
            other => Err(mismatch(column, other)),
        }
    }

    fn boolean(self, column: &'static str) -> Result<bool, DecodeError> {
        match self {
            Self::Boolean(value) => Ok(value),
            other => Err(mismatch(column, other)),
        }
    }
}

fn mismatch(column: &'static str, value: FieldValue) -> DecodeError {
    DecodeError::InvalidField {
        column,
        value: value.to_string(),
    }
}
