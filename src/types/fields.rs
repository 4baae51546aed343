//! Field descriptor tables for measurement records.
//!
//! Each record kind has a closed enum of fields with a fixed order. The
//! order is the export column order; the descriptors carry the column name,
//! the display label and the value kind used to parse column text back.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};

use crate::error::DecodeError;

/// Textual timestamp format used for export columns.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Marker written for fields that do not apply to a record.
pub const NOT_APPLICABLE: &str = "-";

/// Value kind of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Date and time.
    Time,
    /// Unsigned integer with an inclusive upper bound.
    Integer { max: u32 },
    /// Flag.
    Boolean,
    /// Fixed text (record data type).
    Text,
}

/// Static description of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Export column name.
    pub column: &'static str,
    /// Human readable label.
    pub label: &'static str,
    /// Unit appended to the value when displayed.
    pub unit: &'static str,
    /// Value kind.
    pub kind: FieldKind,
    /// Value is computed from other fields and ignored on load.
    pub derived: bool,
}

impl FieldDescriptor {
    const fn new(column: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            column,
            label,
            unit: "",
            kind,
            derived: false,
        }
    }

    pub(crate) const fn time() -> Self {
        Self::new("Time", "Time", FieldKind::Time)
    }

    pub(crate) const fn integer(column: &'static str, label: &'static str, max: u32) -> Self {
        Self::new(column, label, FieldKind::Integer { max })
    }

    pub(crate) const fn boolean(column: &'static str, label: &'static str) -> Self {
        Self::new(column, label, FieldKind::Boolean)
    }

    pub(crate) const fn data_type() -> Self {
        Self::new("DataType", "Data Type", FieldKind::Text).derive()
    }

    pub(crate) const fn package_type() -> Self {
        Self::integer("PackageType", "Package Type", 0x7f)
    }

    pub(crate) const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    pub(crate) const fn derive(mut self) -> Self {
        self.derived = true;
        self
    }
}

/// A field of a measurement record with a fixed position in the export schema.
pub trait RecordField: Copy + Eq + fmt::Debug + 'static {
    /// All fields in export column order.
    const ALL: &'static [Self];

    /// Returns the static descriptor of this field.
    fn descriptor(self) -> FieldDescriptor;

    /// Returns the export column name.
    fn column(self) -> &'static str {
        self.descriptor().column
    }

    /// Looks up a field by its export column name.
    fn from_column(column: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.column() == column)
    }

    /// Returns all export column names in order.
    #[must_use]
    fn columns() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.column()).collect()
    }
}

/// Fields of a realtime record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealtimeField {
    Time,
    SpO2,
    PulseRate,
    PulseWaveform,
    PulseBeep,
    BarGraph,
    Pi,
    SignalStrength,
    ProbeError,
    LowSpO2,
    SearchingTooLong,
    SearchingPulse,
    SpO2Invalid,
    PulseRateInvalid,
    PiValid,
    PiInvalid,
    Reserved,
    DataType,
    PackageType,
}

impl RecordField for RealtimeField {
    const ALL: &'static [Self] = &[
        Self::Time,
        Self::SpO2,
        Self::PulseRate,
        Self::PulseWaveform,
        Self::PulseBeep,
        Self::BarGraph,
        Self::Pi,
        Self::SignalStrength,
        Self::ProbeError,
        Self::LowSpO2,
        Self::SearchingTooLong,
        Self::SearchingPulse,
        Self::SpO2Invalid,
        Self::PulseRateInvalid,
        Self::PiValid,
        Self::PiInvalid,
        Self::Reserved,
        Self::DataType,
        Self::PackageType,
    ];

    fn descriptor(self) -> FieldDescriptor {
        match self {
            Self::Time => FieldDescriptor::time(),
            Self::SpO2 => FieldDescriptor::integer("SpO2", "SpO2", 0xff).unit("%"),
            Self::PulseRate => {
                FieldDescriptor::integer("PulseRate", "Pulse Rate", 0xff).unit(" bpm")
            }
            Self::PulseWaveform => {
                FieldDescriptor::integer("PulseWaveform", "Pulse Waveform", 0x7f)
            }
            Self::PulseBeep => FieldDescriptor::boolean("PulseBeep", "Pulse Beep"),
            Self::BarGraph => FieldDescriptor::integer("BarGraph", "Bar Graph", 0x0f),
            Self::Pi => FieldDescriptor::integer("Pi", "PI", 0xffff).unit("%"),
            Self::SignalStrength => {
                FieldDescriptor::integer("SignalStrength", "Signal Strength", 0x0f)
            }
            Self::ProbeError => FieldDescriptor::boolean("ProbeError", "Probe Error"),
            Self::LowSpO2 => FieldDescriptor::boolean("LowSpO2", "Low SpO2"),
            Self::SearchingTooLong => {
                FieldDescriptor::boolean("SearchingTooLong", "Searching Too Long")
            }
            Self::SearchingPulse => FieldDescriptor::boolean("SearchingPulse", "Searching Pulse"),
            Self::SpO2Invalid => FieldDescriptor::boolean("SpO2Invalid", "SpO2 Invalid").derive(),
            Self::PulseRateInvalid => {
                FieldDescriptor::boolean("PulseRateInvalid", "Pulse Rate Invalid").derive()
            }
            Self::PiValid => FieldDescriptor::boolean("PiValid", "PI Valid"),
            Self::PiInvalid => FieldDescriptor::boolean("PiInvalid", "PI Invalid").derive(),
            Self::Reserved => FieldDescriptor::integer("Reserved", "Reserved", 0x07),
            Self::DataType => FieldDescriptor::data_type(),
            Self::PackageType => FieldDescriptor::package_type(),
        }
    }
}

/// Fields of a storage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageField {
    Time,
    SpO2,
    PulseRate,
    Pi,
    PiSupport,
    PulseRateInvalid,
    SpO2Invalid,
    PiInvalid,
    DataType,
    PackageType,
}

impl RecordField for StorageField {
    const ALL: &'static [Self] = &[
        Self::Time,
        Self::SpO2,
        Self::PulseRate,
        Self::Pi,
        Self::PiSupport,
        Self::PulseRateInvalid,
        Self::SpO2Invalid,
        Self::PiInvalid,
        Self::DataType,
        Self::PackageType,
    ];

    fn descriptor(self) -> FieldDescriptor {
        match self {
            Self::Time => FieldDescriptor::time(),
            Self::SpO2 => FieldDescriptor::integer("SpO2", "SpO2", 0xff).unit("%"),
            Self::PulseRate => {
                FieldDescriptor::integer("PulseRate", "Pulse Rate", 0xff).unit(" bpm")
            }
            Self::Pi => FieldDescriptor::integer("Pi", "PI", 0xffff).unit("%"),
            Self::PiSupport => FieldDescriptor::boolean("PiSupport", "PI Support").derive(),
            Self::PulseRateInvalid => {
                FieldDescriptor::boolean("PulseRateInvalid", "Pulse Rate Invalid").derive()
            }
            Self::SpO2Invalid => FieldDescriptor::boolean("SpO2Invalid", "SpO2 Invalid").derive(),
            Self::PiInvalid => FieldDescriptor::boolean("PiInvalid", "PI Invalid").derive(),
            Self::DataType => FieldDescriptor::data_type(),
            Self::PackageType => FieldDescriptor::package_type(),
        }
    }
}

/// Value of a single record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// Timestamp.
    Time(NaiveDateTime),
    /// Unsigned integer.
    Integer(u32),
    /// Flag.
    Boolean(bool),
    /// Fixed text.
    Text(&'static str),
    /// Field does not apply to this record.
    NotApplicable,
}

impl FieldValue {
    /// Parses column text into a value of the given kind.
    ///
    /// Integers written as floats ("97.0") are accepted, as are `0`/`1` for
    /// flags and the "-" marker for fields that do not apply.
    pub fn parse(column: &'static str, kind: FieldKind, text: &str) -> Result<Self, DecodeError> {
        let text = text.trim();
        let invalid = || DecodeError::InvalidField {
            column,
            value: text.to_owned(),
        };

        if text == NOT_APPLICABLE && matches!(kind, FieldKind::Integer { .. } | FieldKind::Boolean)
        {
            return Ok(Self::NotApplicable);
        }

        match kind {
            FieldKind::Time => parse_time(text).map(Self::Time).ok_or_else(invalid),
            FieldKind::Integer { max } => parse_integer(text)
                .filter(|value| *value <= max)
                .map(Self::Integer)
                .ok_or_else(invalid),
            FieldKind::Boolean => match text {
                "true" | "True" | "1" | "1.0" => Ok(Self::Boolean(true)),
                "false" | "False" | "0" | "0.0" => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            FieldKind::Text => crate::types::RecordKind::from_datatype(text)
                .map(|kind| Self::Text(kind.datatype()))
                .ok_or_else(invalid),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time(time) => write!(f, "{}", time.format(TIME_FORMAT)),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

fn parse_time(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%d.%m.%Y %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|time| time.naive_local())
        })
}

#[allow(clippy::cast_sign_loss, clippy::float_cmp)]
fn parse_integer(text: &str) -> Option<u32> {
    if let Ok(value) = text.parse::<u32>() {
        return Some(value);
    }
    let value = text.parse::<f64>().ok()?;
    if value.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&value) {
        return None;
    }
    Some(value as u32)
}
