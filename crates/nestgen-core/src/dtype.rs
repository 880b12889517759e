use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use schemars::r#gen::SchemaGenerator;
use schemars::schema::Schema;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sentinel stored in datetime/timedelta leaves for "not a time".
pub const NAT: i64 = i64::MIN;

/// Time resolution of `datetime64`/`timedelta64` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Milli,
    Micro,
    Nano,
    Pico,
    Femto,
    Atto,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 13] = [
        TimeUnit::Year,
        TimeUnit::Month,
        TimeUnit::Week,
        TimeUnit::Day,
        TimeUnit::Hour,
        TimeUnit::Minute,
        TimeUnit::Second,
        TimeUnit::Milli,
        TimeUnit::Micro,
        TimeUnit::Nano,
        TimeUnit::Pico,
        TimeUnit::Femto,
        TimeUnit::Atto,
    ];

    pub fn code(self) -> &'static str {
        match self {
            TimeUnit::Year => "Y",
            TimeUnit::Month => "M",
            TimeUnit::Week => "W",
            TimeUnit::Day => "D",
            TimeUnit::Hour => "h",
            TimeUnit::Minute => "m",
            TimeUnit::Second => "s",
            TimeUnit::Milli => "ms",
            TimeUnit::Micro => "us",
            TimeUnit::Nano => "ns",
            TimeUnit::Pico => "ps",
            TimeUnit::Femto => "fs",
            TimeUnit::Atto => "as",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        TimeUnit::ALL.into_iter().find(|unit| unit.code() == code)
    }
}

/// Storage family of a dtype; fixes which scalar buffer a leaf uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DTypeFamily {
    Bool,
    Signed,
    Unsigned,
    Float,
    Complex,
    Datetime,
    Timedelta,
}

/// Scalar dtype of a numeric leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Datetime64(TimeUnit),
    Timedelta64(TimeUnit),
}

const SIMPLE: [DType; 13] = [
    DType::Bool,
    DType::Int8,
    DType::Int16,
    DType::Int32,
    DType::Int64,
    DType::UInt8,
    DType::UInt16,
    DType::UInt32,
    DType::UInt64,
    DType::Float32,
    DType::Float64,
    DType::Complex64,
    DType::Complex128,
];

impl DType {
    /// Every supported dtype, simple ones first, then datetimes and timedeltas
    /// for each unit.
    pub fn all() -> Vec<DType> {
        SIMPLE
            .into_iter()
            .chain(TimeUnit::ALL.into_iter().map(DType::Datetime64))
            .chain(TimeUnit::ALL.into_iter().map(DType::Timedelta64))
            .collect()
    }

    pub fn family(self) -> DTypeFamily {
        match self {
            DType::Bool => DTypeFamily::Bool,
            DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64 => DTypeFamily::Signed,
            DType::UInt8 | DType::UInt16 | DType::UInt32 | DType::UInt64 => DTypeFamily::Unsigned,
            DType::Float32 | DType::Float64 => DTypeFamily::Float,
            DType::Complex64 | DType::Complex128 => DTypeFamily::Complex,
            DType::Datetime64(_) => DTypeFamily::Datetime,
            DType::Timedelta64(_) => DTypeFamily::Timedelta,
        }
    }

    /// Inclusive range of a signed integer dtype.
    pub fn signed_range(self) -> Option<(i64, i64)> {
        match self {
            DType::Int8 => Some((i8::MIN as i64, i8::MAX as i64)),
            DType::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            DType::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            DType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Largest value of an unsigned integer dtype.
    pub fn unsigned_max(self) -> Option<u64> {
        match self {
            DType::UInt8 => Some(u8::MAX as u64),
            DType::UInt16 => Some(u16::MAX as u64),
            DType::UInt32 => Some(u32::MAX as u64),
            DType::UInt64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// True for single-precision float storage (`float32`, `complex64`).
    pub fn is_single_precision(self) -> bool {
        matches!(self, DType::Float32 | DType::Complex64)
    }

    /// True when the dtype has a NaN or NaT value.
    pub fn has_nan(self) -> bool {
        matches!(
            self.family(),
            DTypeFamily::Float | DTypeFamily::Complex | DTypeFamily::Datetime | DTypeFamily::Timedelta
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Bool => f.write_str("bool"),
            DType::Int8 => f.write_str("int8"),
            DType::Int16 => f.write_str("int16"),
            DType::Int32 => f.write_str("int32"),
            DType::Int64 => f.write_str("int64"),
            DType::UInt8 => f.write_str("uint8"),
            DType::UInt16 => f.write_str("uint16"),
            DType::UInt32 => f.write_str("uint32"),
            DType::UInt64 => f.write_str("uint64"),
            DType::Float32 => f.write_str("float32"),
            DType::Float64 => f.write_str("float64"),
            DType::Complex64 => f.write_str("complex64"),
            DType::Complex128 => f.write_str("complex128"),
            DType::Datetime64(unit) => write!(f, "datetime64[{}]", unit.code()),
            DType::Timedelta64(unit) => write!(f, "timedelta64[{}]", unit.code()),
        }
    }
}

impl FromStr for DType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Some(dtype) = SIMPLE.into_iter().find(|dtype| dtype.to_string() == value) {
            return Ok(dtype);
        }

        let timed = |prefix: &str| {
            value
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('['))
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(TimeUnit::from_code)
        };
        if let Some(unit) = timed("datetime64") {
            return Ok(DType::Datetime64(unit));
        }
        if let Some(unit) = timed("timedelta64") {
            return Ok(DType::Timedelta64(unit));
        }

        Err(Error::InvalidDType(value.to_string()))
    }
}

impl Serialize for DType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for DType {
    fn schema_name() -> String {
        "DType".to_string()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}
