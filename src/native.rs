// Native Values
//
// Driver-facing representations produced by the binder. A driver receives
// exactly one `NativeValue` per parameter slot; composite values (arrays,
// structs, CLOBs) are constructed through the driver's `Connection` factory.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;

use crate::types::NativeType;
use crate::value::{ByteChannel, CharChannel};

/// Time of day with a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTime {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

/// Decomposed time-of-day, offset-aware or naive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeValue {
    Naive(NaiveTime),
    Offset(OffsetTime),
}

impl TimeValue {
    pub fn has_offset(&self) -> bool {
        matches!(self, TimeValue::Offset(_))
    }
}

/// Decomposed timestamp: naive civil, civil with offset, or absolute UTC instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampValue {
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
    Utc(DateTime<Utc>),
}

impl TimestampValue {
    pub fn has_offset(&self) -> bool {
        matches!(self, TimestampValue::Offset(_))
    }
}

/// Homogeneous element vector of a native array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    SmallInt(Vec<Option<i16>>),
    Integer(Vec<Option<i32>>),
    BigInt(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Decimal(Vec<Option<Decimal>>),
    Text(Vec<Option<String>>),
    Boolean(Vec<Option<bool>>),
    Binary(Vec<Option<Vec<u8>>>),
    Date(Vec<Option<NaiveDate>>),
    Time(Vec<Option<TimeValue>>),
    Timestamp(Vec<Option<TimestampValue>>),
    /// Elements produced by a custom converter
    Other(Vec<Option<NativeValue>>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::SmallInt(v) => v.len(),
            ArrayData::Integer(v) => v.len(),
            ArrayData::BigInt(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::Decimal(v) => v.len(),
            ArrayData::Text(v) => v.len(),
            ArrayData::Boolean(v) => v.len(),
            ArrayData::Binary(v) => v.len(),
            ArrayData::Date(v) => v.len(),
            ArrayData::Time(v) => v.len(),
            ArrayData::Timestamp(v) => v.len(),
            ArrayData::Other(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Driver-native array object tagged with its element SQL type name.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeArray {
    pub element_type: String,
    pub data: ArrayData,
}

/// Driver-native structured value.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeStruct {
    pub type_name: String,
    pub attributes: Vec<NativeValue>,
}

/// Driver-created character large object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClobHandle {
    pub national: bool,
    /// Driver-assigned locator, if the driver uses server-side LOBs
    pub locator: Option<u64>,
    content: String,
}

impl ClobHandle {
    pub fn new(national: bool, locator: Option<u64>) -> Self {
        Self {
            national,
            locator,
            content: String::new(),
        }
    }

    /// Writes `text` starting at the 1-based character position `pos`,
    /// truncating whatever followed it.
    pub fn set_string(&mut self, pos: usize, text: &str) {
        let keep: String = self.content.chars().take(pos.saturating_sub(1)).collect();
        self.content = keep;
        self.content.push_str(text);
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// One bound parameter as handed to the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// SQL null of the given native type
    Null(NativeType),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    String(String),
    /// National character string
    NString(String),
    Bytes(Vec<u8>),
    /// Binary stream passed through without buffering
    BinaryStream(ByteChannel),
    /// Character stream passed through without buffering
    CharacterStream(CharChannel),
    Clob(ClobHandle),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeWithTimezone(OffsetTime),
    Timestamp(NaiveDateTime),
    TimestampWithTimezone(DateTime<FixedOffset>),
    TimestampUtc(DateTime<Utc>),
    Array(NativeArray),
    Struct(NativeStruct),
    RowId(Vec<u8>),
    Xml(String),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null(_))
    }

    /// Native type code this value binds as.
    pub fn native_type(&self) -> NativeType {
        match self {
            NativeValue::Null(ty) => *ty,
            NativeValue::SmallInt(_) => NativeType::SmallInt,
            NativeValue::Integer(_) => NativeType::Integer,
            NativeValue::BigInt(_) => NativeType::BigInt,
            NativeValue::Float(_) => NativeType::Float,
            NativeValue::Double(_) => NativeType::Double,
            NativeValue::Decimal(_) => NativeType::Decimal,
            NativeValue::Boolean(_) => NativeType::Boolean,
            NativeValue::String(_) => NativeType::Varchar,
            NativeValue::NString(_) => NativeType::NVarchar,
            NativeValue::Bytes(_) => NativeType::VarBinary,
            NativeValue::BinaryStream(_) => NativeType::LongVarBinary,
            NativeValue::CharacterStream(_) => NativeType::LongVarchar,
            NativeValue::Clob(c) if c.national => NativeType::NClob,
            NativeValue::Clob(_) => NativeType::Clob,
            NativeValue::Date(_) => NativeType::Date,
            NativeValue::Time(_) => NativeType::Time,
            NativeValue::TimeWithTimezone(_) => NativeType::TimeWithTimezone,
            NativeValue::Timestamp(_) | NativeValue::TimestampUtc(_) => NativeType::Timestamp,
            NativeValue::TimestampWithTimezone(_) => NativeType::TimestampWithTimezone,
            NativeValue::Array(_) => NativeType::Array,
            NativeValue::Struct(_) => NativeType::Struct,
            NativeValue::RowId(_) => NativeType::RowId,
            NativeValue::Xml(_) => NativeType::SqlXml,
        }
    }
}

impl From<TimeValue> for NativeValue {
    fn from(value: TimeValue) -> Self {
        match value {
            TimeValue::Naive(t) => NativeValue::Time(t),
            TimeValue::Offset(t) => NativeValue::TimeWithTimezone(t),
        }
    }
}

impl From<TimestampValue> for NativeValue {
    fn from(value: TimestampValue) -> Self {
        match value {
            TimestampValue::Naive(t) => NativeValue::Timestamp(t),
            TimestampValue::Offset(t) => NativeValue::TimestampWithTimezone(t),
            TimestampValue::Utc(t) => NativeValue::TimestampUtc(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clob_set_string_positions() {
        let mut clob = ClobHandle::new(false, None);
        clob.set_string(1, "hello world");
        assert_eq!(clob.content(), "hello world");
        clob.set_string(7, "there");
        assert_eq!(clob.content(), "hello there");
    }

    #[test]
    fn test_native_type_of_values() {
        assert_eq!(NativeValue::Null(NativeType::Integer).native_type(), NativeType::Integer);
        assert_eq!(NativeValue::NString("x".into()).native_type(), NativeType::NVarchar);
        assert_eq!(
            NativeValue::Clob(ClobHandle::new(true, None)).native_type(),
            NativeType::NClob
        );
        assert!(NativeValue::Null(NativeType::Null).is_null());
    }
}
