// Host Value Model
//
// Dynamically typed values supplied by callers, the SQL type tags wrapped
// around them, and the record schemas used for structured parameters and
// result rows.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;
use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex};

use crate::types::SqlType;

/// Shared handle to a readable byte source.
///
/// Cloning the handle shares the underlying reader; the source is consumed
/// once by whichever party reads it first.
#[derive(Clone)]
pub struct ByteChannel {
    inner: Arc<Mutex<Box<dyn Read + Send>>>,
}

impl ByteChannel {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(std::io::Cursor::new(bytes))
    }

    /// Reads the channel to completion.
    pub fn read_all(&self) -> std::io::Result<Vec<u8>> {
        let mut reader = self
            .inner
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "byte channel lock poisoned"))?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteChannel({:p})", Arc::as_ptr(&self.inner))
    }
}

impl PartialEq for ByteChannel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Shared handle to a readable UTF-8 character source.
#[derive(Clone)]
pub struct CharChannel {
    inner: Arc<Mutex<Box<dyn Read + Send>>>,
}

impl CharChannel {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(reader))),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(std::io::Cursor::new(text.into().into_bytes()))
    }

    /// Reads the channel to completion; invalid UTF-8 is an I/O error.
    pub fn read_all(&self) -> std::io::Result<String> {
        let mut reader = self
            .inner
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "character channel lock poisoned"))?;
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for CharChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharChannel({:p})", Arc::as_ptr(&self.inner))
    }
}

impl PartialEq for CharChannel {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// Temporal records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRecord {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// UTC offset as hours, minutes and an optional fractional second count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneOffsetRecord {
    pub hours: i32,
    pub minutes: i32,
    pub seconds: Option<Decimal>,
}

impl ZoneOffsetRecord {
    pub fn new(hours: i32, minutes: i32) -> Self {
        Self {
            hours,
            minutes,
            seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
    /// Defaults to zero when absent
    pub second: Option<Decimal>,
    pub utc_offset: Option<ZoneOffsetRecord>,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32, second: Decimal) -> Self {
        Self {
            hour,
            minute,
            second: Some(second),
            utc_offset: None,
        }
    }

    pub fn with_offset(mut self, offset: ZoneOffsetRecord) -> Self {
        self.utc_offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CivilDateTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: Option<Decimal>,
    pub utc_offset: Option<ZoneOffsetRecord>,
}

impl CivilDateTime {
    pub fn new(date: DateRecord, time: TimeOfDay) -> Self {
        Self {
            year: date.year,
            month: date.month,
            day: date.day,
            hour: time.hour,
            minute: time.minute,
            second: time.second,
            utc_offset: time.utc_offset,
        }
    }

    pub fn date(&self) -> DateRecord {
        DateRecord {
            year: self.year,
            month: self.month,
            day: self.day,
        }
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay {
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            utc_offset: self.utc_offset,
        }
    }
}

/// Absolute instant: whole seconds since the Unix epoch plus a fraction in [0, 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtcInstant {
    pub seconds: i64,
    pub fraction: Decimal,
}

// ============================================================================
// Values
// ============================================================================

/// A raw host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
    ByteStream(ByteChannel),
    CharStream(CharChannel),
    Date(DateRecord),
    TimeOfDay(TimeOfDay),
    Civil(CivilDateTime),
    Utc(UtcInstant),
    Array(ArrayValue),
    Record(StructuredRecord),
    Xml(String),
}

impl Value {
    /// Runtime kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "string",
            Value::Bytes(_) => "byte[]",
            Value::ByteStream(_) => "byte channel",
            Value::CharStream(_) => "character channel",
            Value::Date(_) => "date",
            Value::TimeOfDay(_) => "time of day",
            Value::Civil(_) => "civil",
            Value::Utc(_) => "utc",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Xml(_) => "xml",
        }
    }

    /// Literal form of the value used in error messages.
    pub fn literal(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Long(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Double(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Text(s) | Value::Xml(s) => s.clone(),
            Value::Bytes(b) => format!("{:?}", b),
            Value::ByteStream(c) => format!("{:?}", c),
            Value::CharStream(c) => format!("{:?}", c),
            Value::Date(d) => format!("{}-{}-{}", d.year, d.month, d.day),
            Value::TimeOfDay(t) => format!("{:?}", t),
            Value::Civil(c) => format!("{:?}", c),
            Value::Utc(u) => format!("[{}, {}]", u.seconds, u.fraction),
            Value::Array(a) => format!("{:?}", a),
            Value::Record(r) => format!("{}{:?}", r.record_type.name, r.fields),
        }
    }
}

/// An array parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Decimal(Vec<Decimal>),
    Text(Vec<String>),
    Boolean(Vec<bool>),
    /// Array of byte arrays, the only supported nested shape
    Binary(Vec<Vec<u8>>),
    /// Any other nested array shape
    Nested(Vec<ArrayValue>),
    /// Sequence of values tagged with a common element SQL type
    Typed {
        element_type: SqlType,
        elements: Vec<TypedValue>,
    },
}

impl ArrayValue {
    pub fn typed(element_type: impl Into<SqlType>, elements: Vec<TypedValue>) -> Self {
        ArrayValue::Typed {
            element_type: element_type.into(),
            elements,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Int(v) => v.len(),
            ArrayValue::Float(v) => v.len(),
            ArrayValue::Decimal(v) => v.len(),
            ArrayValue::Text(v) => v.len(),
            ArrayValue::Boolean(v) => v.len(),
            ArrayValue::Binary(v) => v.len(),
            ArrayValue::Nested(v) => v.len(),
            ArrayValue::Typed { elements, .. } => elements.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A value tagged with the caller's intended SQL type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub sql_type: SqlType,
    pub value: Option<Value>,
}

impl TypedValue {
    pub fn new(sql_type: impl Into<SqlType>, value: impl IntoValue) -> Self {
        Self {
            sql_type: sql_type.into(),
            value: Some(value.into_value()),
        }
    }

    pub fn null(sql_type: impl Into<SqlType>) -> Self {
        Self {
            sql_type: sql_type.into(),
            value: None,
        }
    }

    pub fn from_value(sql_type: impl Into<SqlType>, value: Option<Value>) -> Self {
        Self {
            sql_type: sql_type.into(),
            value,
        }
    }
}

/// One positional parameter of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Null,
    Raw(Value),
    Typed(TypedValue),
}

impl From<TypedValue> for Parameter {
    fn from(value: TypedValue) -> Self {
        Parameter::Typed(value)
    }
}

impl From<Value> for Parameter {
    fn from(value: Value) -> Self {
        Parameter::Raw(value)
    }
}

impl<T: Into<Parameter>> From<Option<T>> for Parameter {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Parameter::Null)
    }
}

// ============================================================================
// Record schemas
// ============================================================================

/// Declared type of one record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Int,
    Float,
    Decimal,
    Text,
    Boolean,
    Bytes,
    BinaryArray,
    Date,
    Time,
    Timestamp,
    Array(Box<FieldKind>),
    Record(Arc<RecordType>),
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Named record schema with ordered fields.
///
/// Used both as the destination type of a structured parameter and as the
/// row shape a result set is decoded into.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Field values of one record, tagged with the record's type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRecord {
    pub record_type: Arc<RecordType>,
    pub fields: Vec<(String, Option<Value>)>,
}

impl StructuredRecord {
    pub fn new(record_type: Arc<RecordType>) -> Self {
        Self {
            record_type,
            fields: Vec::new(),
        }
    }

    /// Builder-style field setter; replaces an existing value of the same name.
    pub fn with(mut self, name: impl Into<String>, value: Option<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<Value>) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn type_name(&self) -> &str {
        &self.record_type.name
    }
}

/// Rust types that map onto a structured SQL type.
///
/// Usually derived with `#[derive(SqlStruct)]`.
pub trait StructuredType {
    fn record_type() -> RecordType;

    fn to_record(&self) -> StructuredRecord;
}

// ============================================================================
// Conversions into Value
// ============================================================================

pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for i16 {
    fn into_value(self) -> Value {
        Value::Int(self as i32)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Long(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Double(self)
    }
}

impl IntoValue for Decimal {
    fn into_value(self) -> Value {
        Value::Decimal(self)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Boolean(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl<'a> IntoValue for &'a str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Bytes(self)
    }
}

impl<'a> IntoValue for &'a [u8] {
    fn into_value(self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl IntoValue for Vec<Vec<u8>> {
    fn into_value(self) -> Value {
        Value::Array(ArrayValue::Binary(self))
    }
}

impl IntoValue for ArrayValue {
    fn into_value(self) -> Value {
        Value::Array(self)
    }
}

impl IntoValue for StructuredRecord {
    fn into_value(self) -> Value {
        Value::Record(self)
    }
}

impl IntoValue for ByteChannel {
    fn into_value(self) -> Value {
        Value::ByteStream(self)
    }
}

impl IntoValue for CharChannel {
    fn into_value(self) -> Value {
        Value::CharStream(self)
    }
}

impl IntoValue for DateRecord {
    fn into_value(self) -> Value {
        Value::Date(self)
    }
}

impl IntoValue for TimeOfDay {
    fn into_value(self) -> Value {
        Value::TimeOfDay(self)
    }
}

impl IntoValue for CivilDateTime {
    fn into_value(self) -> Value {
        Value::Civil(self)
    }
}

impl IntoValue for UtcInstant {
    fn into_value(self) -> Value {
        Value::Utc(self)
    }
}

impl IntoValue for NaiveDate {
    fn into_value(self) -> Value {
        Value::Date(DateRecord {
            year: self.year(),
            month: self.month(),
            day: self.day(),
        })
    }
}

fn seconds_of(time: &NaiveTime) -> Decimal {
    Decimal::from(time.second()) + Decimal::new(time.nanosecond() as i64, 9)
}

impl IntoValue for NaiveTime {
    fn into_value(self) -> Value {
        Value::TimeOfDay(TimeOfDay {
            hour: self.hour(),
            minute: self.minute(),
            second: Some(seconds_of(&self)),
            utc_offset: None,
        })
    }
}

impl IntoValue for NaiveDateTime {
    fn into_value(self) -> Value {
        Value::Civil(CivilDateTime {
            year: self.year(),
            month: self.month(),
            day: self.day(),
            hour: self.hour(),
            minute: self.minute(),
            second: Some(seconds_of(&self.time())),
            utc_offset: None,
        })
    }
}

impl IntoValue for chrono::DateTime<chrono::Utc> {
    fn into_value(self) -> Value {
        Value::Utc(UtcInstant {
            seconds: self.timestamp(),
            fraction: Decimal::new(self.timestamp_subsec_nanos() as i64, 9),
        })
    }
}
