// Array Builder
//
// Converts array parameters into a homogeneous native element vector plus
// the element SQL type name the driver's array constructor expects.

use tracing::trace;

use crate::driver::Connection;
use crate::error::{Error, Result};
use crate::native::{ArrayData, NativeArray, NativeValue, TimeValue, TimestampValue};
use crate::processor::scalar::{invalid, to_bool, to_decimal, to_f64, to_i64};
use crate::processor::ParameterConverter;
use crate::temporal;
use crate::types::{NativeType, SqlType};
use crate::value::{ArrayValue, TypedValue, Value};

/// Builds the native array for `array`; a null array yields `None`.
pub fn build<C>(converter: &C, array: Option<&ArrayValue>) -> Result<Option<NativeArray>>
where
    C: ParameterConverter + ?Sized,
{
    let array = match array {
        Some(array) => array,
        None => return Ok(None),
    };
    let built = match array {
        ArrayValue::Typed { element_type, elements } => typed(converter, element_type, elements)?,
        primitive_array => primitive(primitive_array)?,
    };
    trace!(
        element_type = %built.element_type,
        len = built.data.len(),
        "built array parameter"
    );
    Ok(Some(built))
}

/// Binds an ARRAY-typed value through the driver's array constructor.
pub fn bind<C>(converter: &C, conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue>
where
    C: ParameterConverter + ?Sized,
{
    let array = match value {
        Value::Array(array) => array,
        other => return Err(invalid(other, sql_type)),
    };
    match build(converter, Some(array))? {
        Some(built) => create(conn, built),
        None => Ok(NativeValue::Null(NativeType::Array)),
    }
}

pub(crate) fn create(conn: &dyn Connection, built: NativeArray) -> Result<NativeValue> {
    conn.create_array_of(&built.element_type, built.data)
        .map(NativeValue::Array)
        .map_err(|e| Error::database(format!("Error while creating {} array.", built.element_type), e))
}

/// Arrays of plain host values, converted without per-element type tags.
pub(crate) fn primitive(array: &ArrayValue) -> Result<NativeArray> {
    let (element_type, data) = match array {
        ArrayValue::Int(v) => ("BIGINT", ArrayData::BigInt(v.iter().copied().map(Some).collect())),
        ArrayValue::Float(v) => ("DOUBLE", ArrayData::Double(v.iter().copied().map(Some).collect())),
        ArrayValue::Decimal(v) => ("DECIMAL", ArrayData::Decimal(v.iter().copied().map(Some).collect())),
        ArrayValue::Text(v) => ("VARCHAR", ArrayData::Text(v.iter().cloned().map(Some).collect())),
        ArrayValue::Boolean(v) => ("BOOLEAN", ArrayData::Boolean(v.iter().copied().map(Some).collect())),
        ArrayValue::Binary(v) => ("BINARY", ArrayData::Binary(v.iter().cloned().map(Some).collect())),
        ArrayValue::Nested(_) => {
            return Err(Error::UnsupportedType(
                "nested array other than an array of byte arrays".to_string(),
            ))
        }
        ArrayValue::Typed { element_type, .. } => {
            return Err(Error::application(format!(
                "Typed {} array passed where a primitive array is expected",
                element_type
            )))
        }
    };
    Ok(NativeArray {
        element_type: element_type.to_string(),
        data,
    })
}

fn collect<T, F>(elements: &[TypedValue], convert: F) -> Result<Vec<Option<T>>>
where
    F: Fn(&Value) -> Result<T>,
{
    elements
        .iter()
        .map(|element| element.value.as_ref().map(&convert).transpose())
        .collect()
}

fn typed<C>(converter: &C, element_type: &SqlType, elements: &[TypedValue]) -> Result<NativeArray>
where
    C: ParameterConverter + ?Sized,
{
    let ty = element_type;
    let (name, data) = match ty {
        SqlType::SmallInt => (
            "SMALLINT",
            ArrayData::SmallInt(collect(elements, |v| to_i64(ty, v).map(|i| i as i16))?),
        ),
        SqlType::Integer => (
            "INT",
            ArrayData::Integer(collect(elements, |v| to_i64(ty, v).map(|i| i as i32))?),
        ),
        SqlType::BigInt => ("BIGINT", ArrayData::BigInt(collect(elements, |v| to_i64(ty, v))?)),
        SqlType::Decimal => ("DECIMAL", ArrayData::Decimal(collect(elements, |v| to_decimal(ty, v))?)),
        SqlType::Numeric => ("NUMERIC", ArrayData::Decimal(collect(elements, |v| to_decimal(ty, v))?)),
        SqlType::Real => ("REAL", ArrayData::Double(collect(elements, |v| to_f64(ty, v))?)),
        SqlType::Double => ("DOUBLE", ArrayData::Double(collect(elements, |v| to_f64(ty, v))?)),
        SqlType::Float => ("FLOAT", ArrayData::Double(collect(elements, |v| to_f64(ty, v))?)),
        SqlType::Char => ("CHAR", ArrayData::Text(collect(elements, |v| text_of(ty, v))?)),
        SqlType::Varchar => ("VARCHAR", ArrayData::Text(collect(elements, |v| text_of(ty, v))?)),
        SqlType::NVarchar => ("NVARCHAR", ArrayData::Text(collect(elements, |v| text_of(ty, v))?)),
        SqlType::Boolean => ("BOOLEAN", ArrayData::Boolean(collect(elements, |v| to_bool(ty, v))?)),
        SqlType::Bit => ("BIT", ArrayData::Boolean(collect(elements, |v| to_bool(ty, v))?)),
        SqlType::Date => ("DATE", ArrayData::Date(collect(elements, |v| date_of(ty, v))?)),
        SqlType::Time | SqlType::TimeWithTimezone => {
            let values = collect(elements, |v| time_of(ty, v))?;
            let any_offset = *ty == SqlType::TimeWithTimezone
                || values.iter().flatten().any(TimeValue::has_offset);
            (temporal::array_type_name("TIME", any_offset), ArrayData::Time(values))
        }
        SqlType::Timestamp | SqlType::DateTime | SqlType::TimestampWithTimezone => {
            let values = collect(elements, |v| timestamp_of(ty, v))?;
            let any_offset = *ty == SqlType::TimestampWithTimezone
                || values.iter().flatten().any(TimestampValue::has_offset);
            (
                temporal::array_type_name("TIMESTAMP", any_offset),
                ArrayData::Timestamp(values),
            )
        }
        SqlType::Binary => ("BINARY", ArrayData::Binary(collect(elements, |v| bytes_of(ty, v))?)),
        SqlType::VarBinary => ("VARBINARY", ArrayData::Binary(collect(elements, |v| bytes_of(ty, v))?)),
        SqlType::Custom(_) => return converter.convert_custom_array(ty, elements),
        other => {
            return Err(Error::UnsupportedType(format!(
                "{} as an array element type",
                other
            )))
        }
    };
    Ok(NativeArray {
        element_type: name.to_string(),
        data,
    })
}

fn text_of(sql_type: &SqlType, value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        other => Err(invalid(other, sql_type)),
    }
}

fn date_of(sql_type: &SqlType, value: &Value) -> Result<chrono::NaiveDate> {
    match value {
        Value::Text(s) => temporal::parse_date_text(s),
        Value::Date(d) => temporal::decompose_date(d),
        Value::Civil(c) => temporal::decompose_date(&c.date()),
        other => Err(invalid(other, sql_type)),
    }
}

fn time_of(sql_type: &SqlType, value: &Value) -> Result<TimeValue> {
    match value {
        Value::Text(s) => temporal::parse_time_text(s).map(TimeValue::Naive),
        Value::TimeOfDay(t) => temporal::decompose_time(t),
        other => Err(invalid(other, sql_type)),
    }
}

fn timestamp_of(sql_type: &SqlType, value: &Value) -> Result<TimestampValue> {
    match value {
        Value::Text(s) => temporal::parse_timestamp_text(s).map(TimestampValue::Naive),
        Value::Civil(c) => temporal::decompose_civil(c),
        Value::Utc(instant) => temporal::utc_instant(instant).map(TimestampValue::Utc),
        other => Err(invalid(other, sql_type)),
    }
}

/// Byte content of an element; streams are read to completion.
fn bytes_of(sql_type: &SqlType, value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::ByteStream(channel) => channel
            .read_all()
            .map_err(|e| Error::io("Error while reading binary stream of array element.", e)),
        other => Err(invalid(other, sql_type)),
    }
}
