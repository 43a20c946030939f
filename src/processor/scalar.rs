// Scalar Coercion
//
// One conversion per SQL type category, turning a non-null raw value into
// the native value bound to a single parameter slot.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::driver::Connection;
use crate::error::{Error, Result};
use crate::native::{NativeValue, TimestampValue};
use crate::temporal;
use crate::types::SqlType;
use crate::value::Value;

/// Significant digits kept when a 64-bit numeric is widened to DECIMAL.
const DECIMAL64_DIGITS: u32 = 16;
/// Significant digits kept when a 32-bit numeric is widened to DECIMAL.
const DECIMAL32_DIGITS: u32 = 7;

pub(crate) fn invalid(value: &Value, sql_type: &SqlType) -> Error {
    Error::InvalidParameter {
        kind: value.kind(),
        literal: value.literal(),
        sql_type: sql_type.name().to_string(),
    }
}

fn round_sf(value: Decimal, digits: u32) -> Option<Decimal> {
    if value.is_zero() {
        return Some(Decimal::ZERO);
    }
    value.round_sf_with_strategy(digits, RoundingStrategy::MidpointNearestEven)
}

/// Exact decimal for a numeric value; the precision context depends on the
/// width of the source kind.
pub(crate) fn to_decimal(sql_type: &SqlType, value: &Value) -> Result<Decimal> {
    let converted = match value {
        Value::Decimal(d) => Some(*d),
        // exact, without a detour through f64
        Value::Long(i) => round_sf(Decimal::from(*i), DECIMAL64_DIGITS),
        Value::Double(f) => Decimal::from_f64_retain(*f).and_then(|d| round_sf(d, DECIMAL64_DIGITS)),
        Value::Int(i) => round_sf(Decimal::from(*i), DECIMAL32_DIGITS),
        Value::Float(f) => Decimal::from_f32_retain(*f).and_then(|d| round_sf(d, DECIMAL32_DIGITS)),
        _ => None,
    };
    converted.ok_or_else(|| invalid(value, sql_type))
}

pub(crate) fn to_f64(sql_type: &SqlType, value: &Value) -> Result<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Long(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f as f64),
        Value::Double(f) => Ok(*f),
        Value::Decimal(d) => d.to_f64().ok_or_else(|| invalid(value, sql_type)),
        _ => Err(invalid(value, sql_type)),
    }
}

pub(crate) fn to_i64(sql_type: &SqlType, value: &Value) -> Result<i64> {
    match value {
        Value::Int(i) => Ok(*i as i64),
        Value::Long(i) => Ok(*i),
        _ => Err(invalid(value, sql_type)),
    }
}

pub(crate) fn to_bool(sql_type: &SqlType, value: &Value) -> Result<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Text(s) => Ok(s.eq_ignore_ascii_case("true")),
        Value::Int(_) | Value::Long(_) => match to_i64(sql_type, value)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::InvalidBitLiteral {
                sql_type: sql_type.name().to_string(),
                value: other,
            }),
        },
        _ => Err(invalid(value, sql_type)),
    }
}

pub fn integer(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    let i = to_i64(sql_type, value)?;
    Ok(match sql_type {
        SqlType::SmallInt => NativeValue::SmallInt(i as i16),
        SqlType::Integer => NativeValue::Integer(i as i32),
        _ => NativeValue::BigInt(i),
    })
}

pub fn float(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    let f = to_f64(sql_type, value)?;
    Ok(match (sql_type, value) {
        (SqlType::Double, _) | (SqlType::Real, Value::Double(_)) => NativeValue::Double(f),
        _ => NativeValue::Float(f as f32),
    })
}

pub fn decimal(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    to_decimal(sql_type, value).map(NativeValue::Decimal)
}

pub fn boolean(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    to_bool(sql_type, value).map(NativeValue::Boolean)
}

pub fn string(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match (sql_type, value) {
        (SqlType::NChar | SqlType::NVarchar, Value::Text(s)) => Ok(NativeValue::NString(s.clone())),
        (_, Value::Text(s)) => Ok(NativeValue::String(s.clone())),
        _ => Err(invalid(value, sql_type)),
    }
}

pub fn binary(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match value {
        Value::Bytes(b) => Ok(NativeValue::Bytes(b.clone())),
        Value::ByteStream(channel) => Ok(NativeValue::BinaryStream(channel.clone())),
        _ => Err(invalid(value, sql_type)),
    }
}

pub fn clob(conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match value {
        Value::Text(text) => {
            let national = matches!(sql_type, SqlType::NClob);
            let mut clob = conn
                .create_clob(national)
                .map_err(|e| Error::database(format!("Error while creating {}.", sql_type), e))?;
            clob.set_string(1, text);
            Ok(NativeValue::Clob(clob))
        }
        Value::CharStream(channel) => Ok(NativeValue::CharacterStream(channel.clone())),
        _ => Err(invalid(value, sql_type)),
    }
}

pub fn date(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    let date = match value {
        Value::Text(s) => temporal::parse_date_text(s)?,
        Value::Date(d) => temporal::decompose_date(d)?,
        Value::Civil(c) => temporal::decompose_date(&c.date())?,
        _ => return Err(invalid(value, sql_type)),
    };
    Ok(NativeValue::Date(date))
}

pub fn time(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match value {
        Value::Text(s) => Ok(NativeValue::String(s.clone())),
        Value::TimeOfDay(t) => temporal::decompose_time(t).map(NativeValue::from),
        _ => Err(invalid(value, sql_type)),
    }
}

pub fn timestamp(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match value {
        Value::Text(s) => Ok(NativeValue::String(s.clone())),
        Value::Utc(instant) => temporal::utc_instant(instant).map(|dt| NativeValue::from(TimestampValue::Utc(dt))),
        Value::Civil(c) => temporal::decompose_civil(c).map(NativeValue::from),
        _ => Err(invalid(value, sql_type)),
    }
}

pub fn row(sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match value {
        Value::Bytes(b) => Ok(NativeValue::RowId(b.clone())),
        _ => Err(invalid(value, sql_type)),
    }
}
