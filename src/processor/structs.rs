// Struct Builder
//
// Flattens a structured record into the ordered attribute list of its
// destination schema. Conversion is planned for the whole record tree first;
// driver objects are only created once every field converted cleanly.

use std::sync::Arc;
use tracing::trace;

use crate::driver::Connection;
use crate::error::{Error, Result};
use crate::native::{NativeArray, NativeStruct, NativeValue};
use crate::processor::array;
use crate::processor::scalar::invalid;
use crate::types::{NativeType, SqlType};
use crate::value::{ArrayValue, FieldDef, FieldKind, RecordType, StructuredRecord, Value};

/// Fully converted attribute awaiting driver object construction.
#[derive(Debug)]
enum Planned {
    Value(NativeValue),
    Array(NativeArray),
    Struct(StructPlan),
}

#[derive(Debug)]
struct StructPlan {
    type_name: String,
    attributes: Vec<Planned>,
}

/// Binds a STRUCT-typed value through the driver's struct constructor.
pub fn bind(conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
    match value {
        Value::Record(record) => build(conn, record).map(NativeValue::Struct),
        other => Err(invalid(other, sql_type)),
    }
}

/// Builds the native struct for `record` against its own record type.
pub fn build(conn: &dyn Connection, record: &StructuredRecord) -> Result<NativeStruct> {
    let plan = plan(&record.record_type, record)?;
    materialize(conn, plan)
}

/// Ordered attribute values and the upper-cased type name of `record`.
///
/// Nested records and arrays are created through `conn`; the outer struct is
/// left to the caller.
pub fn attributes(conn: &dyn Connection, record: &StructuredRecord) -> Result<(Vec<NativeValue>, String)> {
    let plan = plan(&record.record_type, record)?;
    let values = plan
        .attributes
        .into_iter()
        .map(|attr| materialize_attribute(conn, attr))
        .collect::<Result<Vec<_>>>()?;
    Ok((values, plan.type_name))
}

fn plan(record_type: &Arc<RecordType>, record: &StructuredRecord) -> Result<StructPlan> {
    let attributes = record_type
        .fields
        .iter()
        .map(|field| plan_field(field, record.get(&field.name)))
        .collect::<Result<Vec<_>>>()?;
    Ok(StructPlan {
        type_name: record_type.name.to_uppercase(),
        attributes,
    })
}

fn unsupported(field: &FieldDef) -> Error {
    Error::UnsupportedType(format!(
        "unsupported data type of {} specified for struct parameter",
        kind_name(&field.kind)
    ))
}

fn kind_name(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Int => "int".to_string(),
        FieldKind::Float => "float".to_string(),
        FieldKind::Decimal => "decimal".to_string(),
        FieldKind::Text => "string".to_string(),
        FieldKind::Boolean => "boolean".to_string(),
        FieldKind::Bytes => "byte[]".to_string(),
        FieldKind::BinaryArray => "byte[][]".to_string(),
        FieldKind::Date => "date".to_string(),
        FieldKind::Time => "time".to_string(),
        FieldKind::Timestamp => "timestamp".to_string(),
        FieldKind::Array(inner) => format!("{}[]", kind_name(inner)),
        FieldKind::Record(rt) => rt.name.clone(),
        FieldKind::Other(name) => name.clone(),
    }
}

fn null_type(kind: &FieldKind) -> Option<NativeType> {
    let native = match kind {
        FieldKind::Int => NativeType::Integer,
        FieldKind::Float => NativeType::Double,
        FieldKind::Decimal => NativeType::Decimal,
        FieldKind::Text => NativeType::Varchar,
        FieldKind::Boolean => NativeType::Boolean,
        FieldKind::Bytes => NativeType::VarBinary,
        FieldKind::BinaryArray => NativeType::Array,
        FieldKind::Record(_) => NativeType::Struct,
        _ => return None,
    };
    Some(native)
}

fn plan_field(field: &FieldDef, value: Option<&Value>) -> Result<Planned> {
    let value = match value {
        Some(value) => value,
        None => {
            return null_type(&field.kind)
                .map(|ty| Planned::Value(NativeValue::Null(ty)))
                .ok_or_else(|| unsupported(field))
        }
    };
    let mismatch = || Error::InvalidParameter {
        kind: value.kind(),
        literal: value.literal(),
        sql_type: format!("{} field `{}`", kind_name(&field.kind), field.name),
    };

    let planned = match (&field.kind, value) {
        (FieldKind::Int, Value::Int(i)) => NativeValue::Integer(*i),
        (FieldKind::Int, Value::Long(i)) => NativeValue::BigInt(*i),
        (FieldKind::Float, Value::Float(f)) => NativeValue::Float(*f),
        (FieldKind::Float, Value::Double(f)) => NativeValue::Double(*f),
        (FieldKind::Decimal, Value::Decimal(d)) => NativeValue::Decimal(*d),
        (FieldKind::Text, Value::Text(s)) => NativeValue::String(s.clone()),
        (FieldKind::Boolean, Value::Boolean(b)) => NativeValue::Boolean(*b),
        (FieldKind::Bytes, Value::Bytes(b)) => NativeValue::Bytes(b.clone()),
        (FieldKind::BinaryArray, Value::Array(arr @ ArrayValue::Binary(_))) => {
            return array::primitive(arr).map(Planned::Array)
        }
        (FieldKind::Record(nested_type), Value::Record(nested)) => {
            return plan(nested_type, nested).map(Planned::Struct)
        }
        (
            FieldKind::Int
            | FieldKind::Float
            | FieldKind::Decimal
            | FieldKind::Text
            | FieldKind::Boolean
            | FieldKind::Bytes
            | FieldKind::BinaryArray
            | FieldKind::Record(_),
            _,
        ) => return Err(mismatch()),
        _ => return Err(unsupported(field)),
    };
    Ok(Planned::Value(planned))
}

fn materialize(conn: &dyn Connection, plan: StructPlan) -> Result<NativeStruct> {
    let attributes = plan
        .attributes
        .into_iter()
        .map(|attr| materialize_attribute(conn, attr))
        .collect::<Result<Vec<_>>>()?;
    trace!(type_name = %plan.type_name, attributes = attributes.len(), "creating struct parameter");
    conn.create_struct(&plan.type_name, attributes)
        .map_err(|e| Error::database(format!("Error while creating struct {}.", plan.type_name), e))
}

fn materialize_attribute(conn: &dyn Connection, planned: Planned) -> Result<NativeValue> {
    match planned {
        Planned::Value(value) => Ok(value),
        Planned::Array(built) => array::create(conn, built),
        Planned::Struct(nested) => materialize(conn, nested).map(NativeValue::Struct),
    }
}
