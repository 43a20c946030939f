// Statement Processor
//
// Binding entry point. `StatementProcessor` resolves each parameter's SQL
// type, dispatches to the matching `ParameterConverter` category and hands
// the native value to the driver statement.

pub mod array;
pub mod scalar;
pub mod structs;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::driver::{Connection, PreparedStatement};
use crate::error::{Error, Result};
use crate::native::{NativeArray, NativeStruct, NativeValue};
use crate::types::{self, NativeType, SqlType};
use crate::value::{ArrayValue, Parameter, StructuredRecord, TypedValue, Value};

/// Conversion capability, one method per SQL type category.
///
/// Every method has a default; implementors override a category or the
/// custom-type hooks and keep the rest.
///
/// # Example
///
/// ```ignore
/// struct JsonConverter;
///
/// impl ParameterConverter for JsonConverter {
///     fn resolve_custom_type(&self, name: &str) -> Option<NativeType> {
///         (name == "JSON").then_some(NativeType::Other(1111))
///     }
///
///     fn convert_custom(&self, _: &dyn Connection, _: &SqlType, value: &Value) -> Result<NativeValue> {
///         Ok(NativeValue::String(value.literal()))
///     }
/// }
///
/// let processor = StatementProcessor::with_converter(JsonConverter);
/// ```
pub trait ParameterConverter: Send + Sync {
    fn convert_integer(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::integer(sql_type, value)
    }

    fn convert_float(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::float(sql_type, value)
    }

    fn convert_decimal(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::decimal(sql_type, value)
    }

    fn convert_boolean(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::boolean(sql_type, value)
    }

    fn convert_string(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::string(sql_type, value)
    }

    fn convert_binary(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::binary(sql_type, value)
    }

    fn convert_clob(&self, conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::clob(conn, sql_type, value)
    }

    fn convert_date(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::date(sql_type, value)
    }

    fn convert_time(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::time(sql_type, value)
    }

    fn convert_timestamp(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::timestamp(sql_type, value)
    }

    fn convert_row(&self, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        scalar::row(sql_type, value)
    }

    fn convert_array(&self, conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        array::bind(self, conn, sql_type, value)
    }

    fn convert_struct(&self, conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        structs::bind(conn, sql_type, value)
    }

    /// Native code for a type name outside the built-in vocabulary.
    fn resolve_custom_type(&self, _name: &str) -> Option<NativeType> {
        None
    }

    fn convert_custom(&self, _conn: &dyn Connection, sql_type: &SqlType, _value: &Value) -> Result<NativeValue> {
        Err(Error::UnsupportedType(sql_type.name().to_string()))
    }

    fn convert_custom_array(&self, element_type: &SqlType, _elements: &[TypedValue]) -> Result<NativeArray> {
        Err(Error::UnsupportedType(format!("{} as an array element type", element_type)))
    }
}

/// Converter with only the built-in behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConverter;

impl ParameterConverter for DefaultConverter {}

static GLOBAL: Lazy<StatementProcessor> = Lazy::new(StatementProcessor::new);

/// Stateless binding service; share one instance freely across callers.
pub struct StatementProcessor {
    converter: Box<dyn ParameterConverter>,
}

impl Default for StatementProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementProcessor {
    pub fn new() -> Self {
        Self::with_converter(DefaultConverter)
    }

    pub fn with_converter<C: ParameterConverter + 'static>(converter: C) -> Self {
        Self {
            converter: Box::new(converter),
        }
    }

    /// Process-wide processor using `DefaultConverter`, created on first use.
    pub fn global() -> &'static StatementProcessor {
        &GLOBAL
    }

    pub fn converter(&self) -> &dyn ParameterConverter {
        self.converter.as_ref()
    }

    /// Binds one parameter at the 1-based `index` and returns its native type.
    pub fn bind(
        &self,
        conn: &dyn Connection,
        stmt: &mut dyn PreparedStatement,
        index: usize,
        param: &Parameter,
    ) -> Result<NativeType> {
        let (native_type, native) = self.convert_typed(conn, param)?;
        debug!(
            index,
            sql_type = %describe(param),
            native_type = native_type.code(),
            "binding parameter"
        );
        stmt.set(index, native)
            .map_err(|e| Error::database(format!("Error while binding parameter {}.", index), e))?;
        Ok(native_type)
    }

    /// Binds `params` in order starting at index 1.
    pub fn bind_all(
        &self,
        conn: &dyn Connection,
        stmt: &mut dyn PreparedStatement,
        params: &[Parameter],
    ) -> Result<Vec<NativeType>> {
        params
            .iter()
            .enumerate()
            .map(|(i, param)| self.bind(conn, stmt, i + 1, param))
            .collect()
    }

    /// Native code of a typed value; custom names go to the converter hook.
    pub fn resolve(&self, typed: &TypedValue) -> Result<NativeType> {
        types::resolve(&typed.sql_type, typed.value.as_ref())
            .or_else(|| self.converter.resolve_custom_type(typed.sql_type.name()))
            .ok_or_else(|| Error::UnsupportedType(typed.sql_type.name().to_string()))
    }

    /// Converts a parameter to the native value a driver binds.
    pub fn convert(&self, conn: &dyn Connection, param: &Parameter) -> Result<NativeValue> {
        self.convert_typed(conn, param).map(|(_, native)| native)
    }

    fn convert_typed(&self, conn: &dyn Connection, param: &Parameter) -> Result<(NativeType, NativeValue)> {
        match param {
            Parameter::Null => Ok((NativeType::Null, NativeValue::Null(NativeType::Null))),
            Parameter::Raw(value) => raw(value),
            Parameter::Typed(typed) => {
                let native_type = self.resolve(typed)?;
                let native = match &typed.value {
                    Some(value) => self.dispatch(conn, &typed.sql_type, value)?,
                    None => NativeValue::Null(null_type(native_type)),
                };
                Ok((native_type, native))
            }
        }
    }

    /// Native array for an array parameter; a null array yields `None`.
    pub fn build_array(&self, array: Option<&ArrayValue>) -> Result<Option<NativeArray>> {
        array::build(self.converter(), array)
    }

    pub fn build_struct(&self, conn: &dyn Connection, record: &StructuredRecord) -> Result<NativeStruct> {
        structs::build(conn, record)
    }

    fn dispatch(&self, conn: &dyn Connection, sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
        let c = self.converter();
        match sql_type {
            SqlType::Integer | SqlType::BigInt | SqlType::SmallInt => c.convert_integer(sql_type, value),
            SqlType::Float | SqlType::Real | SqlType::Double => c.convert_float(sql_type, value),
            SqlType::Numeric | SqlType::Decimal => c.convert_decimal(sql_type, value),
            SqlType::Bit | SqlType::Boolean => c.convert_boolean(sql_type, value),
            SqlType::Varchar | SqlType::Char | SqlType::Text | SqlType::NChar | SqlType::NVarchar => {
                c.convert_string(sql_type, value)
            }
            SqlType::Binary | SqlType::VarBinary | SqlType::Blob => c.convert_binary(sql_type, value),
            SqlType::Clob | SqlType::NClob => c.convert_clob(conn, sql_type, value),
            SqlType::Date => c.convert_date(sql_type, value),
            SqlType::Time | SqlType::TimeWithTimezone => c.convert_time(sql_type, value),
            SqlType::Timestamp | SqlType::TimestampWithTimezone | SqlType::DateTime => {
                c.convert_timestamp(sql_type, value)
            }
            SqlType::Array => c.convert_array(conn, sql_type, value),
            SqlType::Struct | SqlType::Ref => c.convert_struct(conn, sql_type, value),
            SqlType::Row => c.convert_row(sql_type, value),
            SqlType::Custom(_) => c.convert_custom(conn, sql_type, value),
        }
    }
}

/// REAL nulls bind as FLOAT.
fn null_type(native_type: NativeType) -> NativeType {
    match native_type {
        NativeType::Real => NativeType::Float,
        other => other,
    }
}

fn raw(value: &Value) -> Result<(NativeType, NativeValue)> {
    let bound = match value {
        Value::Text(s) => (NativeType::Varchar, NativeValue::String(s.clone())),
        Value::Int(i) => (NativeType::BigInt, NativeValue::BigInt(*i as i64)),
        Value::Long(i) => (NativeType::BigInt, NativeValue::BigInt(*i)),
        Value::Float(f) => (NativeType::Double, NativeValue::Double(*f as f64)),
        Value::Double(f) => (NativeType::Double, NativeValue::Double(*f)),
        Value::Decimal(d) => (NativeType::Numeric, NativeValue::Decimal(*d)),
        Value::Boolean(b) => (NativeType::Boolean, NativeValue::Boolean(*b)),
        Value::Bytes(b) => (NativeType::VarBinary, NativeValue::Bytes(b.clone())),
        Value::Xml(x) => (NativeType::SqlXml, NativeValue::Xml(x.clone())),
        other => {
            return Err(Error::application(format!(
                "Unsupported parameter type: {}; wrap the value in a typed value with an explicit SQL type",
                other.kind()
            )))
        }
    };
    Ok(bound)
}

fn describe(param: &Parameter) -> String {
    match param {
        Parameter::Null => "NULL".to_string(),
        Parameter::Raw(value) => value.kind().to_string(),
        Parameter::Typed(typed) => typed.sql_type.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BufferedConnection, BufferedStatement};
    use crate::value::TimeOfDay;
    use rust_decimal::Decimal;

    fn bind_one(param: Parameter) -> Result<(NativeType, NativeValue)> {
        let conn = BufferedConnection::new();
        let mut stmt = BufferedStatement::new();
        let ty = StatementProcessor::global().bind(&conn, &mut stmt, 1, &param)?;
        Ok((ty, stmt.into_values().remove(0)))
    }

    #[test]
    fn test_null_binds_typed_null_for_every_builtin() {
        for name in [
            "VARCHAR", "CHAR", "TEXT", "NCHAR", "NVARCHAR", "BIT", "BOOLEAN", "INTEGER", "BIGINT",
            "SMALLINT", "FLOAT", "DOUBLE", "NUMERIC", "DECIMAL", "BINARY", "VARBINARY", "BLOB",
            "CLOB", "NCLOB", "DATE", "TIME", "TIMESTAMP", "DATETIME", "ARRAY", "STRUCT", "ROW",
        ] {
            let (ty, value) = bind_one(TypedValue::null(name).into()).unwrap();
            assert_eq!(value, NativeValue::Null(ty), "null {} should bind as typed null", name);
        }
    }

    #[test]
    fn test_real_null_binds_as_float() {
        let (ty, value) = bind_one(TypedValue::null("REAL").into()).unwrap();
        assert_eq!(ty, NativeType::Real);
        assert_eq!(value, NativeValue::Null(NativeType::Float));
    }

    #[test]
    fn test_raw_parameters() {
        let (ty, value) = bind_one(Value::Int(5).into()).unwrap();
        assert_eq!(ty, NativeType::BigInt);
        assert_eq!(value, NativeValue::BigInt(5));

        let (ty, value) = bind_one(Value::Decimal(Decimal::ONE).into()).unwrap();
        assert_eq!(ty, NativeType::Numeric);
        assert_eq!(value, NativeValue::Decimal(Decimal::ONE));

        let (ty, _) = bind_one(Parameter::Null).unwrap();
        assert_eq!(ty, NativeType::Null);

        let err = bind_one(Value::TimeOfDay(TimeOfDay::new(1, 2, Decimal::ZERO)).into()).unwrap_err();
        assert!(err.to_string().contains("time of day"));
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = bind_one(TypedValue::new("GEOMETRY", "POINT(1 2)").into()).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported SQL type: GEOMETRY");
    }

    #[test]
    fn test_ref_binds_like_struct() {
        let point = std::sync::Arc::new(crate::value::RecordType::new(
            "Point",
            vec![crate::value::FieldDef::new("x", crate::value::FieldKind::Int)],
        ));
        let record = StructuredRecord::new(point).with("x", Some(Value::Int(1)));

        let (ty, value) = bind_one(TypedValue::new("REF", record).into()).unwrap();
        assert_eq!(ty, NativeType::Ref);
        match value {
            NativeValue::Struct(s) => {
                assert_eq!(s.type_name, "POINT");
                assert_eq!(s.attributes, vec![NativeValue::Integer(1)]);
            }
            other => panic!("Expected struct, got {:?}", other),
        }

        let err = bind_one(TypedValue::new("REF", "x").into()).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }

    struct JsonConverter;

    impl ParameterConverter for JsonConverter {
        fn resolve_custom_type(&self, name: &str) -> Option<NativeType> {
            (name == "JSON").then_some(NativeType::Other(1111))
        }

        fn convert_custom(&self, _conn: &dyn Connection, _sql_type: &SqlType, value: &Value) -> Result<NativeValue> {
            Ok(NativeValue::String(value.literal()))
        }
    }

    #[test]
    fn test_custom_converter_hook() {
        let processor = StatementProcessor::with_converter(JsonConverter);
        let conn = BufferedConnection::new();
        let mut stmt = BufferedStatement::new();
        let ty = processor
            .bind(&conn, &mut stmt, 1, &TypedValue::new("JSON", "{\"a\":1}").into())
            .unwrap();
        assert_eq!(ty.code(), 1111);
        assert_eq!(stmt.get(1), Some(&NativeValue::String("{\"a\":1}".into())));

        // built-in categories still use the defaults
        let ty = processor
            .bind(&conn, &mut stmt, 2, &TypedValue::new("SMALLINT", 3).into())
            .unwrap();
        assert_eq!(ty, NativeType::SmallInt);
    }

    #[test]
    fn test_bind_all_uses_one_based_indices() {
        let conn = BufferedConnection::new();
        let mut stmt = BufferedStatement::new();
        let params: Vec<Parameter> = vec![
            TypedValue::new("VARCHAR", "a").into(),
            TypedValue::new("INTEGER", 2).into(),
        ];
        let types = StatementProcessor::global().bind_all(&conn, &mut stmt, &params).unwrap();
        assert_eq!(types, vec![NativeType::Varchar, NativeType::Integer]);
        assert_eq!(stmt.get(2), Some(&NativeValue::Integer(2)));
        assert!(stmt.get(0).is_none());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(StatementProcessor::global(), StatementProcessor::global()));
    }
}
