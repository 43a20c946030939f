// Type Vocabulary
//
// `SqlType` is the semantic name a caller tags a value with ("DECIMAL",
// "TIME WITH TIMEZONE", ...). `NativeType` is the driver-level code a bound
// parameter ends up with; codes follow the `java.sql.Types` numbering that
// most SQL drivers agree on.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

/// Semantic SQL type name of a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    Varchar,
    Char,
    Text,
    NChar,
    NVarchar,
    Bit,
    Boolean,
    Integer,
    BigInt,
    SmallInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Binary,
    VarBinary,
    Blob,
    Clob,
    NClob,
    Date,
    Time,
    TimeWithTimezone,
    Timestamp,
    TimestampWithTimezone,
    DateTime,
    Array,
    Ref,
    Struct,
    Row,
    /// Any name outside the built-in vocabulary; handled by the converter hook.
    Custom(String),
}

static VOCABULARY: Lazy<HashMap<&'static str, SqlType>> = Lazy::new(|| {
    [
        SqlType::Varchar,
        SqlType::Char,
        SqlType::Text,
        SqlType::NChar,
        SqlType::NVarchar,
        SqlType::Bit,
        SqlType::Boolean,
        SqlType::Integer,
        SqlType::BigInt,
        SqlType::SmallInt,
        SqlType::Float,
        SqlType::Real,
        SqlType::Double,
        SqlType::Numeric,
        SqlType::Decimal,
        SqlType::Binary,
        SqlType::VarBinary,
        SqlType::Blob,
        SqlType::Clob,
        SqlType::NClob,
        SqlType::Date,
        SqlType::Time,
        SqlType::TimeWithTimezone,
        SqlType::Timestamp,
        SqlType::TimestampWithTimezone,
        SqlType::DateTime,
        SqlType::Array,
        SqlType::Ref,
        SqlType::Struct,
        SqlType::Row,
    ]
    .into_iter()
    .map(|ty| (ty.builtin_name(), ty))
    .collect()
});

impl SqlType {
    /// Looks a type name up in the vocabulary; unknown names become `Custom`.
    pub fn from_name(name: &str) -> SqlType {
        VOCABULARY
            .get(name)
            .cloned()
            .unwrap_or_else(|| SqlType::Custom(name.to_string()))
    }

    pub fn name(&self) -> &str {
        match self {
            SqlType::Custom(name) => name,
            other => other.builtin_name(),
        }
    }

    fn builtin_name(&self) -> &'static str {
        match self {
            SqlType::Varchar => "VARCHAR",
            SqlType::Char => "CHAR",
            SqlType::Text => "TEXT",
            SqlType::NChar => "NCHAR",
            SqlType::NVarchar => "NVARCHAR",
            SqlType::Bit => "BIT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Float => "FLOAT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Numeric => "NUMERIC",
            SqlType::Decimal => "DECIMAL",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "VARBINARY",
            SqlType::Blob => "BLOB",
            SqlType::Clob => "CLOB",
            SqlType::NClob => "NCLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::TimeWithTimezone => "TIME WITH TIMEZONE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TimestampWithTimezone => "TIMESTAMP WITH TIMEZONE",
            SqlType::DateTime => "DATETIME",
            SqlType::Array => "ARRAY",
            SqlType::Ref => "REF",
            SqlType::Struct => "STRUCT",
            SqlType::Row => "ROW",
            SqlType::Custom(_) => "",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, SqlType::Custom(_))
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for SqlType {
    fn from(name: &str) -> Self {
        SqlType::from_name(name)
    }
}

/// Driver-level type code of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Null,
    Varchar,
    Char,
    NChar,
    NVarchar,
    LongVarchar,
    Bit,
    Boolean,
    Integer,
    BigInt,
    SmallInt,
    Float,
    Real,
    Double,
    Numeric,
    Decimal,
    Binary,
    VarBinary,
    LongVarBinary,
    Clob,
    NClob,
    Date,
    Time,
    TimeWithTimezone,
    Timestamp,
    TimestampWithTimezone,
    Array,
    Ref,
    Struct,
    RowId,
    SqlXml,
    /// Vendor code supplied by a custom converter
    Other(i32),
}

impl NativeType {
    pub fn code(self) -> i32 {
        match self {
            NativeType::Null => 0,
            NativeType::Varchar => 12,
            NativeType::Char => 1,
            NativeType::NChar => -15,
            NativeType::NVarchar => -9,
            NativeType::LongVarchar => -1,
            NativeType::Bit => -7,
            NativeType::Boolean => 16,
            NativeType::Integer => 4,
            NativeType::BigInt => -5,
            NativeType::SmallInt => 5,
            NativeType::Float => 6,
            NativeType::Real => 7,
            NativeType::Double => 8,
            NativeType::Numeric => 2,
            NativeType::Decimal => 3,
            NativeType::Binary => -2,
            NativeType::VarBinary => -3,
            NativeType::LongVarBinary => -4,
            NativeType::Clob => 2005,
            NativeType::NClob => 2011,
            NativeType::Date => 91,
            NativeType::Time => 92,
            NativeType::TimeWithTimezone => 2013,
            NativeType::Timestamp => 93,
            NativeType::TimestampWithTimezone => 2014,
            NativeType::Array => 2003,
            NativeType::Ref => 2006,
            NativeType::Struct => 2002,
            NativeType::RowId => -8,
            NativeType::SqlXml => 2009,
            NativeType::Other(code) => code,
        }
    }
}

/// Resolves a built-in SQL type to its native code.
///
/// BLOB and CLOB/NCLOB also look at the runtime shape of the raw value: a
/// streamed channel resolves to the long variant. Returns `None` for custom
/// names, which the caller hands to the converter hook.
pub fn resolve(sql_type: &SqlType, value: Option<&Value>) -> Option<NativeType> {
    let native = match sql_type {
        SqlType::Varchar | SqlType::Text => NativeType::Varchar,
        SqlType::Char => NativeType::Char,
        SqlType::NChar => NativeType::NChar,
        SqlType::NVarchar => NativeType::NVarchar,
        SqlType::Bit => NativeType::Bit,
        SqlType::Boolean => NativeType::Boolean,
        SqlType::Integer => NativeType::Integer,
        SqlType::BigInt => NativeType::BigInt,
        SqlType::SmallInt => NativeType::SmallInt,
        SqlType::Float => NativeType::Float,
        SqlType::Real => NativeType::Real,
        SqlType::Double => NativeType::Double,
        SqlType::Numeric => NativeType::Numeric,
        SqlType::Decimal => NativeType::Decimal,
        SqlType::Binary => NativeType::Binary,
        SqlType::VarBinary => NativeType::VarBinary,
        SqlType::Blob => match value {
            Some(Value::ByteStream(_)) => NativeType::LongVarBinary,
            _ => NativeType::VarBinary,
        },
        SqlType::Clob | SqlType::NClob => match value {
            Some(Value::CharStream(_)) => NativeType::LongVarchar,
            _ => NativeType::Clob,
        },
        SqlType::Date => NativeType::Date,
        SqlType::Time => NativeType::Time,
        SqlType::TimeWithTimezone => NativeType::TimeWithTimezone,
        SqlType::Timestamp | SqlType::DateTime => NativeType::Timestamp,
        SqlType::TimestampWithTimezone => NativeType::TimestampWithTimezone,
        SqlType::Array => NativeType::Array,
        SqlType::Ref => NativeType::Ref,
        SqlType::Struct => NativeType::Struct,
        SqlType::Row => NativeType::RowId,
        SqlType::Custom(_) => return None,
    };
    Some(native)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ByteChannel, CharChannel};

    #[test]
    fn test_from_name_round_trips_vocabulary() {
        for name in ["VARCHAR", "NVARCHAR", "TIME WITH TIMEZONE", "TIMESTAMP WITH TIMEZONE", "ROW"] {
            let ty = SqlType::from_name(name);
            assert!(!ty.is_custom(), "{} should be built in", name);
            assert_eq!(ty.name(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_custom() {
        let ty = SqlType::from_name("JSONB");
        assert_eq!(ty, SqlType::Custom("JSONB".to_string()));
        assert_eq!(ty.to_string(), "JSONB");
        assert_eq!(resolve(&ty, None), None);
    }

    #[test]
    fn test_resolve_scalars() {
        assert_eq!(resolve(&SqlType::Text, None), Some(NativeType::Varchar));
        assert_eq!(resolve(&SqlType::DateTime, None), Some(NativeType::Timestamp));
        assert_eq!(resolve(&SqlType::Row, None), Some(NativeType::RowId));
        assert_eq!(NativeType::Integer.code(), 4);
        assert_eq!(NativeType::TimestampWithTimezone.code(), 2014);
    }

    #[test]
    fn test_resolve_blob_and_clob_by_shape() {
        let bytes = Value::Bytes(vec![1, 2]);
        let stream = Value::ByteStream(ByteChannel::from_bytes(vec![1, 2]));
        assert_eq!(resolve(&SqlType::Blob, Some(&bytes)), Some(NativeType::VarBinary));
        assert_eq!(resolve(&SqlType::Blob, Some(&stream)), Some(NativeType::LongVarBinary));

        let text = Value::Text("abc".into());
        let chars = Value::CharStream(CharChannel::from_text("abc"));
        assert_eq!(resolve(&SqlType::Clob, Some(&text)), Some(NativeType::Clob));
        assert_eq!(resolve(&SqlType::NClob, Some(&chars)), Some(NativeType::LongVarchar));
    }
}
