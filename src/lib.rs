// SQL Parameter Marshaling
//
// Type-directed parameter marshaling and result retrieval for SQL drivers.
//
// Callers tag host values with the SQL type they intend (`TypedValue`), and
// the `StatementProcessor` converts and binds them to statement slots
// through the driver seam in `driver`. Results of callable statements are
// walked with `ProcedureCallResult`.
//
// Example:
//
//   use sqlx_marshal::{driver::postgres, TypedValue};
//
//   let params = [
//       TypedValue::new("INTEGER", 42).into(),
//       TypedValue::new("TIMESTAMP", "2024-01-01 10:00:00").into(),
//   ];
//   let mut call = postgres::call(&pool, "CALL audit($1, $2)", &params, vec![]).await?;
//   while call.next_query_result()? {
//       for row in call.take_query_result().unwrap() {
//           println!("{:?}", row?);
//       }
//   }

extern crate self as sqlx_marshal;

pub mod cursor;
pub mod driver;
pub mod error;
pub mod native;
pub mod processor;
pub mod temporal;
pub mod types;
pub mod value;

pub use sqlx_marshal_macros::SqlStruct;

pub use cursor::{CursorState, ProcedureCallResult, ProcedureCallState, RowStream};
pub use driver::{CallableStatement, ColumnDefinition, Connection, ExecutionSummary, PreparedStatement, ResultSet};
pub use error::{DriverError, Error, ErrorKind, Result};
pub use native::{ArrayData, NativeArray, NativeStruct, NativeValue};
pub use processor::{DefaultConverter, ParameterConverter, StatementProcessor};
pub use types::{NativeType, SqlType};
pub use value::{
    ArrayValue, ByteChannel, CharChannel, CivilDateTime, DateRecord, FieldDef, FieldKind, IntoValue, Parameter,
    RecordType, StructuredRecord, StructuredType, TimeOfDay, TypedValue, UtcInstant, Value, ZoneOffsetRecord,
};
