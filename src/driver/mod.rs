// Driver Seam
//
// The minimal contract the marshaling engine needs from a database driver:
// an object factory for composite values, a statement that accepts native
// parameter values, and a callable statement that yields successive results.

mod buffered;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use buffered::{BufferedCallableStatement, BufferedConnection, BufferedResultSet, BufferedStatement};

use crate::error::DriverError;
use crate::native::{ArrayData, ClobHandle, NativeArray, NativeStruct, NativeValue};
use crate::types::SqlType;
use crate::value::Value;

/// Column metadata reported by a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: SqlType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable,
        }
    }
}

/// Terminal outcome of a callable statement once no result sets remain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionSummary {
    pub affected_row_count: u64,
    pub last_insert_id: Option<Value>,
}

/// Factory for driver-native composite objects.
pub trait Connection {
    fn create_clob(&self, national: bool) -> Result<ClobHandle, DriverError>;

    fn create_array_of(&self, element_type: &str, data: ArrayData) -> Result<NativeArray, DriverError>;

    fn create_struct(&self, type_name: &str, attributes: Vec<NativeValue>) -> Result<NativeStruct, DriverError>;
}

/// A parameterized statement; indices are 1-based.
pub trait PreparedStatement {
    fn set(&mut self, index: usize, value: NativeValue) -> Result<(), DriverError>;
}

/// Forward-only result set.
pub trait ResultSet: Send {
    fn columns(&self) -> &[ColumnDefinition];

    /// Next row as one cell per column, `None` when exhausted.
    fn next_row(&mut self) -> Result<Option<Vec<Option<Value>>>, DriverError>;
}

/// Statement producing zero or more result sets followed by an execution summary.
pub trait CallableStatement: Send {
    /// Moves to the next result; the first call positions on the first one.
    /// Returns `false` once no result sets remain.
    fn next_result(&mut self) -> Result<bool, DriverError>;

    /// Takes the result set the statement is positioned on.
    fn result_set(&mut self) -> Result<Box<dyn ResultSet>, DriverError>;

    fn execution_summary(&mut self) -> Result<ExecutionSummary, DriverError>;

    /// Releases the statement and its connection.
    fn close(&mut self) -> Result<(), DriverError>;
}
