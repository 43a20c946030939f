// Result Cursor
//
// A `ProcedureCallResult` owns the statement of one procedure call and walks
// its results: every `next_query_result` call either positions on a new
// result set, exposed as a lazy `RowStream`, or records the final
// `ExecutionSummary`.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::driver::{CallableStatement, ColumnDefinition, ExecutionSummary, ResultSet};
use crate::error::{Error, ErrorKind, Result};
use crate::types::SqlType;
use crate::value::{FieldDef, FieldKind, RecordType, StructuredRecord};

const NEXT_RESULT_CONTEXT: &str = "Error when accessing the next query result.";
const SHAPE_COUNT_MISMATCH: &str =
    "The record description array count does not match with the returned result sets count.";

/// Name of the row shape inferred when the caller declares none.
pub const DEFAULT_SHAPE_NAME: &str = "$default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    ResultAvailable,
    ExecutionSummary,
    Closed,
}

/// Per-call cursor state: the statement handle and the declared row shapes.
pub struct ProcedureCallState {
    statement: Option<Box<dyn CallableStatement>>,
    declared_shapes: Vec<Arc<RecordType>>,
    current_shape_index: usize,
}

impl ProcedureCallState {
    pub fn new(statement: Box<dyn CallableStatement>, declared_shapes: Vec<Arc<RecordType>>) -> Self {
        Self {
            statement: Some(statement),
            declared_shapes,
            current_shape_index: 0,
        }
    }

    pub fn total_declared(&self) -> usize {
        self.declared_shapes.len()
    }

    pub fn current_shape_index(&self) -> usize {
        self.current_shape_index
    }

    /// Shape for the next result set; declared shapes are consumed in order.
    fn next_shape(&mut self, columns: &[ColumnDefinition]) -> Result<Arc<RecordType>> {
        if self.declared_shapes.is_empty() {
            return Ok(Arc::new(infer_shape(columns)));
        }
        if self.current_shape_index >= self.total_declared() {
            return Err(Error::application(SHAPE_COUNT_MISMATCH));
        }
        let shape = self.declared_shapes[self.current_shape_index].clone();
        self.current_shape_index += 1;
        Ok(shape)
    }
}

/// Default row shape: one nullable field per column.
pub fn infer_shape(columns: &[ColumnDefinition]) -> RecordType {
    let fields = columns
        .iter()
        .map(|column| FieldDef::new(column.name.clone(), field_kind(&column.sql_type)).nullable())
        .collect();
    RecordType::new(DEFAULT_SHAPE_NAME, fields)
}

fn field_kind(sql_type: &SqlType) -> FieldKind {
    match sql_type {
        SqlType::Integer | SqlType::BigInt | SqlType::SmallInt => FieldKind::Int,
        SqlType::Float | SqlType::Real | SqlType::Double => FieldKind::Float,
        SqlType::Numeric | SqlType::Decimal => FieldKind::Decimal,
        SqlType::Bit | SqlType::Boolean => FieldKind::Boolean,
        SqlType::Binary | SqlType::VarBinary | SqlType::Blob => FieldKind::Bytes,
        SqlType::Date => FieldKind::Date,
        SqlType::Time | SqlType::TimeWithTimezone => FieldKind::Time,
        SqlType::Timestamp | SqlType::TimestampWithTimezone | SqlType::DateTime => FieldKind::Timestamp,
        SqlType::Custom(name) => FieldKind::Other(name.clone()),
        _ => FieldKind::Text,
    }
}

/// Whether values of a column of `sql_type` can populate a field of `kind`.
fn column_fits(sql_type: &SqlType, kind: &FieldKind) -> bool {
    match (kind, sql_type) {
        (FieldKind::Other(_), _) => true,
        (FieldKind::Record(_), SqlType::Struct) => true,
        (FieldKind::BinaryArray | FieldKind::Array(_), SqlType::Array) => true,
        _ => field_kind(sql_type) == *kind,
    }
}

/// Lazy, forward-only stream of rows decoded into a row shape.
pub struct RowStream {
    shape: Arc<RecordType>,
    result_set: Box<dyn ResultSet>,
    /// Shape field index for every result set column
    column_fields: Vec<usize>,
    done: bool,
}

impl RowStream {
    /// Matches every column of `result_set` to a field of `shape` by
    /// case-insensitive name; the column type must suit the field kind.
    pub fn new(shape: Arc<RecordType>, result_set: Box<dyn ResultSet>) -> Result<Self> {
        let column_fields = result_set
            .columns()
            .iter()
            .map(|column| {
                let index = shape
                    .fields
                    .iter()
                    .position(|field| field.name.eq_ignore_ascii_case(&column.name))
                    .ok_or_else(|| {
                        Error::application(format!(
                            "No mapping field found for SQL table column '{}' in the record type '{}'",
                            column.name, shape.name
                        ))
                    })?;
                let field = &shape.fields[index];
                if !column_fits(&column.sql_type, &field.kind) {
                    return Err(Error::application(format!(
                        "The SQL column '{}' of type {} cannot be mapped to the field '{}' of record type '{}'",
                        column.name, column.sql_type, field.name, shape.name
                    )));
                }
                Ok(index)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            shape,
            result_set,
            column_fields,
            done: false,
        })
    }

    pub fn shape(&self) -> &Arc<RecordType> {
        &self.shape
    }

    fn next_record(&mut self) -> Result<Option<StructuredRecord>> {
        let cells = match self.result_set.next_row() {
            Ok(Some(cells)) => cells,
            Ok(None) => return Ok(None),
            Err(e) => return Err(Error::database("Error when iterating the SQL result.", e)),
        };
        let mut record = StructuredRecord::new(self.shape.clone());
        record.fields = self.shape.fields.iter().map(|f| (f.name.clone(), None)).collect();
        for (cell, &field) in cells.into_iter().zip(&self.column_fields) {
            let def = &self.shape.fields[field];
            if cell.is_none() && !def.nullable {
                return Err(Error::application(format!(
                    "Null value returned for the non-nullable field '{}' of record type '{}'",
                    def.name, self.shape.name
                )));
            }
            record.fields[field].1 = cell;
        }
        Ok(Some(record))
    }
}

impl Iterator for RowStream {
    type Item = Result<StructuredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.next_record().transpose();
        if !matches!(next, Some(Ok(_))) {
            self.done = true;
        }
        next
    }
}

/// Result handle of one procedure call.
pub struct ProcedureCallResult {
    state: ProcedureCallState,
    query_result: Option<RowStream>,
    execution_result: Option<ExecutionSummary>,
    cursor: CursorState,
}

impl ProcedureCallResult {
    pub fn new(statement: Box<dyn CallableStatement>, declared_shapes: Vec<Arc<RecordType>>) -> Self {
        Self {
            state: ProcedureCallState::new(statement, declared_shapes),
            query_result: None,
            execution_result: None,
            cursor: CursorState::Idle,
        }
    }

    pub fn state(&self) -> CursorState {
        self.cursor
    }

    pub fn call_state(&self) -> &ProcedureCallState {
        &self.state
    }

    /// Advances to the next result.
    ///
    /// Returns `true` when a result set is now available through
    /// [`query_result`](Self::query_result), `false` once the execution
    /// summary has been recorded.
    pub fn next_query_result(&mut self) -> Result<bool> {
        self.advance().map_err(|e| match e.kind() {
            ErrorKind::Application => e.with_context(NEXT_RESULT_CONTEXT),
            _ => e,
        })
    }

    fn advance(&mut self) -> Result<bool> {
        let statement = self
            .state
            .statement
            .as_mut()
            .ok_or_else(|| Error::application("The procedure call result is already closed."))?;

        let has_result = statement
            .next_result()
            .map_err(|e| Error::database(NEXT_RESULT_CONTEXT, e))?;
        if !has_result {
            let summary = statement
                .execution_summary()
                .map_err(|e| Error::database(NEXT_RESULT_CONTEXT, e))?;
            debug!(
                affected_row_count = summary.affected_row_count,
                "procedure call finished"
            );
            self.execution_result = Some(summary);
            self.query_result = None;
            self.cursor = CursorState::ExecutionSummary;
            return Ok(false);
        }

        let result_set = statement
            .result_set()
            .map_err(|e| Error::database(NEXT_RESULT_CONTEXT, e))?;
        let shape = self.state.next_shape(result_set.columns())?;
        debug!(
            shape = %shape.name,
            shape_index = self.state.current_shape_index,
            "positioned on next result set"
        );
        self.query_result = Some(RowStream::new(shape, result_set)?);
        self.execution_result = None;
        self.cursor = CursorState::ResultAvailable;
        Ok(true)
    }

    pub fn query_result(&mut self) -> Option<&mut RowStream> {
        self.query_result.as_mut()
    }

    /// Takes ownership of the current row stream.
    pub fn take_query_result(&mut self) -> Option<RowStream> {
        self.query_result.take()
    }

    pub fn execution_result(&self) -> Option<&ExecutionSummary> {
        self.execution_result.as_ref()
    }

    /// Releases the statement. Later calls are no-ops.
    pub fn close(&mut self) -> Result<()> {
        self.query_result = None;
        self.cursor = CursorState::Closed;
        match self.state.statement.take() {
            Some(mut statement) => statement
                .close()
                .map_err(|e| Error::database("Error while closing the procedure call result.", e)),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.statement.is_none()
    }
}

impl Drop for ProcedureCallResult {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close procedure call result");
        }
    }
}
