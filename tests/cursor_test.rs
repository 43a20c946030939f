// Procedure call result walking
//
// Drives ProcedureCallResult over in-memory callable statements: declared
// row shapes, shape count mismatches, driver failures and close semantics.
//
// Run with:
//   cargo test --test cursor_test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx_marshal::driver::{BufferedCallableStatement, BufferedResultSet};
use sqlx_marshal::{
    CallableStatement, ColumnDefinition, CursorState, DriverError, ErrorKind, ExecutionSummary, FieldDef, FieldKind,
    ProcedureCallResult, RecordType, ResultSet, SqlType, Value,
};

fn order_rows() -> BufferedResultSet {
    BufferedResultSet::with_rows(
        vec![
            ColumnDefinition::new("ORDER_ID", SqlType::BigInt, false),
            ColumnDefinition::new("Total", SqlType::Decimal, true),
        ],
        vec![
            vec![Some(Value::Long(100)), Some(Value::Decimal(rust_decimal::Decimal::new(1999, 2)))],
            vec![Some(Value::Long(101)), None],
        ],
    )
}

fn order_shape() -> Arc<RecordType> {
    Arc::new(RecordType::new(
        "Order",
        vec![
            FieldDef::new("order_id", FieldKind::Int),
            FieldDef::new("total", FieldKind::Decimal).nullable(),
        ],
    ))
}

#[test]
fn test_each_result_set_uses_next_declared_shape() {
    let customers = BufferedResultSet::with_rows(
        vec![ColumnDefinition::new("name", SqlType::Varchar, false)],
        vec![vec![Some(Value::Text("Ada".into()))]],
    );
    let customer_shape = Arc::new(RecordType::new("Customer", vec![FieldDef::new("Name", FieldKind::Text)]));
    let stmt = BufferedCallableStatement::new(vec![order_rows(), customers], ExecutionSummary::default());
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![order_shape(), customer_shape]);

    assert!(call.next_query_result().unwrap());
    let orders = call.take_query_result().unwrap();
    assert_eq!(orders.shape().name, "Order");
    let orders: Vec<_> = orders.collect::<Result<_, _>>().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].get("order_id"), Some(&Value::Long(100)));
    assert_eq!(orders[1].get("total"), None);
    assert_eq!(call.call_state().current_shape_index(), 1);

    assert!(call.next_query_result().unwrap());
    let customers: Vec<_> = call.query_result().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(customers[0].get("Name"), Some(&Value::Text("Ada".into())));

    assert!(!call.next_query_result().unwrap());
    assert_eq!(call.state(), CursorState::ExecutionSummary);
    assert_eq!(call.execution_result(), Some(&ExecutionSummary::default()));
}

#[test]
fn test_more_result_sets_than_declared_shapes() {
    let stmt = BufferedCallableStatement::new(
        vec![order_rows(), order_rows(), order_rows()],
        ExecutionSummary::default(),
    );
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![order_shape(), order_shape()]);

    assert!(call.next_query_result().unwrap());
    assert!(call.next_query_result().unwrap());
    let err = call.next_query_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(
        err.to_string(),
        "Error when accessing the next query result. \
         The record description array count does not match with the returned result sets count."
    );
}

#[test]
fn test_no_declared_shapes_infers_from_columns() {
    let stmt = BufferedCallableStatement::new(vec![order_rows()], ExecutionSummary::default());
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![]);

    assert!(call.next_query_result().unwrap());
    let rows = call.query_result().unwrap();
    assert_eq!(rows.shape().name, sqlx_marshal::cursor::DEFAULT_SHAPE_NAME);
    assert_eq!(rows.shape().fields[0].name, "ORDER_ID");
    let first = rows.next().unwrap().unwrap();
    assert_eq!(first.get("ORDER_ID"), Some(&Value::Long(100)));
}

#[test]
fn test_column_type_incompatible_with_field_fails_on_advance() {
    let rows = BufferedResultSet::with_rows(
        vec![ColumnDefinition::new("id", SqlType::Varchar, false)],
        vec![vec![Some(Value::Text("abc".into()))]],
    );
    let shape = Arc::new(RecordType::new("Row", vec![FieldDef::new("id", FieldKind::Int)]));
    let stmt = BufferedCallableStatement::new(vec![rows], ExecutionSummary::default());
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![shape]);

    let err = call.next_query_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    let msg = err.to_string();
    assert!(msg.starts_with("Error when accessing the next query result."));
    assert!(msg.contains("'id' of type VARCHAR"), "unexpected message: {}", msg);
    assert!(msg.contains("record type 'Row'"));
}

#[test]
fn test_null_cell_in_non_nullable_field_is_rejected() {
    let rows = BufferedResultSet::with_rows(
        vec![ColumnDefinition::new("id", SqlType::Integer, true)],
        vec![vec![Some(Value::Int(1))], vec![None], vec![Some(Value::Int(3))]],
    );
    let shape = Arc::new(RecordType::new("Row", vec![FieldDef::new("id", FieldKind::Int)]));
    let stmt = BufferedCallableStatement::new(vec![rows], ExecutionSummary::default());
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![shape]);

    assert!(call.next_query_result().unwrap());
    let mut rows = call.take_query_result().unwrap();
    assert_eq!(rows.next().unwrap().unwrap().get("id"), Some(&Value::Int(1)));

    let err = rows.next().unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Application);
    assert_eq!(
        err.to_string(),
        "Null value returned for the non-nullable field 'id' of record type 'Row'"
    );
    assert!(rows.next().is_none());
}

/// Callable statement that fails on demand and counts close calls.
struct ScriptedStatement {
    fail_next: bool,
    closes: Arc<AtomicUsize>,
}

impl CallableStatement for ScriptedStatement {
    fn next_result(&mut self) -> Result<bool, DriverError> {
        if self.fail_next {
            return Err(DriverError::new("connection reset").with_state("08006"));
        }
        Ok(false)
    }

    fn result_set(&mut self) -> Result<Box<dyn ResultSet>, DriverError> {
        Err(DriverError::new("no result set").with_state("24000"))
    }

    fn execution_summary(&mut self) -> Result<ExecutionSummary, DriverError> {
        Ok(ExecutionSummary {
            affected_row_count: 4,
            last_insert_id: None,
        })
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_driver_failure_surfaces_as_database_error() {
    let stmt = ScriptedStatement {
        fail_next: true,
        closes: Arc::new(AtomicUsize::new(0)),
    };
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![]);

    let err = call.next_query_result().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert!(err.to_string().contains("connection reset"));
    let source = std::error::Error::source(&err).expect("driver error source");
    let driver = source.downcast_ref::<DriverError>().expect("DriverError source");
    assert_eq!(driver.sql_state.as_deref(), Some("08006"));
}

#[test]
fn test_close_is_idempotent() {
    let closes = Arc::new(AtomicUsize::new(0));
    let stmt = ScriptedStatement {
        fail_next: false,
        closes: closes.clone(),
    };
    let mut call = ProcedureCallResult::new(Box::new(stmt), vec![]);

    assert!(!call.next_query_result().unwrap());
    assert_eq!(call.execution_result().map(|s| s.affected_row_count), Some(4));

    call.close().unwrap();
    call.close().unwrap();
    assert!(call.is_closed());
    drop(call);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_drop_closes_statement() {
    let closes = Arc::new(AtomicUsize::new(0));
    {
        let stmt = ScriptedStatement {
            fail_next: false,
            closes: closes.clone(),
        };
        let _call = ProcedureCallResult::new(Box::new(stmt), vec![]);
    }
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
