// Buffered Driver
//
// Fully materialized implementations of the driver seam. Drivers whose wire
// protocol delivers every result up front (PostgreSQL's simple query flow)
// buffer into these, and they double as an in-process driver.

use std::collections::{BTreeMap, VecDeque};

use crate::driver::{CallableStatement, ColumnDefinition, Connection, ExecutionSummary, PreparedStatement, ResultSet};
use crate::error::DriverError;
use crate::native::{ArrayData, ClobHandle, NativeArray, NativeStruct, NativeValue};
use crate::value::Value;

/// Object factory that builds composite values in memory.
#[derive(Debug, Default)]
pub struct BufferedConnection {
    next_locator: std::sync::atomic::AtomicU64,
}

impl BufferedConnection {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connection for BufferedConnection {
    fn create_clob(&self, national: bool) -> Result<ClobHandle, DriverError> {
        let locator = self
            .next_locator
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(ClobHandle::new(national, Some(locator)))
    }

    fn create_array_of(&self, element_type: &str, data: ArrayData) -> Result<NativeArray, DriverError> {
        Ok(NativeArray {
            element_type: element_type.to_string(),
            data,
        })
    }

    fn create_struct(&self, type_name: &str, attributes: Vec<NativeValue>) -> Result<NativeStruct, DriverError> {
        Ok(NativeStruct {
            type_name: type_name.to_string(),
            attributes,
        })
    }
}

/// Statement that records every bound parameter by index.
#[derive(Debug, Default)]
pub struct BufferedStatement {
    values: BTreeMap<usize, NativeValue>,
}

impl BufferedStatement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&NativeValue> {
        self.values.get(&index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bound values in index order.
    pub fn into_values(self) -> Vec<NativeValue> {
        self.values.into_values().collect()
    }
}

impl PreparedStatement for BufferedStatement {
    fn set(&mut self, index: usize, value: NativeValue) -> Result<(), DriverError> {
        if index == 0 {
            return Err(DriverError::new("Parameter indices start at 1").with_state("07009"));
        }
        self.values.insert(index, value);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BufferedResultSet {
    columns: Vec<ColumnDefinition>,
    rows: VecDeque<Vec<Option<Value>>>,
}

impl BufferedResultSet {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self {
            columns,
            rows: VecDeque::new(),
        }
    }

    pub fn with_rows(columns: Vec<ColumnDefinition>, rows: Vec<Vec<Option<Value>>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Option<Value>>) {
        self.rows.push_back(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl ResultSet for BufferedResultSet {
    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Option<Value>>>, DriverError> {
        Ok(self.rows.pop_front())
    }
}

/// Callable statement over results that were already fetched.
#[derive(Debug, Default)]
pub struct BufferedCallableStatement {
    pending: VecDeque<BufferedResultSet>,
    current: Option<BufferedResultSet>,
    summary: ExecutionSummary,
    closed: bool,
}

impl BufferedCallableStatement {
    pub fn new(results: Vec<BufferedResultSet>, summary: ExecutionSummary) -> Self {
        Self {
            pending: results.into(),
            current: None,
            summary,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::new("Statement is closed").with_state("HY010"));
        }
        Ok(())
    }
}

impl CallableStatement for BufferedCallableStatement {
    fn next_result(&mut self) -> Result<bool, DriverError> {
        self.ensure_open()?;
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn result_set(&mut self) -> Result<Box<dyn ResultSet>, DriverError> {
        self.ensure_open()?;
        self.current
            .take()
            .map(|rs| Box::new(rs) as Box<dyn ResultSet>)
            .ok_or_else(|| DriverError::new("No result set is available").with_state("24000"))
    }

    fn execution_summary(&mut self) -> Result<ExecutionSummary, DriverError> {
        self.ensure_open()?;
        Ok(self.summary.clone())
    }

    fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.pending.clear();
        self.current = None;
        Ok(())
    }
}
