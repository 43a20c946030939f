// PostgreSQL Adapter
//
// Drives the marshaling engine over sqlx's PostgreSQL driver. Parameters are
// collected as native values and replayed onto a `sqlx::query`; procedure
// calls are executed with `fetch_many` and their results buffered.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::postgres::types::PgTimeTz;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Either, Executor, Postgres, Row, TypeInfo};
use tracing::debug;

use crate::cursor::ProcedureCallResult;
use crate::driver::{
    BufferedCallableStatement, BufferedResultSet, ColumnDefinition, Connection, ExecutionSummary, PreparedStatement,
};
use crate::error::{DriverError, Error, Result};
use crate::native::{ArrayData, ClobHandle, NativeArray, NativeStruct, NativeValue, TimeValue, TimestampValue};
use crate::processor::StatementProcessor;
use crate::types::{NativeType, SqlType};
use crate::value::{IntoValue, Parameter, RecordType, Value};

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Object factory for PostgreSQL; arrays and CLOBs are plain values there.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgConnectionFactory;

impl Connection for PgConnectionFactory {
    fn create_clob(&self, national: bool) -> std::result::Result<ClobHandle, DriverError> {
        Ok(ClobHandle::new(national, None))
    }

    fn create_array_of(&self, element_type: &str, data: ArrayData) -> std::result::Result<NativeArray, DriverError> {
        Ok(NativeArray {
            element_type: element_type.to_string(),
            data,
        })
    }

    fn create_struct(
        &self,
        type_name: &str,
        _attributes: Vec<NativeValue>,
    ) -> std::result::Result<NativeStruct, DriverError> {
        Err(DriverError::new(format!(
            "Structured parameter {} cannot be bound without a registered composite type",
            type_name
        ))
        .with_state("0A000"))
    }
}

/// Native parameter values collected by index, ready to bind onto a query.
#[derive(Debug, Default)]
pub struct PgParameters {
    values: Vec<Option<NativeValue>>,
}

impl PreparedStatement for PgParameters {
    fn set(&mut self, index: usize, value: NativeValue) -> std::result::Result<(), DriverError> {
        if index == 0 {
            return Err(DriverError::new("Parameter indices start at 1").with_state("07009"));
        }
        if self.values.len() < index {
            self.values.resize(index, None);
        }
        self.values[index - 1] = Some(value);
        Ok(())
    }
}

impl PgParameters {
    /// Converts and collects `params` with the shared processor.
    pub fn bind(params: &[Parameter]) -> Result<Self> {
        let mut collected = Self::default();
        StatementProcessor::global().bind_all(&PgConnectionFactory, &mut collected, params)?;
        Ok(collected)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Binds every collected value onto `query` in index order.
    pub fn apply<'q>(self, mut query: PgQuery<'q>) -> Result<PgQuery<'q>> {
        for (i, value) in self.values.into_iter().enumerate() {
            let value = value.ok_or_else(|| Error::application(format!("Parameter {} was not bound.", i + 1)))?;
            query = bind_value(query, value)?;
        }
        Ok(query)
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: NativeValue) -> Result<PgQuery<'q>> {
    let query = match value {
        NativeValue::Null(ty) => bind_null(query, ty),
        NativeValue::SmallInt(i) => query.bind(i),
        NativeValue::Integer(i) => query.bind(i),
        NativeValue::BigInt(i) => query.bind(i),
        NativeValue::Float(f) => query.bind(f),
        NativeValue::Double(f) => query.bind(f),
        NativeValue::Decimal(d) => query.bind(d),
        NativeValue::Boolean(b) => query.bind(b),
        NativeValue::String(s) | NativeValue::NString(s) | NativeValue::Xml(s) => query.bind(s),
        NativeValue::Bytes(b) | NativeValue::RowId(b) => query.bind(b),
        NativeValue::BinaryStream(channel) => query.bind(
            channel
                .read_all()
                .map_err(|e| Error::io("Error while reading binary stream parameter.", e))?,
        ),
        NativeValue::CharacterStream(channel) => query.bind(
            channel
                .read_all()
                .map_err(|e| Error::io("Error while reading character stream parameter.", e))?,
        ),
        NativeValue::Clob(clob) => query.bind(clob.content().to_string()),
        NativeValue::Date(d) => query.bind(d),
        NativeValue::Time(t) => query.bind(t),
        NativeValue::TimeWithTimezone(t) => query.bind(PgTimeTz {
            time: t.time,
            offset: t.offset,
        }),
        NativeValue::Timestamp(ts) => query.bind(ts),
        NativeValue::TimestampWithTimezone(ts) => query.bind(ts),
        NativeValue::TimestampUtc(ts) => query.bind(ts),
        NativeValue::Array(array) => bind_array(query, array)?,
        NativeValue::Struct(s) => {
            return Err(Error::application(format!(
                "Structured parameter {} is not supported by the PostgreSQL adapter",
                s.type_name
            )))
        }
    };
    Ok(query)
}

/// Typed SQL null for `ty`.
///
/// Types without a chrono or scalar mapping (arrays, structs, CLOBs and untyped
/// nulls) are sent as text nulls; PostgreSQL only accepts those for
/// text-compatible targets, so cast the placeholder (`$1::int4[]`) for others.
fn bind_null(query: PgQuery<'_>, ty: NativeType) -> PgQuery<'_> {
    match ty {
        NativeType::SmallInt => query.bind(None::<i16>),
        NativeType::Integer => query.bind(None::<i32>),
        NativeType::BigInt => query.bind(None::<i64>),
        NativeType::Float | NativeType::Real => query.bind(None::<f32>),
        NativeType::Double => query.bind(None::<f64>),
        NativeType::Numeric | NativeType::Decimal => query.bind(None::<Decimal>),
        NativeType::Bit | NativeType::Boolean => query.bind(None::<bool>),
        NativeType::Binary | NativeType::VarBinary | NativeType::LongVarBinary | NativeType::RowId => {
            query.bind(None::<Vec<u8>>)
        }
        NativeType::Date => query.bind(None::<NaiveDate>),
        NativeType::Time => query.bind(None::<NaiveTime>),
        NativeType::TimeWithTimezone => query.bind(None::<PgTimeTz>),
        NativeType::Timestamp => query.bind(None::<NaiveDateTime>),
        NativeType::TimestampWithTimezone => query.bind(None::<DateTime<Utc>>),
        _ => query.bind(None::<String>),
    }
}

fn bind_array(query: PgQuery<'_>, array: NativeArray) -> Result<PgQuery<'_>> {
    let query = match array.data {
        ArrayData::SmallInt(v) => query.bind(v),
        ArrayData::Integer(v) => query.bind(v),
        ArrayData::BigInt(v) => query.bind(v),
        ArrayData::Double(v) => query.bind(v),
        ArrayData::Decimal(v) => query.bind(v),
        ArrayData::Text(v) => query.bind(v),
        ArrayData::Boolean(v) => query.bind(v),
        ArrayData::Binary(v) => query.bind(v),
        ArrayData::Date(v) => query.bind(v),
        ArrayData::Time(v) if v.iter().flatten().any(TimeValue::has_offset) => {
            // timetz[] has no chrono mapping; bind the ISO text form
            let text: Vec<Option<String>> = v
                .into_iter()
                .map(|t| {
                    t.map(|t| match t {
                        TimeValue::Naive(t) => t.to_string(),
                        TimeValue::Offset(t) => format!("{}{}", t.time, t.offset),
                    })
                })
                .collect();
            query.bind(text)
        }
        ArrayData::Time(v) => {
            let naive: Vec<Option<NaiveTime>> = v
                .into_iter()
                .map(|t| {
                    t.map(|t| match t {
                        TimeValue::Naive(t) => t,
                        TimeValue::Offset(t) => t.time,
                    })
                })
                .collect();
            query.bind(naive)
        }
        ArrayData::Timestamp(v) if array.element_type.ends_with("WITH TIMEZONE") => {
            let utc: Vec<Option<DateTime<Utc>>> = v
                .into_iter()
                .map(|t| {
                    t.map(|t| match t {
                        TimestampValue::Naive(n) => Utc.from_utc_datetime(&n),
                        TimestampValue::Offset(o) => o.with_timezone(&Utc),
                        TimestampValue::Utc(u) => u,
                    })
                })
                .collect();
            query.bind(utc)
        }
        ArrayData::Timestamp(v) => {
            let naive: Vec<Option<NaiveDateTime>> = v
                .into_iter()
                .map(|t| {
                    t.map(|t| match t {
                        TimestampValue::Naive(n) => n,
                        TimestampValue::Offset(o) => o.naive_utc(),
                        TimestampValue::Utc(u) => u.naive_utc(),
                    })
                })
                .collect();
            query.bind(naive)
        }
        ArrayData::Other(_) => {
            return Err(Error::application(format!(
                "Array of {} is not supported by the PostgreSQL adapter",
                array.element_type
            )))
        }
    };
    Ok(query)
}

/// SQL type of a PostgreSQL column type name.
pub fn sql_type_of(pg_type: &str) -> SqlType {
    match pg_type {
        "INT2" => SqlType::SmallInt,
        "INT4" => SqlType::Integer,
        "INT8" => SqlType::BigInt,
        "FLOAT4" => SqlType::Real,
        "FLOAT8" => SqlType::Double,
        "NUMERIC" => SqlType::Numeric,
        "BOOL" => SqlType::Boolean,
        "TEXT" => SqlType::Text,
        "VARCHAR" | "NAME" => SqlType::Varchar,
        "BPCHAR" => SqlType::Char,
        "BYTEA" => SqlType::VarBinary,
        "DATE" => SqlType::Date,
        "TIME" => SqlType::Time,
        "TIMETZ" => SqlType::TimeWithTimezone,
        "TIMESTAMP" => SqlType::Timestamp,
        "TIMESTAMPTZ" => SqlType::TimestampWithTimezone,
        other => SqlType::Custom(other.to_string()),
    }
}

fn row_columns(row: &PgRow) -> Vec<ColumnDefinition> {
    row.columns()
        .iter()
        .map(|column| ColumnDefinition::new(column.name(), sql_type_of(column.type_info().name()), true))
        .collect()
}

fn decode_cell(row: &PgRow, index: usize) -> std::result::Result<Option<Value>, sqlx::Error> {
    let type_name = row.columns()[index].type_info().name().to_string();
    let value = match type_name.as_str() {
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(IntoValue::into_value),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(IntoValue::into_value),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(IntoValue::into_value),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(IntoValue::into_value),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(IntoValue::into_value),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(index)?.map(IntoValue::into_value),
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(IntoValue::into_value),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(IntoValue::into_value),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.map(IntoValue::into_value),
        "TIME" => row.try_get::<Option<NaiveTime>, _>(index)?.map(IntoValue::into_value),
        "TIMESTAMP" => row.try_get::<Option<NaiveDateTime>, _>(index)?.map(IntoValue::into_value),
        "TIMESTAMPTZ" => row.try_get::<Option<DateTime<Utc>>, _>(index)?.map(IntoValue::into_value),
        _ => row.try_get_unchecked::<Option<String>, _>(index)?.map(IntoValue::into_value),
    };
    Ok(value)
}

fn decode_row(row: &PgRow) -> std::result::Result<Vec<Option<Value>>, sqlx::Error> {
    (0..row.columns().len()).map(|i| decode_cell(row, i)).collect()
}

/// Executes a procedure call and returns its result cursor.
///
/// Every statement result with at least one row becomes a result set; the
/// affected row counts of all statements are summed into the summary.
///
/// Parameters go over the extended protocol, which carries a single
/// statement, so a call yields at most one result set. `fetch_many` is
/// deprecated in later sqlx 0.7 releases but is the only executor path that
/// reports both rows and per-statement completion.
///
/// # Example
///
/// ```ignore
/// let mut call = call(&pool, "CALL list_people($1)", &[TypedValue::new("INTEGER", 10).into()], vec![]).await?;
/// while call.next_query_result()? {
///     for row in call.take_query_result().unwrap() {
///         println!("{:?}", row?);
///     }
/// }
/// ```
pub async fn call<'a, E>(
    executor: E,
    sql: &'a str,
    params: &[Parameter],
    shapes: Vec<Arc<RecordType>>,
) -> Result<ProcedureCallResult>
where
    E: Executor<'a, Database = Postgres> + 'a,
{
    #[cfg(feature = "log_sql")]
    debug!(sql, "executing procedure call");

    let query = PgParameters::bind(params)?.apply(sqlx::query(sql))?;
    let execution_error = |e: sqlx::Error| Error::database("Error while executing procedure call.", e.into());

    let mut results = Vec::new();
    let mut current: Option<BufferedResultSet> = None;
    let mut affected_row_count = 0;

    #[allow(deprecated)]
    let mut stream = query.fetch_many(executor);
    while let Some(item) = stream.try_next().await.map_err(execution_error)? {
        match item {
            Either::Left(done) => {
                affected_row_count += done.rows_affected();
                results.extend(current.take().filter(|rs| !rs.is_empty()));
            }
            Either::Right(row) => {
                let cells = decode_row(&row).map_err(execution_error)?;
                current
                    .get_or_insert_with(|| BufferedResultSet::new(row_columns(&row)))
                    .push_row(cells);
            }
        }
    }
    results.extend(current.take().filter(|rs| !rs.is_empty()));

    debug!(
        result_sets = results.len(),
        affected_row_count, "procedure call buffered"
    );
    let statement = BufferedCallableStatement::new(
        results,
        ExecutionSummary {
            affected_row_count,
            last_insert_id: None,
        },
    );
    Ok(ProcedureCallResult::new(Box::new(statement), shapes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    #[test]
    fn test_sql_type_of_pg_names() {
        assert_eq!(sql_type_of("INT4"), SqlType::Integer);
        assert_eq!(sql_type_of("BPCHAR"), SqlType::Char);
        assert_eq!(sql_type_of("TIMESTAMPTZ"), SqlType::TimestampWithTimezone);
        assert_eq!(sql_type_of("JSONB"), SqlType::Custom("JSONB".into()));
    }

    #[test]
    fn test_parameters_collect_in_index_order() {
        let params = PgParameters::bind(&[
            TypedValue::new("INTEGER", 1).into(),
            TypedValue::null("DATE").into(),
        ])
        .unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.values[0], Some(NativeValue::Integer(1)));
        assert_eq!(params.values[1], Some(NativeValue::Null(NativeType::Date)));
    }

    #[test]
    fn test_struct_parameters_are_rejected() {
        let err = PgConnectionFactory.create_struct("POINT", vec![]).unwrap_err();
        assert_eq!(err.sql_state.as_deref(), Some("0A000"));
    }

    #[test]
    fn test_apply_rejects_gaps() {
        let mut params = PgParameters::default();
        params.set(2, NativeValue::Boolean(true)).unwrap();
        let err = params.apply(sqlx::query("SELECT $1, $2")).err().expect("apply should fail");
        assert_eq!(err.to_string(), "Parameter 1 was not bound.");
    }
}
