// Errors
//
// Error types for parameter binding and result retrieval.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Validation failures and internal contract violations.
    Application,
    /// Failures surfaced by the underlying database driver.
    Database,
    /// Failures reading a streamed binary or character source.
    Io,
}

/// Failure reported by a database driver.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct DriverError {
    pub message: String,
    /// Five character SQLSTATE when the driver reports one
    pub sql_state: Option<String>,
    pub error_code: i32,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            error_code: 0,
        }
    }

    pub fn with_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => DriverError {
                message: db.message().to_string(),
                sql_state: db.code().map(|c| c.to_string()),
                error_code: 0,
            },
            _ => DriverError::new(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Raw value kind outside the accepted set of the target SQL type.
    #[error("Invalid parameter: {kind} value `{literal}` is passed as value for SQL type: {sql_type}")]
    InvalidParameter {
        kind: &'static str,
        literal: String,
        sql_type: String,
    },

    #[error("Only 1 or 0 can be passed for {sql_type} SQL Type, but found :{value}")]
    InvalidBitLiteral { sql_type: String, value: i64 },

    #[error("Unsupported SQL type: {0}")]
    UnsupportedType(String),

    #[error("{0}")]
    Application(String),

    #[error("{context} {source}")]
    Database {
        context: String,
        #[source]
        source: DriverError,
    },

    #[error("{context} {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Database { .. } => ErrorKind::Database,
            Error::Io { .. } => ErrorKind::Io,
            _ => ErrorKind::Application,
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Error::Application(message.into())
    }

    pub fn database(context: impl Into<String>, source: DriverError) -> Self {
        Error::Database {
            context: context.into(),
            source,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Prefixes application-level messages; driver and I/O errors keep their own context.
    pub(crate) fn with_context(self, context: &str) -> Self {
        match self {
            Error::Database { context: inner, source } => Error::Database {
                context: format!("{} {}", context, inner),
                source,
            },
            Error::Io { context: inner, source } => Error::Io {
                context: format!("{} {}", context, inner),
                source,
            },
            other => Error::Application(format!("{} {}", context, other)),
        }
    }
}
