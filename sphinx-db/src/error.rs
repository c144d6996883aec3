//! # Error Module
//!
//! A single error type covers every failure the persistence layer can report.
//! The variants follow how a caller is expected to react: `Schema` is fatal at
//! start-up, `Validation` is the client's fault and never reaches the database,
//! `Query` and `Timeout` come from the driver, and `Consistency` marks a broken
//! data-integrity assumption.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Entity metadata is inconsistent (missing primary key, dangling foreign key, ...).
    #[error("schema violation: {0}")]
    Schema(String),

    /// Client input cannot be turned into an entity.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The driver rejected a statement. Carries the driver's message verbatim.
    #[error("query failed: {0}")]
    Query(String),

    /// A statement that must yield exactly one row yielded another count.
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("{table} with id {id} not found")]
    NotFound { table: &'static str, id: String },

    /// A raw cell or bound value could not be converted to the column's type.
    #[error("cannot convert column {column}: {message}")]
    Conversion { column: String, message: String },

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failures from sqlx (connect, pool exhaustion).
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl Error {
    pub(crate) fn conversion(column: impl Into<String>, message: impl ToString) -> Self {
        Error::Conversion { column: column.into(), message: message.to_string() }
    }

    /// Whether this error was caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
