//! # Value Module
//!
//! This module defines the typed values that travel between entities and the
//! database driver, and the `ColumnValue` trait that every column type must
//! implement. A type without a `ColumnValue` impl cannot be used as a column:
//! the derive macro calls into these conversions, so a missing converter is a
//! compile error rather than a silent pass-through.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{entity::ColumnInfo, Error};

// ============================================================================
// SQL Types and Values
// ============================================================================

/// SQL type of a column, as declared to PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Integer,
    BigInt,
    Boolean,
    Double,
    Text,
    Timestamp,
    Uuid,
}

impl SqlType {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMPTZ",
            SqlType::Uuid => "UUID",
        }
    }
}

/// A value bound to a statement placeholder.
///
/// `Null` keeps the SQL type of the column so the driver can bind a typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(SqlType),
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlType::Boolean,
            SqlValue::Int(_) => SqlType::Integer,
            SqlValue::BigInt(_) => SqlType::BigInt,
            SqlValue::Double(_) => SqlType::Double,
            SqlValue::Text(_) => SqlType::Text,
            SqlValue::Timestamp(_) => SqlType::Timestamp,
            SqlValue::Uuid(_) => SqlType::Uuid,
        }
    }

    /// Renders the value the way PostgreSQL's text result format does.
    pub fn to_cell(&self) -> Option<String> {
        match self {
            SqlValue::Null(_) => None,
            SqlValue::Bool(v) => Some(if *v { "t" } else { "f" }.to_string()),
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::BigInt(v) => Some(v.to_string()),
            SqlValue::Double(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v.clone()),
            SqlValue::Timestamp(v) => Some(v.to_rfc3339()),
            SqlValue::Uuid(v) => Some(v.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SqlValue::Null(_) => Value::Null,
            SqlValue::Bool(v) => Value::Bool(*v),
            SqlValue::Int(v) => Value::from(*v),
            SqlValue::BigInt(v) => Value::from(*v),
            SqlValue::Double(v) => serde_json::Number::from_f64(*v).map(Value::Number).unwrap_or(Value::Null),
            SqlValue::Text(v) => Value::String(v.clone()),
            SqlValue::Timestamp(v) => Value::String(v.to_rfc3339()),
            SqlValue::Uuid(v) => Value::String(v.to_string()),
        }
    }
}

// ============================================================================
// ColumnValue Trait
// ============================================================================

/// Conversion rules for a Rust type stored in a column.
pub trait ColumnValue: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const SQL_TYPE: SqlType;

    /// Parses a non-null cell from a result set in text format.
    fn from_cell(raw: &str) -> Result<Self, String>;

    fn to_sql(&self) -> Result<SqlValue, String>;

    fn from_sql(value: SqlValue) -> Result<Self, String>;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn mismatch(value: &SqlValue, expected: SqlType) -> String {
    format!("expected {}, got {}", expected.as_sql(), value.sql_type().as_sql())
}

macro_rules! impl_column_value {
    ($($t:ty => $sql_type:ident, $variant:ident);* $(;)?) => {
        $(
            impl ColumnValue for $t {
                const SQL_TYPE: SqlType = SqlType::$sql_type;

                fn from_cell(raw: &str) -> Result<Self, String> {
                    raw.trim()
                        .parse::<$t>()
                        .map_err(|e| format!("'{}' is not a valid {}: {}", raw, stringify!($t), e))
                }

                fn to_sql(&self) -> Result<SqlValue, String> {
                    Ok(SqlValue::$variant(self.clone()))
                }

                fn from_sql(value: SqlValue) -> Result<Self, String> {
                    match value {
                        SqlValue::$variant(v) => Ok(v),
                        other => Err(mismatch(&other, SqlType::$sql_type)),
                    }
                }
            }
        )*
    };
}

impl_column_value!(
    i32 => Integer, Int;
    i64 => BigInt, BigInt;
    f64 => Double, Double;
);

/// Stored as BIGINT; values above `i64::MAX` are rejected instead of wrapping.
impl ColumnValue for u64 {
    const SQL_TYPE: SqlType = SqlType::BigInt;

    fn from_cell(raw: &str) -> Result<Self, String> {
        raw.trim().parse::<u64>().map_err(|e| format!("'{}' is not a valid u64: {}", raw, e))
    }

    fn to_sql(&self) -> Result<SqlValue, String> {
        i64::try_from(*self).map(SqlValue::BigInt).map_err(|_| format!("{} does not fit in BIGINT", self))
    }

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::BigInt(v) => u64::try_from(v).map_err(|_| format!("{} is negative", v)),
            SqlValue::Int(v) => u64::try_from(v).map_err(|_| format!("{} is negative", v)),
            other => Err(mismatch(&other, SqlType::BigInt)),
        }
    }
}

impl ColumnValue for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;

    fn from_cell(raw: &str) -> Result<Self, String> {
        match raw.trim() {
            "t" | "true" | "1" => Ok(true),
            "f" | "false" | "0" => Ok(false),
            other => Err(format!("'{}' is not a valid bool", other)),
        }
    }

    fn to_sql(&self) -> Result<SqlValue, String> {
        Ok(SqlValue::Bool(*self))
    }

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            other => Err(mismatch(&other, SqlType::Boolean)),
        }
    }
}

impl ColumnValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn from_cell(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }

    fn to_sql(&self) -> Result<SqlValue, String> {
        Ok(SqlValue::Text(self.clone()))
    }

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Text(v) => Ok(v),
            other => Err(mismatch(&other, SqlType::Text)),
        }
    }
}

impl ColumnValue for DateTime<Utc> {
    const SQL_TYPE: SqlType = SqlType::Timestamp;

    fn from_cell(raw: &str) -> Result<Self, String> {
        raw.trim().parse::<DateTime<Utc>>().map_err(|e| format!("'{}' is not a valid timestamp: {}", raw, e))
    }

    fn to_sql(&self) -> Result<SqlValue, String> {
        Ok(SqlValue::Timestamp(*self))
    }

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Timestamp(v) => Ok(v),
            other => Err(mismatch(&other, SqlType::Timestamp)),
        }
    }
}

impl ColumnValue for Uuid {
    const SQL_TYPE: SqlType = SqlType::Uuid;

    fn from_cell(raw: &str) -> Result<Self, String> {
        Uuid::parse_str(raw.trim()).map_err(|e| format!("'{}' is not a valid uuid: {}", raw, e))
    }

    fn to_sql(&self) -> Result<SqlValue, String> {
        Ok(SqlValue::Uuid(*self))
    }

    fn from_sql(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Uuid(v) => Ok(v),
            other => Err(mismatch(&other, SqlType::Uuid)),
        }
    }
}

// ============================================================================
// Field Accessors (used by the derive macro)
// ============================================================================

#[doc(hidden)]
pub fn required_to_sql<T: ColumnValue>(value: &T, column: &ColumnInfo) -> Result<SqlValue, Error> {
    value.to_sql().map_err(|e| Error::conversion(column.qualified_name(), e))
}

#[doc(hidden)]
pub fn optional_to_sql<T: ColumnValue>(value: &Option<T>, column: &ColumnInfo) -> Result<SqlValue, Error> {
    match value {
        Some(v) => required_to_sql(v, column),
        None => Ok(SqlValue::Null(T::SQL_TYPE)),
    }
}

/// A foreign key that is held as `Option` in memory but is NOT NULL in the table.
#[doc(hidden)]
pub fn unset_to_sql<T: ColumnValue>(value: &Option<T>, column: &ColumnInfo) -> Result<SqlValue, Error> {
    match value {
        Some(v) => required_to_sql(v, column),
        None => Err(Error::Validation(format!("{} is required but was not set", column.qualified_name()))),
    }
}

#[doc(hidden)]
pub fn required_from_sql<T: ColumnValue>(value: SqlValue, column: &ColumnInfo) -> Result<T, Error> {
    T::from_sql(value).map_err(|e| Error::conversion(column.qualified_name(), e))
}

#[doc(hidden)]
pub fn optional_from_sql<T: ColumnValue>(value: SqlValue, column: &ColumnInfo) -> Result<Option<T>, Error> {
    if value.is_null() {
        return Ok(None);
    }
    required_from_sql(value, column).map(Some)
}
