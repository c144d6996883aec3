//! Single-column comparisons rendered as parameterized WHERE fragments.

use std::{fmt, marker::PhantomData};

use crate::{
    entity::{Column, ColumnInfo, Entity},
    value::{ColumnValue, SqlType, SqlValue},
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Eq,
    Ne,
    Like,
}

impl Op {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Like => "LIKE",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `<column> <op> <value>` bound to entity `E`.
///
/// The value never appears in the SQL text; it is carried separately and bound
/// to the placeholder produced by [`Condition::render`].
pub struct Condition<E> {
    column: &'static ColumnInfo,
    op: Op,
    value: SqlValue,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Condition<E> {
    pub fn new<T: ColumnValue>(column: Column<E, T>, op: Op, value: T) -> Result<Self> {
        let info = column.info();
        if op == Op::Like && info.sql_type != SqlType::Text {
            return Err(Error::Validation(format!("LIKE is not supported on {} ({})", info.qualified_name(), info.sql_type.as_sql())));
        }
        let value = value.to_sql().map_err(|e| Error::Validation(format!("{}: {}", info.qualified_name(), e)))?;
        Ok(Self { column: info, op, value, _entity: PhantomData })
    }

    pub fn eq<T: ColumnValue>(column: Column<E, T>, value: T) -> Result<Self> {
        Self::new(column, Op::Eq, value)
    }

    pub fn column(&self) -> &'static ColumnInfo {
        self.column
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    /// Renders the fragment with placeholder `$n`.
    pub fn render(&self, n: usize) -> String {
        format!("{} {} ${}", self.column.name, self.op, n)
    }

    pub fn into_parts(self) -> (&'static ColumnInfo, Op, SqlValue) {
        (self.column, self.op, self.value)
    }
}

impl<E> fmt::Debug for Condition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} $n [{:?}]", self.column.qualified_name(), self.op, self.value)
    }
}
