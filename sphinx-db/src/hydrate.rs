//! # Hydrate Module
//!
//! Turns raw result rows into typed entities. Result sets carry their fields
//! in whatever order the statement produced them, so every result set first
//! gets a [`ColumnsId`] that maps each column of the entity to the physical
//! field holding it. Cells arrive in PostgreSQL text format and are parsed by
//! the column type's [`ColumnValue::from_cell`].

use crate::{
    database::QueryResult,
    entity::{ColumnInfo, Entity},
    value::ColumnValue,
    Error, Result,
};

/// One row of a result set, as text cells. `None` is SQL NULL.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    cells: &'a [Option<String>],
}

impl<'a> RawRow<'a> {
    pub fn new(cells: &'a [Option<String>]) -> Self {
        Self { cells }
    }

    pub fn cell(&self, field: usize) -> Option<&'a str> {
        self.cells.get(field).and_then(|c| c.as_deref())
    }
}

/// Maps column ordinal to field index for one result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnsId(Vec<Option<usize>>);

impl ColumnsId {
    pub fn resolve<E: Entity>(fields: &[String]) -> Self {
        let ids = E::COLUMNS.iter().map(|c| fields.iter().position(|f| f == c.name)).collect();
        ColumnsId(ids)
    }

    pub fn field(&self, column: &ColumnInfo) -> Option<usize> {
        self.0.get(column.index).copied().flatten()
    }
}

fn locate(ids: &ColumnsId, column: &ColumnInfo) -> Result<usize> {
    ids.field(column).ok_or_else(|| Error::Schema(format!("column {} is missing from the result set", column.qualified_name())))
}

#[doc(hidden)]
pub fn required<T: ColumnValue>(row: &RawRow<'_>, ids: &ColumnsId, column: &ColumnInfo) -> Result<T> {
    let field = locate(ids, column)?;
    match row.cell(field) {
        Some(raw) => T::from_cell(raw).map_err(|e| Error::conversion(column.qualified_name(), e)),
        None => Err(Error::conversion(column.qualified_name(), "unexpected NULL")),
    }
}

#[doc(hidden)]
pub fn optional<T: ColumnValue>(row: &RawRow<'_>, ids: &ColumnsId, column: &ColumnInfo) -> Result<Option<T>> {
    let field = locate(ids, column)?;
    match row.cell(field) {
        Some(raw) => T::from_cell(raw).map(Some).map_err(|e| Error::conversion(column.qualified_name(), e)),
        None => Ok(None),
    }
}

/// Hydrates every row of `result`.
pub fn hydrate_all<E: Entity>(result: &QueryResult) -> Result<Vec<E>> {
    let ids = ColumnsId::resolve::<E>(result.fields());
    result.rows().iter().map(|cells| E::hydrate(&RawRow::new(cells), &ids)).collect()
}
