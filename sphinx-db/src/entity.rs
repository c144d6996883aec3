use std::{fmt, marker::PhantomData};

use crate::{
    hydrate::{ColumnsId, RawRow},
    link::{ChildBatch, LinkManyInfo},
    value::{ColumnValue, SqlType, SqlValue},
    Result,
};

// ============================================================================
// Column Traits
// ============================================================================

/// A tag carried by a column. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trait {
    PrimaryKey,
    Optional,
    AutoIncrement,
    ForeignKey,
}

impl Trait {
    const fn bit(self) -> u8 {
        match self {
            Trait::PrimaryKey => 1,
            Trait::Optional => 1 << 1,
            Trait::AutoIncrement => 1 << 2,
            Trait::ForeignKey => 1 << 3,
        }
    }
}

/// Set of [`Trait`] tags on a column.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Traits(u8);

impl Traits {
    pub const NONE: Traits = Traits(0);

    pub const fn with(self, t: Trait) -> Self {
        Traits(self.0 | t.bit())
    }

    pub const fn contains(self, t: Trait) -> bool {
        self.0 & t.bit() != 0
    }
}

impl fmt::Debug for Traits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let all = [Trait::PrimaryKey, Trait::Optional, Trait::AutoIncrement, Trait::ForeignKey];
        f.debug_set().entries(all.iter().filter(|t| self.contains(**t))).finish()
    }
}

// ============================================================================
// Column Metadata
// ============================================================================

/// Target of a foreign key: the referenced table and its primary key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub table: &'static str,
    pub column: &'static str,
}

/// Metadata about a single column of an entity.
///
/// Generated as a `'static` slice by `#[derive(Entity)]`, in field declaration
/// order. `index` is the position of the column inside that slice.
#[derive(Debug, Clone, Copy)]
pub struct ColumnInfo {
    /// Table of the owning entity.
    pub table: &'static str,
    pub index: usize,
    pub name: &'static str,
    pub sql_type: SqlType,
    pub traits: Traits,
    /// Set for foreign keys only.
    pub references: Option<Reference>,
}

impl ColumnInfo {
    pub fn is_primary_key(&self) -> bool {
        self.traits.contains(Trait::PrimaryKey)
    }

    pub fn is_optional(&self) -> bool {
        self.traits.contains(Trait::Optional)
    }

    pub fn is_foreign_key(&self) -> bool {
        self.traits.contains(Trait::ForeignKey)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.traits.contains(Trait::AutoIncrement)
    }

    /// `table.column`, used in error messages.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }
}

/// A typed handle to one column of entity `E` holding values of type `T`.
///
/// Handles are generated as associated constants (`Course::TITLE`), so a
/// condition can only be built against the handle's own entity and with a
/// value of the column's type.
pub struct Column<E, T> {
    index: usize,
    name: &'static str,
    _marker: PhantomData<fn() -> (E, T)>,
}

impl<E, T> Clone for Column<E, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E, T> Copy for Column<E, T> {}

impl<E, T> fmt::Debug for Column<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column").field("index", &self.index).field("name", &self.name).finish()
    }
}

impl<E: Entity, T: ColumnValue> Column<E, T> {
    #[doc(hidden)]
    pub const fn new(index: usize, name: &'static str) -> Self {
        Self { index, name, _marker: PhantomData }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn info(&self) -> &'static ColumnInfo {
        &E::COLUMNS[self.index]
    }
}

// ============================================================================
// Entity Trait
// ============================================================================

/// A table-backed record.
///
/// Implemented by `#[derive(Entity)]`; hand-written impls are possible but are
/// checked by [`Registry::build`](crate::Registry) before first use.
///
/// # Example
///
/// ```rust,ignore
/// use sphinx_db::Entity;
///
/// #[derive(Entity)]
/// #[orm(table = "modules")]
/// struct Module {
///     #[orm(primary_key)]
///     id: u64,
///     #[orm(foreign_key = "Course::id")]
///     course_id: Option<u64>,
///     title: String,
///     description: Option<String>,
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// Rust type of the primary key. Foreign keys to this entity use the same type.
    type Id: ColumnValue + Default + PartialEq + fmt::Debug;

    const TABLE: &'static str;
    const COLUMNS: &'static [ColumnInfo];
    /// Index of the primary key inside `COLUMNS`.
    const PRIMARY_KEY: usize;
    /// One-to-many collections populated during create.
    const LINKS: &'static [LinkManyInfo] = &[];

    fn primary_key() -> &'static ColumnInfo {
        &Self::COLUMNS[Self::PRIMARY_KEY]
    }

    /// Columns written by INSERT: every column except the primary key.
    fn insert_columns() -> impl Iterator<Item = &'static ColumnInfo> {
        Self::COLUMNS.iter().filter(|c| !c.is_primary_key())
    }

    fn id(&self) -> &Self::Id;

    fn set_id(&mut self, id: Self::Id);

    /// Reads column `index` as a bindable value.
    ///
    /// Fails with `Error::Validation` for a non-optional foreign key that is
    /// still unset.
    fn value(&self, index: usize) -> Result<SqlValue>;

    fn set_value(&mut self, index: usize, value: SqlValue) -> Result<()>;

    fn hydrate(row: &RawRow<'_>, ids: &ColumnsId) -> Result<Self>;

    fn to_json(&self) -> serde_json::Value;

    /// Builds an entity from a JSON object. The primary key is never read and
    /// nested collections are left empty.
    fn from_json(value: &serde_json::Value) -> Result<Self>;

    /// Transient child collections, in the order of `LINKS`.
    fn links_mut(&mut self) -> Vec<&mut dyn ChildBatch> {
        Vec::new()
    }
}
