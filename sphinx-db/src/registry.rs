use std::collections::{HashMap, HashSet};

use crate::{
    entity::{ColumnInfo, Entity},
    link::LinkManyInfo,
    Error, Result,
};

/// Static metadata of one registered entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityMeta {
    pub table: &'static str,
    pub columns: &'static [ColumnInfo],
    pub primary_key: usize,
    pub links: &'static [LinkManyInfo],
}

impl EntityMeta {
    fn of<E: Entity>() -> Self {
        Self { table: E::TABLE, columns: E::COLUMNS, primary_key: E::PRIMARY_KEY, links: E::LINKS }
    }

    pub fn primary_key(&self) -> Option<&'static ColumnInfo> {
        self.columns.get(self.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&'static ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Every entity the application persists, checked once at start-up, plus the
/// table of one-to-many relations between them. Nested creates follow that
/// table to find each child's remote key.
#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<&'static str, EntityMeta>,
    relations: HashMap<(&'static str, &'static str), LinkManyInfo>,
}

impl Registry {
    /// Starts a registration chain.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let registry = Registry::builder()
    ///     .register::<User>()
    ///     .register::<Course>()
    ///     .register::<Module>()
    ///     .build()?;
    /// ```
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { entities: Vec::new() }
    }

    pub fn entity(&self, table: &str) -> Option<&EntityMeta> {
        self.entities.get(table)
    }

    pub fn relation(&self, parent: &str, field: &str) -> Option<&LinkManyInfo> {
        self.relations.iter().find(|((p, f), _)| *p == parent && *f == field).map(|(_, info)| info)
    }

    pub fn relations_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a LinkManyInfo> + 'a {
        self.relations.iter().filter(move |((p, _), _)| *p == parent).map(|(_, info)| info)
    }

    pub fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.keys().copied()
    }
}

pub struct RegistryBuilder {
    entities: Vec<EntityMeta>,
}

impl RegistryBuilder {
    pub fn register<E: Entity>(mut self) -> Self {
        self.entities.push(EntityMeta::of::<E>());
        self
    }

    /// Validates all registered metadata. Any inconsistency is an
    /// `Error::Schema` and should stop the application.
    pub fn build(self) -> Result<Registry> {
        let mut entities = HashMap::with_capacity(self.entities.len());
        for meta in self.entities {
            check_columns(&meta)?;
            if entities.insert(meta.table, meta).is_some() {
                return Err(Error::Schema(format!("entity {} is registered twice", meta.table)));
            }
        }

        for meta in entities.values() {
            check_foreign_keys(meta, &entities)?;
        }

        let mut relations = HashMap::new();
        for meta in entities.values() {
            for link in meta.links {
                check_link(meta, link, &entities)?;
                if relations.insert((meta.table, link.field), *link).is_some() {
                    return Err(Error::Schema(format!("{} declares the relation {} twice", meta.table, link.field)));
                }
            }
        }

        log::debug!("registry built: {} entities, {} relations", entities.len(), relations.len());
        Ok(Registry { entities, relations })
    }
}

fn check_columns(meta: &EntityMeta) -> Result<()> {
    let primary_keys: Vec<_> = meta.columns.iter().filter(|c| c.is_primary_key()).collect();
    let pk = match primary_keys.as_slice() {
        [pk] => *pk,
        [] => return Err(Error::Schema(format!("{} has no primary key", meta.table))),
        many => return Err(Error::Schema(format!("{} has {} primary keys", meta.table, many.len()))),
    };
    if pk.index != meta.primary_key {
        return Err(Error::Schema(format!("{}: PRIMARY_KEY is {} but {} is at {}", meta.table, meta.primary_key, pk.name, pk.index)));
    }
    if pk.is_optional() {
        return Err(Error::Schema(format!("{}: primary key {} cannot be optional", meta.table, pk.name)));
    }

    let mut names = HashSet::new();
    for (position, column) in meta.columns.iter().enumerate() {
        if column.index != position {
            return Err(Error::Schema(format!("{}: column {} has index {}, expected {}", meta.table, column.name, column.index, position)));
        }
        if column.table != meta.table {
            return Err(Error::Schema(format!("{}: column {} belongs to {}", meta.table, column.name, column.table)));
        }
        if !names.insert(column.name) {
            return Err(Error::Schema(format!("{}: duplicate column {}", meta.table, column.name)));
        }
        if column.is_foreign_key() != column.references.is_some() {
            return Err(Error::Schema(format!("{}: foreign key tag and reference disagree", column.qualified_name())));
        }
    }
    Ok(())
}

fn check_foreign_keys(meta: &EntityMeta, entities: &HashMap<&'static str, EntityMeta>) -> Result<()> {
    for column in meta.columns {
        let Some(target) = column.references else {
            continue;
        };
        let referenced = entities.get(target.table).ok_or_else(|| {
            Error::Schema(format!("{} references unregistered entity {}", column.qualified_name(), target.table))
        })?;
        let pk = referenced
            .primary_key()
            .filter(|pk| pk.name == target.column)
            .ok_or_else(|| Error::Schema(format!("{} must reference the primary key of {}", column.qualified_name(), target.table)))?;
        if pk.sql_type != column.sql_type {
            return Err(Error::Schema(format!(
                "{} is {} but {} is {}",
                column.qualified_name(),
                column.sql_type.as_sql(),
                pk.qualified_name(),
                pk.sql_type.as_sql()
            )));
        }
    }
    Ok(())
}

fn check_link(parent: &EntityMeta, link: &LinkManyInfo, entities: &HashMap<&'static str, EntityMeta>) -> Result<()> {
    let child = entities
        .get(link.child_table)
        .ok_or_else(|| Error::Schema(format!("{}.{} links to unregistered entity {}", parent.table, link.field, link.child_table)))?;
    let remote = child
        .column(link.remote_key)
        .ok_or_else(|| Error::Schema(format!("{} has no column {}", child.table, link.remote_key)))?;
    let points_back = remote.references.is_some_and(|r| r.table == parent.table);
    let local_is_pk = parent.primary_key().is_some_and(|pk| pk.name == link.local_key);
    if !points_back || !local_is_pk {
        return Err(Error::Schema(format!(
            "{}.{}: {} must be a foreign key to {}.{}",
            parent.table,
            link.field,
            remote.qualified_name(),
            parent.table,
            link.local_key
        )));
    }
    Ok(())
}
