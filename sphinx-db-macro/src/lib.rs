//! Procedural macros for `sphinx-db`.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod derive_entity;
mod types;

/// Derives `sphinx_db::Entity` for a struct with named fields.
///
/// Struct attribute:
/// - `#[orm(table = "courses")]`: table name (defaults to the snake_case struct name).
///
/// Field attributes:
/// - `primary_key`: exactly one field; assigned by the database.
/// - `auto_increment`: tag only.
/// - `foreign_key = "Entity::column"`: field must be `Option<T>` with `T` equal to
///   the referenced entity's id type.
/// - `optional`: the foreign key may be NULL in the table.
/// - `link_many = "remote_key"`: an `Option<Vec<Child>>` collection created together
///   with the parent; not a column.
///
/// Every other `Option<T>` field is a nullable column.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn entity_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    derive_entity::expand(ast).unwrap_or_else(syn::Error::into_compile_error).into()
}
