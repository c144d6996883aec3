use heck::{ToShoutySnakeCase, ToSnakeCase};
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, LitStr, Path, Type};

use crate::types::{link_child, option_inner};

/// Options parsed from `#[orm(...)]` on a field.
#[derive(Default)]
struct FieldAttrs {
    primary_key: bool,
    auto_increment: bool,
    optional: bool,
    foreign_key: Option<(Path, String)>,
    link_many: Option<LitStr>,
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();
    for attr in &field.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                attrs.primary_key = true;
            } else if meta.path.is_ident("auto_increment") {
                attrs.auto_increment = true;
            } else if meta.path.is_ident("optional") {
                attrs.optional = true;
            } else if meta.path.is_ident("foreign_key") {
                let value: LitStr = meta.value()?.parse()?;
                let fk_string = value.value();
                let Some((entity, column)) = fk_string.split_once("::") else {
                    return Err(meta.error("invalid format for foreign_key, use \"Entity::column\""));
                };
                let entity: Path = syn::parse_str(entity).map_err(|e| syn::Error::new(value.span(), e))?;
                attrs.foreign_key = Some((entity, column.to_string()));
            } else if meta.path.is_ident("link_many") {
                attrs.link_many = Some(meta.value()?.parse()?);
            } else {
                return Err(meta.error("unknown orm attribute"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

fn parse_table_name(ast: &DeriveInput) -> syn::Result<String> {
    let mut table = ast.ident.to_string().to_snake_case();
    for attr in &ast.attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = value.value();
                Ok(())
            } else {
                Err(meta.error("unknown orm attribute"))
            }
        })?;
    }
    Ok(table)
}

/// How a column is read, written and mapped.
enum Kind {
    /// `T`, NOT NULL.
    Required,
    /// `Option<T>`, nullable.
    Nullable,
    /// `Option<T>` in memory, NOT NULL in the table.
    RequiredForeignKey,
}

struct ColumnField<'a> {
    ident: &'a Ident,
    name: String,
    kind: Kind,
    value_ty: &'a Type,
    attrs: FieldAttrs,
}

struct LinkField<'a> {
    ident: &'a Ident,
    child: &'a Type,
    remote_key: LitStr,
}

/// Expands the `#[derive(Entity)]` macro.
///
/// Generates the column metadata, the `impl Entity` block (value access,
/// hydration and JSON mapping), typed column handles and a compile-time check
/// that every foreign key has the type of the primary key it references.
pub fn expand(ast: DeriveInput) -> syn::Result<TokenStream> {
    let struct_name = &ast.ident;
    let vis = &ast.vis;

    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&ast.generics, "Entity cannot be derived for generic structs"));
    }

    let fields = match &ast.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields,
            _ => return Err(syn::Error::new_spanned(struct_name, "Entity must have named fields")),
        },
        _ => return Err(syn::Error::new_spanned(struct_name, "Entity must be a struct")),
    };

    let table = parse_table_name(&ast)?;

    let mut columns = Vec::new();
    let mut links = Vec::new();
    for field in &fields.named {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let mut attrs = parse_field_attrs(field)?;

        if let Some(remote_key) = attrs.link_many.take() {
            let child = link_child(&field.ty)
                .ok_or_else(|| syn::Error::new_spanned(&field.ty, "link_many fields must be Option<Vec<Child>>"))?;
            links.push(LinkField { ident, child, remote_key });
            continue;
        }

        let inner = option_inner(&field.ty);
        if attrs.optional && inner.is_none() {
            return Err(syn::Error::new_spanned(&field.ty, "optional requires Option<T>"));
        }
        let (kind, value_ty) = match (inner, attrs.primary_key, attrs.foreign_key.is_some()) {
            (Some(_), true, _) => {
                return Err(syn::Error::new_spanned(&field.ty, "a primary key cannot be an Option"));
            }
            (None, _, true) => {
                return Err(syn::Error::new_spanned(&field.ty, "a foreign key must be declared as Option<T>"));
            }
            (None, _, false) => (Kind::Required, &field.ty),
            (Some(inner), _, true) if !attrs.optional => (Kind::RequiredForeignKey, inner),
            (Some(inner), _, _) => (Kind::Nullable, inner),
        };

        let name = ident.to_string().trim_start_matches("r#").to_string();
        columns.push(ColumnField { ident, name, kind, value_ty, attrs });
    }

    let primary_keys: Vec<usize> = columns.iter().enumerate().filter(|(_, c)| c.attrs.primary_key).map(|(i, _)| i).collect();
    let pk_index = match primary_keys.as_slice() {
        [index] => *index,
        [] => return Err(syn::Error::new_spanned(struct_name, "Entity requires exactly one #[orm(primary_key)] field, found none")),
        [_, second, ..] => {
            return Err(syn::Error::new_spanned(columns[*second].ident, "Entity requires exactly one #[orm(primary_key)] field"));
        }
    };
    let pk = &columns[pk_index];
    let pk_ident = pk.ident;
    let pk_ty = pk.value_ty;
    let pk_name = &pk.name;

    // Column metadata
    let column_infos = columns.iter().enumerate().map(|(index, c)| {
        let name = &c.name;
        let value_ty = c.value_ty;
        let mut traits = quote! { ::sphinx_db::Traits::NONE };
        if c.attrs.primary_key {
            traits = quote! { #traits.with(::sphinx_db::Trait::PrimaryKey) };
        }
        if c.attrs.auto_increment {
            traits = quote! { #traits.with(::sphinx_db::Trait::AutoIncrement) };
        }
        if matches!(c.kind, Kind::Nullable) {
            traits = quote! { #traits.with(::sphinx_db::Trait::Optional) };
        }
        let references = match &c.attrs.foreign_key {
            Some((target, column)) => {
                traits = quote! { #traits.with(::sphinx_db::Trait::ForeignKey) };
                quote! {
                    Some(::sphinx_db::Reference {
                        table: <#target as ::sphinx_db::Entity>::TABLE,
                        column: #column,
                    })
                }
            }
            None => quote! { None },
        };
        quote! {
            ::sphinx_db::ColumnInfo {
                table: #table,
                index: #index,
                name: #name,
                sql_type: <#value_ty as ::sphinx_db::ColumnValue>::SQL_TYPE,
                traits: #traits,
                references: #references,
            }
        }
    });

    let link_infos = links.iter().map(|l| {
        let field = l.ident.to_string();
        let child = l.child;
        let remote_key = &l.remote_key;
        quote! {
            ::sphinx_db::LinkManyInfo {
                field: #field,
                child_table: <#child as ::sphinx_db::Entity>::TABLE,
                remote_key: #remote_key,
                local_key: #pk_name,
            }
        }
    });

    // Value access
    let value_arms = columns.iter().enumerate().map(|(index, c)| {
        let ident = c.ident;
        let accessor = match c.kind {
            Kind::Required => quote! { required_to_sql },
            Kind::Nullable => quote! { optional_to_sql },
            Kind::RequiredForeignKey => quote! { unset_to_sql },
        };
        quote! { #index => ::sphinx_db::value::#accessor(&self.#ident, &columns[#index]), }
    });

    let set_value_arms = columns.iter().enumerate().map(|(index, c)| {
        let ident = c.ident;
        let accessor = match c.kind {
            Kind::Required => quote! { required_from_sql },
            Kind::Nullable | Kind::RequiredForeignKey => quote! { optional_from_sql },
        };
        quote! { #index => self.#ident = ::sphinx_db::value::#accessor(value, &columns[#index])?, }
    });

    // Hydration
    let link_idents: Vec<&Ident> = links.iter().map(|l| l.ident).collect();
    let hydrate_fields = columns.iter().enumerate().map(|(index, c)| {
        let ident = c.ident;
        match c.kind {
            Kind::Required => quote! { #ident: ::sphinx_db::hydrate::required(row, ids, &columns[#index])? },
            Kind::Nullable => quote! { #ident: ::sphinx_db::hydrate::optional(row, ids, &columns[#index])? },
            Kind::RequiredForeignKey => quote! { #ident: Some(::sphinx_db::hydrate::required(row, ids, &columns[#index])?) },
        }
    });

    // JSON
    let json_puts = columns.iter().enumerate().map(|(index, c)| {
        let ident = c.ident;
        match c.kind {
            Kind::Required => quote! { ::sphinx_db::json::put(&mut map, &columns[#index], &self.#ident); },
            _ => quote! { ::sphinx_db::json::put_optional(&mut map, &columns[#index], &self.#ident); },
        }
    });

    let json_takes = columns.iter().enumerate().map(|(index, c)| {
        let ident = c.ident;
        if c.attrs.primary_key {
            return quote! { #ident: ::core::default::Default::default() };
        }
        match c.kind {
            Kind::Required => quote! { #ident: ::sphinx_db::json::take_required(obj, &columns[#index])? },
            _ => quote! { #ident: ::sphinx_db::json::take_optional(obj, &columns[#index])? },
        }
    });

    // Typed column handles and foreign key type checks
    let handles = columns.iter().enumerate().map(|(index, c)| {
        let const_name = Ident::new(&c.name.to_shouty_snake_case(), Span::call_site());
        let name = &c.name;
        let value_ty = c.value_ty;
        quote! {
            #vis const #const_name: ::sphinx_db::Column<#struct_name, #value_ty> = ::sphinx_db::Column::new(#index, #name);
        }
    });

    let fk_checks = columns.iter().filter_map(|c| {
        let (target, _) = c.attrs.foreign_key.as_ref()?;
        let value_ty = c.value_ty;
        Some(quote! {
            const _: fn(<#target as ::sphinx_db::Entity>::Id) -> #value_ty = |id| id;
        })
    });

    Ok(quote! {
        impl ::sphinx_db::Entity for #struct_name {
            type Id = #pk_ty;

            const TABLE: &'static str = #table;
            const COLUMNS: &'static [::sphinx_db::ColumnInfo] = &[#(#column_infos),*];
            const PRIMARY_KEY: usize = #pk_index;
            const LINKS: &'static [::sphinx_db::LinkManyInfo] = &[#(#link_infos),*];

            fn id(&self) -> &Self::Id {
                &self.#pk_ident
            }

            fn set_id(&mut self, id: Self::Id) {
                self.#pk_ident = id;
            }

            fn value(&self, index: usize) -> ::sphinx_db::Result<::sphinx_db::SqlValue> {
                let columns = <Self as ::sphinx_db::Entity>::COLUMNS;
                match index {
                    #(#value_arms)*
                    _ => Err(::sphinx_db::Error::Schema(format!("{} has no column {}", #table, index))),
                }
            }

            fn set_value(&mut self, index: usize, value: ::sphinx_db::SqlValue) -> ::sphinx_db::Result<()> {
                let columns = <Self as ::sphinx_db::Entity>::COLUMNS;
                match index {
                    #(#set_value_arms)*
                    _ => return Err(::sphinx_db::Error::Schema(format!("{} has no column {}", #table, index))),
                }
                Ok(())
            }

            fn hydrate(row: &::sphinx_db::RawRow<'_>, ids: &::sphinx_db::ColumnsId) -> ::sphinx_db::Result<Self> {
                let columns = <Self as ::sphinx_db::Entity>::COLUMNS;
                Ok(Self {
                    #(#hydrate_fields,)*
                    #(#link_idents: None,)*
                })
            }

            fn to_json(&self) -> ::sphinx_db::serde_json::Value {
                let columns = <Self as ::sphinx_db::Entity>::COLUMNS;
                let mut map = ::sphinx_db::serde_json::Map::new();
                #(#json_puts)*
                ::sphinx_db::serde_json::Value::Object(map)
            }

            fn from_json(value: &::sphinx_db::serde_json::Value) -> ::sphinx_db::Result<Self> {
                let columns = <Self as ::sphinx_db::Entity>::COLUMNS;
                let obj = ::sphinx_db::json::expect_object::<Self>(value)?;
                ::sphinx_db::json::ignore_primary_key(obj, &columns[#pk_index]);
                Ok(Self {
                    #(#json_takes,)*
                    #(#link_idents: None,)*
                })
            }

            fn links_mut(&mut self) -> Vec<&mut dyn ::sphinx_db::ChildBatch> {
                vec![#(&mut self.#link_idents as &mut dyn ::sphinx_db::ChildBatch),*]
            }
        }

        impl #struct_name {
            #(#handles)*
        }

        #(#fk_checks)*
    })
}
