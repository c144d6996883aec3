use syn::{GenericArgument, PathArguments, Type};

/// Returns `T` when `ty` is `wrapper<T>` (matched on the last path segment).
fn generic_of<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

/// `Option<T>` → `T`. Nullable columns and foreign keys are declared this way.
pub fn option_inner(ty: &Type) -> Option<&Type> {
    generic_of(ty, "Option")
}

/// `Option<Vec<T>>` → `T`, the shape required for `link_many` fields.
pub fn link_child(ty: &Type) -> Option<&Type> {
    option_inner(ty).and_then(|inner| generic_of(inner, "Vec"))
}
