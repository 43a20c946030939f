use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Ident, Lit, Meta, NestedMeta};

/// Derives `StructuredType`: the record schema of the struct and the
/// conversion of an instance into a `StructuredRecord`.
///
/// # Example
///
/// ```ignore
/// #[derive(SqlStruct)]
/// #[sql_struct(type_name = "inventory_item")]
/// struct Item {
///     id: i32,
///     tags: Vec<Vec<u8>>,
///     note: Option<String>,
/// }
/// ```
#[proc_macro_derive(SqlStruct, attributes(sql_struct))]
pub fn sql_struct_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match Schema::new(&input) {
        Ok(schema) => schema.gen_impl().into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Field kind as seen from the Rust type
enum Kind {
    Int,
    Float,
    Decimal,
    Text,
    Boolean,
    Bytes,
    BinaryArray,
    Date,
    Time,
    Timestamp,
    Record(syn::Type),
}

struct SchemaField {
    ident: Ident,
    kind: Kind,
    nullable: bool,
}

struct Schema {
    name: Ident,
    type_name: String,
    fields: Vec<SchemaField>,
}

impl Schema {
    fn new(input: &DeriveInput) -> syn::Result<Self> {
        let type_name = parse_type_name(input)?.unwrap_or_else(|| input.ident.to_string());

        let fields = match &input.data {
            syn::Data::Struct(data) => match &data.fields {
                syn::Fields::Named(named) => &named.named,
                _ => {
                    return Err(syn::Error::new_spanned(
                        &input.ident,
                        "SqlStruct requires a struct with named fields",
                    ))
                }
            },
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "SqlStruct can only be derived for structs",
                ))
            }
        };

        let fields = fields
            .iter()
            .map(|field| {
                let ident = field.ident.clone().ok_or_else(|| {
                    syn::Error::new_spanned(field, "SqlStruct requires named fields")
                })?;
                let (inner, nullable) = match option_inner(&field.ty) {
                    Some(inner) => (inner, true),
                    None => (&field.ty, false),
                };
                Ok(SchemaField {
                    ident,
                    kind: field_kind(inner)?,
                    nullable,
                })
            })
            .collect::<syn::Result<Vec<_>>>()?;

        Ok(Schema {
            name: input.ident.clone(),
            type_name,
            fields,
        })
    }

    fn gen_impl(&self) -> TokenStream2 {
        let name = &self.name;
        let type_name = &self.type_name;
        let field_defs = self.fields.iter().map(gen_field_def);
        let field_values = self.fields.iter().map(gen_field_value);

        quote! {
            impl ::sqlx_marshal::StructuredType for #name {
                fn record_type() -> ::sqlx_marshal::RecordType {
                    ::sqlx_marshal::RecordType::new(#type_name, vec![#(#field_defs),*])
                }

                fn to_record(&self) -> ::sqlx_marshal::StructuredRecord {
                    let record_type = ::std::sync::Arc::new(
                        <Self as ::sqlx_marshal::StructuredType>::record_type()
                    );
                    let mut record = ::sqlx_marshal::StructuredRecord::new(record_type);
                    #(#field_values)*
                    record
                }
            }
        }
    }
}

/// Reads `#[sql_struct(type_name = "...")]`.
fn parse_type_name(input: &DeriveInput) -> syn::Result<Option<String>> {
    for attr in input.attrs.iter().filter(|a| a.path.is_ident("sql_struct")) {
        let list = match attr.parse_meta()? {
            Meta::List(list) => list,
            other => return Err(syn::Error::new_spanned(other, "expected #[sql_struct(type_name = \"...\")]")),
        };
        for nested in list.nested {
            match nested {
                NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("type_name") => match nv.lit {
                    Lit::Str(s) => return Ok(Some(s.value())),
                    other => return Err(syn::Error::new_spanned(other, "type_name must be a string literal")),
                },
                other => return Err(syn::Error::new_spanned(other, "unknown sql_struct attribute")),
            }
        }
    }
    Ok(None)
}

fn last_segment(ty: &syn::Type) -> Option<&syn::PathSegment> {
    match ty {
        syn::Type::Path(type_path) => type_path.path.segments.last(),
        _ => None,
    }
}

/// First generic argument of a single-parameter type such as `Option<T>`.
fn generic_arg(segment: &syn::PathSegment) -> Option<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
            syn::GenericArgument::Type(ty) => Some(ty),
            _ => None,
        }),
        _ => None,
    }
}

fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let segment = last_segment(ty)?;
    if segment.ident == "Option" {
        generic_arg(segment)
    } else {
        None
    }
}

fn is_u8_vec(ty: &syn::Type) -> bool {
    last_segment(ty)
        .filter(|s| s.ident == "Vec")
        .and_then(generic_arg)
        .and_then(last_segment)
        .map(|s| s.ident == "u8")
        .unwrap_or(false)
}

fn field_kind(ty: &syn::Type) -> syn::Result<Kind> {
    let segment = match last_segment(ty) {
        Some(segment) => segment,
        None => return Err(syn::Error::new_spanned(ty, "unsupported field type for SqlStruct")),
    };
    let kind = match segment.ident.to_string().as_str() {
        "i16" | "i32" | "i64" => Kind::Int,
        "f32" | "f64" => Kind::Float,
        "Decimal" => Kind::Decimal,
        "String" => Kind::Text,
        "bool" => Kind::Boolean,
        "NaiveDate" => Kind::Date,
        "NaiveTime" => Kind::Time,
        "NaiveDateTime" | "DateTime" => Kind::Timestamp,
        "Vec" if is_u8_vec(ty) => Kind::Bytes,
        "Vec" if generic_arg(segment).map(is_u8_vec).unwrap_or(false) => Kind::BinaryArray,
        "Vec" | "Option" | "HashMap" | "BTreeMap" | "Box" => {
            return Err(syn::Error::new_spanned(ty, "unsupported field type for SqlStruct"))
        }
        _ => Kind::Record(ty.clone()),
    };
    Ok(kind)
}

fn gen_kind(kind: &Kind) -> TokenStream2 {
    match kind {
        Kind::Int => quote!(::sqlx_marshal::FieldKind::Int),
        Kind::Float => quote!(::sqlx_marshal::FieldKind::Float),
        Kind::Decimal => quote!(::sqlx_marshal::FieldKind::Decimal),
        Kind::Text => quote!(::sqlx_marshal::FieldKind::Text),
        Kind::Boolean => quote!(::sqlx_marshal::FieldKind::Boolean),
        Kind::Bytes => quote!(::sqlx_marshal::FieldKind::Bytes),
        Kind::BinaryArray => quote!(::sqlx_marshal::FieldKind::BinaryArray),
        Kind::Date => quote!(::sqlx_marshal::FieldKind::Date),
        Kind::Time => quote!(::sqlx_marshal::FieldKind::Time),
        Kind::Timestamp => quote!(::sqlx_marshal::FieldKind::Timestamp),
        Kind::Record(ty) => quote! {
            ::sqlx_marshal::FieldKind::Record(::std::sync::Arc::new(
                <#ty as ::sqlx_marshal::StructuredType>::record_type()
            ))
        },
    }
}

fn gen_field_def(field: &SchemaField) -> TokenStream2 {
    let name = field.ident.to_string();
    let kind = gen_kind(&field.kind);
    if field.nullable {
        quote!(::sqlx_marshal::FieldDef::new(#name, #kind).nullable())
    } else {
        quote!(::sqlx_marshal::FieldDef::new(#name, #kind))
    }
}

/// Converts a `&T` expression into a `Value`.
fn gen_value(kind: &Kind, value_ref: TokenStream2) -> TokenStream2 {
    match kind {
        Kind::Record(ty) => quote! {
            ::sqlx_marshal::Value::Record(<#ty as ::sqlx_marshal::StructuredType>::to_record(#value_ref))
        },
        _ => quote! {
            ::sqlx_marshal::IntoValue::into_value(::std::clone::Clone::clone(#value_ref))
        },
    }
}

fn gen_field_value(field: &SchemaField) -> TokenStream2 {
    let ident = &field.ident;
    let name = ident.to_string();
    if field.nullable {
        let value = gen_value(&field.kind, quote!(v));
        quote! {
            record.set(#name, self.#ident.as_ref().map(|v| #value));
        }
    } else {
        let value = gen_value(&field.kind, quote!(&self.#ident));
        quote! {
            record.set(#name, ::std::option::Option::Some(#value));
        }
    }
}
