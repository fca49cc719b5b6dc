//! Record derive macro implementation

mod attrs;

use std::collections::HashMap;

use crate::common::syn_types::{is_bool, option_inner};
use crate::sql_ident::parse_sql_ident_with_span;
use attrs::{FieldAttr, parse_container, parse_field};
use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Data, DeriveInput, Fields, Result};

const IDENTITY_COLUMN: &str = "id";

enum FieldPlan {
    Column {
        ident: syn::Ident,
        name: String,
        key: String,
        column: String,
        kind: Kind,
        bool_hint: bool,
    },
    Flatten {
        ident: syn::Ident,
        ty: syn::Type,
    },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Identity,
    Optional,
    Required,
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs (descriptors are cached per type)",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Record can only be derived for structs",
            ));
        }
    };

    let container = parse_container(&input.attrs)?;
    let mut plans = Vec::with_capacity(fields.len());
    let mut seen: HashMap<String, Span> = HashMap::new();

    for field in fields {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let attr: FieldAttr = parse_field(&field.attrs)?;
        if attr.skip {
            continue;
        }
        if attr.orm_flatten && !attr.serde_flatten {
            return Err(syn::Error::new_spanned(
                field,
                "#[orm(flatten)] requires #[serde(flatten)] so rows decode into the nested record",
            ));
        }
        if attr.serde_flatten {
            if attr.column.is_some() {
                return Err(syn::Error::new_spanned(
                    field,
                    "#[orm(column)] cannot be combined with flatten",
                ));
            }
            plans.push(FieldPlan::Flatten {
                ident,
                ty: field.ty.clone(),
            });
            continue;
        }

        let rust_name = ident.unraw().to_string();
        let key = match (&attr.rename, container.rename_all) {
            (Some(rename), _) => rename.clone(),
            (None, Some(rule)) => rule.apply(&rust_name),
            (None, None) => rust_name.clone(),
        };
        let column = match &attr.column {
            Some(lit) => parse_sql_ident_with_span(&lit.value(), lit.span(), "column")?,
            None => parse_sql_ident_with_span(&key, field.span(), "column").map_err(|mut e| {
                e.combine(syn::Error::new(
                    field.span(),
                    "set #[orm(column = \"...\")] to map this field explicitly",
                ));
                e
            })?,
        };

        // PostgreSQL folds unquoted identifiers, so `userId` and `userid` collide.
        if let Some(first) = seen.insert(column.to_ascii_lowercase(), field.span()) {
            let mut err = syn::Error::new(
                field.span(),
                format!("column '{column}' is mapped more than once"),
            );
            err.combine(syn::Error::new(first, "first mapped here"));
            return Err(err);
        }

        let kind = if column == IDENTITY_COLUMN {
            Kind::Identity
        } else if option_inner(&field.ty).is_some() {
            Kind::Optional
        } else {
            Kind::Required
        };

        plans.push(FieldPlan::Column {
            ident,
            name: rust_name,
            key,
            column,
            kind,
            bool_hint: is_bool(&field.ty),
        });
    }

    let record_name = name.to_string();
    let descriptor_pushes = plans.iter().map(descriptor_push);
    let binds = plans.iter().map(bind_field);
    let diffs = plans.iter().map(diff_field);
    let (identity_body, set_identity_body) = identity_bodies(&plans);

    Ok(quote! {
        impl ::pgmap::Record for #name {
            fn descriptor() -> &'static ::pgmap::RecordDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<::pgmap::RecordDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    let mut fields: ::std::vec::Vec<::pgmap::FieldDescriptor> = ::std::vec::Vec::new();
                    #(#descriptor_pushes)*
                    ::pgmap::RecordDescriptor::new(#record_name, fields)
                })
            }

            fn bind_fields(&self, out: &mut ::std::vec::Vec<::pgmap::FieldValue>) {
                #(#binds)*
            }

            fn diff_fields(&self, previous: &Self, out: &mut ::std::vec::Vec<bool>) {
                #(#diffs)*
            }

            fn identity(&self) -> ::core::option::Option<i64> {
                #identity_body
            }

            fn set_identity(&mut self, id: i64) -> ::pgmap::OrmResult<bool> {
                #set_identity_body
            }
        }
    })
}

fn descriptor_push(plan: &FieldPlan) -> TokenStream {
    match plan {
        FieldPlan::Column {
            name,
            key,
            column,
            kind,
            bool_hint,
            ..
        } => {
            let kind = match kind {
                Kind::Identity => quote!(::pgmap::FieldKind::Identity),
                Kind::Optional => quote!(::pgmap::FieldKind::Optional),
                Kind::Required => quote!(::pgmap::FieldKind::Required),
            };
            let hint = if *bool_hint {
                quote!(::pgmap::ValueHint::Bool)
            } else {
                quote!(::pgmap::ValueHint::Plain)
            };
            quote! {
                fields.push(::pgmap::FieldDescriptor::new(#name, #key, #column, #kind, #hint));
            }
        }
        FieldPlan::Flatten { ty, .. } => quote! {
            fields.extend(<#ty as ::pgmap::Record>::descriptor().fields().iter().cloned());
        },
    }
}

fn bind_field(plan: &FieldPlan) -> TokenStream {
    match plan {
        FieldPlan::Column { ident, kind, .. } => {
            let present = match kind {
                Kind::Identity => quote!(!::pgmap::Identity::is_unassigned(&self.#ident)),
                Kind::Optional => quote!(::core::option::Option::is_some(&self.#ident)),
                Kind::Required => quote!(true),
            };
            quote! {
                out.push(::pgmap::FieldValue::new(
                    ::core::clone::Clone::clone(&self.#ident),
                    #present,
                ));
            }
        }
        FieldPlan::Flatten { ident, .. } => quote! {
            ::pgmap::Record::bind_fields(&self.#ident, out);
        },
    }
}

fn diff_field(plan: &FieldPlan) -> TokenStream {
    match plan {
        FieldPlan::Column { ident, .. } => quote! {
            out.push(self.#ident != previous.#ident);
        },
        FieldPlan::Flatten { ident, .. } => quote! {
            ::pgmap::Record::diff_fields(&self.#ident, &previous.#ident, out);
        },
    }
}

/// Bodies of `identity` and `set_identity`: the record's own `id` field, else
/// the first flattened record that has one.
fn identity_bodies(plans: &[FieldPlan]) -> (TokenStream, TokenStream) {
    let own = plans.iter().find_map(|plan| match plan {
        FieldPlan::Column {
            ident,
            kind: Kind::Identity,
            ..
        } => Some(ident),
        _ => None,
    });

    if let Some(ident) = own {
        return (
            quote! {
                ::core::option::Option::Some(::pgmap::Identity::value(&self.#ident))
            },
            quote! {
                ::pgmap::Identity::assign(&mut self.#ident, id)?;
                ::core::result::Result::Ok(true)
            },
        );
    }

    let flattened: Vec<&syn::Ident> = plans
        .iter()
        .filter_map(|plan| match plan {
            FieldPlan::Flatten { ident, .. } => Some(ident),
            FieldPlan::Column { .. } => None,
        })
        .collect();

    (
        quote! {
            #(
                if let ::core::option::Option::Some(id) = ::pgmap::Record::identity(&self.#flattened) {
                    return ::core::option::Option::Some(id);
                }
            )*
            ::core::option::Option::None
        },
        quote! {
            #(
                if ::pgmap::Record::set_identity(&mut self.#flattened, id)? {
                    return ::core::result::Result::Ok(true);
                }
            )*
            let _ = id;
            ::core::result::Result::Ok(false)
        },
    )
}
