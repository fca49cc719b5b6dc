//! Attribute parsing for the Record derive macro.
//!
//! Reads `#[orm(...)]` and the subset of `#[serde(...)]` that decides the
//! serialized key of a field (`rename`, `rename_all`, `skip`, `flatten`).
//! Other serde keys are skipped, since serde validates them itself.

use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Error, LitStr, Result};

/// Container-level serde settings.
#[derive(Debug, Default)]
pub(super) struct ContainerAttr {
    pub rename_all: Option<RenameRule>,
}

/// Field-level settings merged from `orm` and `serde`.
#[derive(Debug, Default)]
pub(super) struct FieldAttr {
    pub column: Option<LitStr>,
    pub rename: Option<String>,
    pub orm_flatten: bool,
    pub serde_flatten: bool,
    pub skip: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn parse(lit: &LitStr) -> Result<Self> {
        Ok(match lit.value().as_str() {
            "lowercase" => Self::Lower,
            "UPPERCASE" => Self::Upper,
            "PascalCase" => Self::Pascal,
            "camelCase" => Self::Camel,
            "snake_case" => Self::Snake,
            "SCREAMING_SNAKE_CASE" => Self::ScreamingSnake,
            "kebab-case" => Self::Kebab,
            "SCREAMING-KEBAB-CASE" => Self::ScreamingKebab,
            other => {
                return Err(Error::new(
                    lit.span(),
                    format!("unknown rename_all rule '{other}'"),
                ));
            }
        })
    }

    pub fn apply(self, field: &str) -> String {
        match self {
            Self::Lower => field.to_ascii_lowercase(),
            Self::Upper => field.to_ascii_uppercase(),
            Self::Pascal => field.to_upper_camel_case(),
            Self::Camel => field.to_lower_camel_case(),
            Self::Snake => field.to_snake_case(),
            Self::ScreamingSnake => field.to_shouty_snake_case(),
            Self::Kebab => field.to_kebab_case(),
            Self::ScreamingKebab => field.to_shouty_kebab_case(),
        }
    }
}

pub(super) fn parse_container(attrs: &[Attribute]) -> Result<ContainerAttr> {
    let mut out = ContainerAttr::default();
    for attr in attrs {
        if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    if let Some(lit) = renamed_value(&meta)? {
                        out.rename_all = Some(RenameRule::parse(&lit)?);
                    }
                    return Ok(());
                }
                skip_value(&meta)
            })?;
        } else if attr.path().is_ident("orm") {
            return Err(Error::new_spanned(
                attr,
                "Record takes no struct-level #[orm(...)] attributes",
            ));
        }
    }
    Ok(out)
}

pub(super) fn parse_field(attrs: &[Attribute]) -> Result<FieldAttr> {
    let mut out = FieldAttr::default();
    for attr in attrs {
        if attr.path().is_ident("orm") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("column") {
                    out.column = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("flatten") {
                    out.orm_flatten = true;
                } else if meta.path.is_ident("skip") {
                    out.skip = true;
                } else {
                    return Err(meta.error("unknown orm attribute (expected column, flatten or skip)"));
                }
                Ok(())
            })?;
        } else if attr.path().is_ident("serde") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if let Some(lit) = renamed_value(&meta)? {
                        out.rename = Some(lit.value());
                    }
                } else if meta.path.is_ident("flatten") {
                    out.serde_flatten = true;
                } else if meta.path.is_ident("skip") {
                    out.skip = true;
                } else {
                    skip_value(&meta)?;
                }
                Ok(())
            })?;
        }
    }
    Ok(out)
}

/// `key = "x"` or `key(serialize = "x", deserialize = "y")`; rows are
/// deserialized, so the `deserialize` name wins.
fn renamed_value(meta: &ParseNestedMeta) -> Result<Option<LitStr>> {
    if meta.input.peek(syn::Token![=]) {
        return Ok(Some(meta.value()?.parse()?));
    }
    let mut found = None;
    meta.parse_nested_meta(|inner| {
        let lit: LitStr = inner.value()?.parse()?;
        if inner.path.is_ident("deserialize") || found.is_none() {
            found = Some(lit);
        }
        Ok(())
    })?;
    Ok(found)
}

fn skip_value(meta: &ParseNestedMeta) -> Result<()> {
    if meta.input.peek(syn::Token![=]) {
        let _: syn::Expr = meta.value()?.parse()?;
    } else if meta.input.peek(syn::token::Paren) {
        let content;
        syn::parenthesized!(content in meta.input);
        let _: proc_macro2::TokenStream = content.parse()?;
    }
    Ok(())
}
