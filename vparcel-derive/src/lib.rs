//! # vparcel Derive Macros
//!
//! This crate provides the procedural macro for `vparcel`. It generates the
//! companion `<Type>Parcelizer` codec of a struct, plus the `VersionedParcelable`,
//! `ParcelField`, `NullableField` and `ListElement` implementations that let the
//! struct be nested in other versioned objects and collections.
//!
//! Compatible with `syn 2.0`.

use std::collections::BTreeMap;

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Expr, Fields, LitInt, LitStr, parse_macro_input};

/// Derives a companion codec for a struct with named fields.
///
/// # Attributes
///
/// * `#[parcel(id = N)]` on a field: its stable field id. Required unless skipped.
/// * `#[parcel(default = expr)]` on a field: value used when the field is absent
///   from the stream. Defaults to `Default::default()`.
/// * `#[parcel(skip)]` on a field: never written, always read as its default.
/// * `#[parcel(package = "com.example")]` on the struct: package part of the
///   companion identity. Defaults to the Rust module path.
#[proc_macro_derive(VersionedParcelable, attributes(parcel))]
pub fn derive_versioned_parcelable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

struct FieldSpec {
    ident: syn::Ident,
    id: Option<u32>,
    default: Option<Expr>,
}

fn expand(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let vis = &input.vis;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "VersionedParcelable does not support generic types",
        ));
    }

    let named = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new(
                    name.span(),
                    "VersionedParcelable only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new(
                name.span(),
                "VersionedParcelable only supports structs",
            ));
        }
    };

    let package = parse_package(&input.attrs)?;

    let mut fields = Vec::new();
    let mut seen: BTreeMap<u32, syn::Ident> = BTreeMap::new();
    for field in named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let (id, skip, default) = parse_field_attributes(&field.attrs)?;
        let id = match (id, skip) {
            (_, true) => None,
            (Some(id), false) => Some(id),
            (None, false) => {
                return Err(syn::Error::new(
                    ident.span(),
                    "missing #[parcel(id = N)] (or #[parcel(skip)])",
                ));
            }
        };
        if let Some(id) = id
            && let Some(previous) = seen.insert(id, ident.clone())
        {
            return Err(syn::Error::new(
                ident.span(),
                format!("field id {id} is already used by `{previous}`"),
            ));
        }
        fields.push(FieldSpec { ident, id, default });
    }

    let parcelizer = format_ident!("{}Parcelizer", name);
    let companion = parcelizer.to_string();
    let package = match package {
        Some(lit) => quote! { #lit },
        None => quote! { module_path!() },
    };

    let writes = fields.iter().filter_map(|f| {
        let ident = &f.ident;
        f.id.map(|id| quote! { parcel.write_value(&value.#ident, #id)?; })
    });
    let reads = fields.iter().map(|f| {
        let ident = &f.ident;
        let default = match &f.default {
            Some(expr) => quote! { #expr },
            None => quote! { ::core::default::Default::default() },
        };
        match f.id {
            Some(id) => quote! { #ident: parcel.read_value_or_else(#id, || #default)?, },
            None => quote! { #ident: #default, },
        }
    });

    let parcelizer_doc = format!("Companion codec of [`{name}`].");

    Ok(quote! {
        #[doc = #parcelizer_doc]
        #[derive(Debug, Clone, Copy, Default)]
        #vis struct #parcelizer;

        impl ::vparcel::Parcelizer<#name> for #parcelizer {
            const NAME: &'static str = ::core::concat!(#package, ".", #companion);

            #[allow(unused_variables)]
            fn write(value: &#name, parcel: &mut ::vparcel::ParcelWriter<'_>) -> ::vparcel::Result<()> {
                #(#writes)*
                ::core::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn read(parcel: &mut ::vparcel::ParcelReader<'_>) -> ::vparcel::Result<#name> {
                ::core::result::Result::Ok(#name {
                    #(#reads)*
                })
            }
        }

        impl ::vparcel::VersionedParcelable for #name {
            type Parcelizer = #parcelizer;
        }

        impl ::vparcel::ParcelField for #name {
            fn write_to(&self, parcel: &mut ::vparcel::ParcelWriter<'_>) -> ::vparcel::Result<()> {
                ::vparcel::rt::write_versioned(self, parcel)
            }

            fn read_from(parcel: &mut ::vparcel::ParcelReader<'_>) -> ::vparcel::Result<Self> {
                ::vparcel::rt::read_versioned(parcel)
            }
        }

        impl ::vparcel::NullableField for #name {
            fn write_nullable(
                value: ::core::option::Option<&Self>,
                parcel: &mut ::vparcel::ParcelWriter<'_>,
            ) -> ::vparcel::Result<()> {
                ::vparcel::rt::write_versioned_nullable(value, parcel)
            }

            fn read_nullable(
                parcel: &mut ::vparcel::ParcelReader<'_>,
            ) -> ::vparcel::Result<::core::option::Option<Self>> {
                ::vparcel::rt::read_versioned_nullable(parcel)
            }
        }

        impl ::vparcel::ListElement for #name {
            fn type_tag(&self) -> ::vparcel::TypeTag {
                ::vparcel::TypeTag::VersionedObject
            }

            fn write_element(&self, parcel: &mut ::vparcel::ParcelWriter<'_>) -> ::vparcel::Result<()> {
                ::vparcel::rt::write_versioned(self, parcel)
            }

            fn read_element(
                tag: ::vparcel::TypeTag,
                parcel: &mut ::vparcel::ParcelReader<'_>,
            ) -> ::vparcel::Result<Self> {
                ::vparcel::rt::read_versioned_element(tag, parcel)
            }
        }
    })
}

/// Parses the struct-level `#[parcel(package = "...")]`.
fn parse_package(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut package = None;
    for attr in attrs {
        if attr.path().is_ident("parcel") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("package") {
                    let lit: LitStr = meta.value()?.parse()?;
                    if lit.value().is_empty() {
                        return Err(meta.error("package must not be empty"));
                    }
                    package = Some(lit);
                    return Ok(());
                }
                Err(meta.error("Unknown parcel attribute key on a struct. Supported: package"))
            })?;
        }
    }
    Ok(package)
}

/// Parses field attributes. Returns (id, skip, default).
fn parse_field_attributes(attrs: &[Attribute]) -> syn::Result<(Option<u32>, bool, Option<Expr>)> {
    let mut id = None;
    let mut skip = false;
    let mut default = None;

    for attr in attrs {
        if attr.path().is_ident("parcel") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("id") {
                    let lit: LitInt = meta.value()?.parse()?;
                    let value: u32 = lit.base10_parse()?;
                    if value > i32::MAX as u32 {
                        return Err(meta.error("field id must fit in a non-negative i32"));
                    }
                    id = Some(value);
                    return Ok(());
                }

                if meta.path.is_ident("skip") {
                    skip = true;
                    return Ok(());
                }

                if meta.path.is_ident("default") {
                    default = Some(meta.value()?.parse::<Expr>()?);
                    return Ok(());
                }
                Err(meta.error("Unknown parcel attribute key. Supported: id, default, skip"))
            })?;
        }
    }
    Ok((id, skip, default))
}
