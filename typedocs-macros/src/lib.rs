//! Procedural macros for the typedocs project.
//!
//! - `#[derive(Record)]` implements `Record` and generates a `<Name>Field`
//!   namespace holding one typed `Field<Name, T>` key per serialized field.
//! - `#[derive(Projection)]` with `#[projection(of = Record)]` implements
//!   `Projection<Record>`, selecting exactly the struct's fields and checking
//!   at compile time that each one exists on the record with the same type
//!   and the same serialized name.
//!
//! Both derives read serde's `rename`, `rename_all` and `skip` attributes so
//! the generated names match what serde writes.

#[allow(unused_extern_crates)]
extern crate self as typedocs_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, Ident, LitStr, Token, Type,
    ext::IdentExt, spanned::Spanned,
};

/// Derives `Record` and typed field keys for a struct with named fields.
///
/// ```ignore
/// #[derive(Serialize, Deserialize, Record)]
/// pub struct User {
///     pub name: String,
///     #[serde(rename = "visitCount")]
///     pub visits: i64,
/// }
///
/// // Generates `UserField::Name: Field<User, String>` ("name") and
/// // `UserField::Visits: Field<User, i64>` ("visitCount").
/// ```
#[proc_macro_derive(Record, attributes(serde))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_record(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `Projection<Source>` for a narrowed view of a record.
///
/// ```ignore
/// #[derive(Deserialize, Projection)]
/// #[projection(of = User)]
/// pub struct UserName {
///     pub name: String,
/// }
/// ```
#[proc_macro_derive(Projection, attributes(projection, serde))]
pub fn derive_projection(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_projection(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}


/// A struct field as serde sees it.
struct SerializedField {
    ident: Ident,
    ty: Type,
    name: String,
}

#[derive(Default)]
struct SerdeAttrs {
    rename: Option<String>,
    rename_all: Option<String>,
    skip: bool,
    flatten: bool,
}

fn parse_serde_attrs(attrs: &[Attribute]) -> syn::Result<SerdeAttrs> {
    let mut parsed = SerdeAttrs::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                parsed.rename = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                parsed.rename_all = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("skip")
                || meta.path.is_ident("skip_serializing")
                || meta.path.is_ident("skip_deserializing")
            {
                parsed.skip = true;
            } else if meta.path.is_ident("flatten") {
                parsed.flatten = true;
            } else if meta.input.peek(Token![=]) {
                meta.value()?.parse::<syn::Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream2>()?;
            }

            Ok(())
        })?;
    }

    Ok(parsed)
}

/// Splits a snake_case identifier into its words.
fn words(name: &str) -> Vec<&str> {
    name.split('_').filter(|word| !word.is_empty()).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();

    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pascal_case(name: &str) -> String {
    words(name).into_iter().map(capitalize).collect()
}

fn apply_rename_rule(rule: &str, name: &str, span: proc_macro2::Span) -> syn::Result<String> {
    Ok(match rule {
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "PascalCase" => pascal_case(name),
        "camelCase" => {
            let pascal = pascal_case(name);
            let mut chars = pascal.chars();

            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        "snake_case" => name.to_string(),
        "SCREAMING_SNAKE_CASE" => name.to_uppercase(),
        "kebab-case" => name.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => name.to_uppercase().replace('_', "-"),
        other => return Err(syn::Error::new(span, format!("unknown rename_all rule `{other}`"))),
    })
}

fn serialized_fields(input: &DeriveInput, derive: &str) -> syn::Result<Vec<SerializedField>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.span(), format!("{derive} can only be derived for structs")));
    };
    let Fields::Named(named) = &data.fields else {
        return Err(syn::Error::new(input.span(), format!("{derive} requires named fields")));
    };

    let container = parse_serde_attrs(&input.attrs)?;
    let mut fields = Vec::new();

    for field in &named.named {
        let attrs = parse_serde_attrs(&field.attrs)?;

        if attrs.flatten {
            return Err(syn::Error::new(field.span(), format!("{derive} does not support flattened fields")));
        }
        if attrs.skip {
            continue;
        }

        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let rust_name = ident.unraw().to_string();

        let name = match (attrs.rename, &container.rename_all) {
            (Some(rename), _) => rename,
            (None, Some(rule)) => apply_rename_rule(rule, &rust_name, input.span())?,
            (None, None) => rust_name,
        };

        fields.push(SerializedField { ident, ty: field.ty.clone(), name });
    }

    Ok(fields)
}

fn expand_record(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(input.generics.span(), "Record cannot be derived for generic structs"));
    }

    let fields = serialized_fields(&input, "Record")?;
    let name = &input.ident;
    let vis = &input.vis;
    let field_keys = format_ident!("{}Field", name);

    let keys = fields
        .iter()
        .map(|field| format_ident!("{}", pascal_case(&field.ident.unraw().to_string()), span = field.ident.span()))
        .collect::<Vec<_>>();
    let types = fields
        .iter()
        .map(|field| &field.ty)
        .collect::<Vec<_>>();
    let names = fields
        .iter()
        .map(|field| field.name.as_str())
        .collect::<Vec<_>>();
    let keys_doc = format!("Typed keys for the serialized fields of [`{name}`].");

    Ok(quote! {
        #[doc = #keys_doc]
        #vis enum #field_keys {}

        #[allow(dead_code, non_upper_case_globals)]
        impl #field_keys {
            #(
                #[doc = #names]
                #vis const #keys: ::typedocs::record::Field<#name, #types> =
                    ::typedocs::record::Field::new(#names);
            )*
        }

        impl ::typedocs::record::Record for #name {
            const FIELD_NAMES: &'static [&'static str] = &[#( #names ),*];
        }
    })
}

fn parse_projection_source(input: &DeriveInput) -> syn::Result<Type> {
    let mut source = None;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("projection")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("of") {
                source = Some(meta.value()?.parse::<Type>()?);
                Ok(())
            } else {
                Err(meta.error("expected `of = RecordType`"))
            }
        })?;
    }

    source.ok_or_else(|| syn::Error::new(
        input.span(),
        "Projection requires `#[projection(of = RecordType)]`",
    ))
}

fn expand_projection(input: DeriveInput) -> syn::Result<TokenStream2> {
    let source = parse_projection_source(&input)?;
    let fields = serialized_fields(&input, "Projection")?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let names = fields
        .iter()
        .map(|field| field.name.as_str())
        .collect::<Vec<_>>();
    let checks = fields.iter().map(|field| {
        let ident = &field.ident;
        let ty = &field.ty;

        quote! { let _: &#ty = &source.#ident; }
    });
    let name_checks = fields.iter().map(|field| {
        let selected = field.name.as_str();
        let message = format!(
            "projection {name} selects `{selected}`, which is not a serialized field of {}",
            quote!(#source),
        );

        quote! {
            ::core::assert!(
                ::typedocs::record::has_field(<#source as ::typedocs::record::Record>::FIELD_NAMES, #selected),
                #message
            );
        }
    });

    Ok(quote! {
        impl #impl_generics ::typedocs::record::Projection<#source> for #name #ty_generics #where_clause {
            fn selected_fields() -> ::core::option::Option<&'static [&'static str]> {
                ::core::option::Option::Some(&[#( #names ),*])
            }
        }

        const _: () = {
            #[allow(dead_code, unused_variables)]
            fn assert_fields_exist_on_source(source: &#source) {
                #( #checks )*
            }

            #( #name_checks )*
        };
    })
}
