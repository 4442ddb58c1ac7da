use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields};

/// Derive macro for mappable struct shapes.
///
/// Generates an `automap::Shape` impl on the annotated struct:
///
/// - `descriptor()`: the struct's type descriptor.
/// - `fields()`: one accessor pair per named field, in declaration order.
///
/// The struct must implement `Default` (it is the zero value used when the
/// mapper allocates a destination), and every non-skipped field type must
/// implement `automap::Shape`.
///
/// # Example
///
/// ```ignore
/// #[derive(Shape, Default)]
/// pub struct UserRow {
///     pub id: i64,
///     pub name: String,
///     pub email: Option<String>,
///
///     #[shape(skip)]
///     pub cache: std::collections::HashMap<String, u32>,
/// }
/// ```
#[proc_macro_derive(Shape, attributes(shape))]
pub fn derive_shape(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match derive_impl(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn derive_impl(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            Fields::Unit => {
                return Ok(expand(input, Vec::new()));
            }
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Shape only supports structs with named fields",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(name, "Shape only supports structs")),
    };

    let mut field_tokens = Vec::new();
    for field in fields {
        if is_skipped(field)? {
            continue;
        }
        let field_name = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected named field"))?;
        let field_name_str = field_name.to_string();
        let field_ty = &field.ty;

        field_tokens.push(quote! {
            automap::FieldDef::new::<Self, #field_ty>(
                #field_name_str,
                |v| &v.#field_name,
                |v| &mut v.#field_name,
            )
        });
    }

    Ok(expand(input, field_tokens))
}

fn expand(input: &DeriveInput, field_tokens: Vec<TokenStream2>) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    quote! {
        impl #impl_generics automap::Shape for #name #ty_generics #where_clause {
            fn descriptor() -> automap::TypeDescriptor {
                automap::TypeDescriptor::structure::<Self>()
            }

            fn fields() -> Vec<automap::FieldDef> {
                vec![
                    #(#field_tokens),*
                ]
            }
        }
    }
}

/// Parse `#[shape(skip)]`.
fn is_skipped(field: &Field) -> Result<bool, syn::Error> {
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("shape") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("unknown shape attribute (expected `skip`)"))
            }
        })?;
    }
    Ok(skip)
}
