use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input, spanned::Spanned};

/// Implements `rustmemorm::ValueObject` for a type.
///
/// The snapshot used for dirty detection is the `Display` rendering of the
/// value unless `#[value_object(snapshot = "debug")]` is given.
///
/// ```ignore
/// #[derive(Debug, ValueObject)]
/// #[value_object(snapshot = "debug", type_name = "Money")]
/// struct Money { cents: AtomicI64 }
/// ```
#[proc_macro_derive(ValueObject, attributes(value_object))]
pub fn derive_value_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_value_object(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SnapshotSource {
    Display,
    Debug,
}

struct ValueObjectOptions {
    snapshot: SnapshotSource,
    type_name: Option<String>,
}

fn expand_value_object(input: DeriveInput) -> syn::Result<TokenStream2> {
    if let syn::Data::Union(_) = &input.data {
        return Err(syn::Error::new(
            input.span(),
            "#[derive(ValueObject)] is not supported for unions",
        ));
    }

    let options = parse_value_object_options(&input.attrs)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let snapshot_body = match options.snapshot {
        SnapshotSource::Display => quote!(::std::string::ToString::to_string(self)),
        SnapshotSource::Debug => quote!(::std::format!("{:?}", self)),
    };

    let type_name_fn = options.type_name.map(|name| {
        quote! {
            fn type_name(&self) -> &'static str {
                #name
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::rustmemorm::ValueObject for #ident #ty_generics #where_clause {
            fn snapshot(&self) -> ::std::string::String {
                #snapshot_body
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            #type_name_fn
        }
    })
}

fn parse_value_object_options(attrs: &[syn::Attribute]) -> syn::Result<ValueObjectOptions> {
    let mut options = ValueObjectOptions {
        snapshot: SnapshotSource::Display,
        type_name: None,
    };

    for attr in attrs {
        if !attr.path().is_ident("value_object") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("snapshot") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.snapshot = match lit.value().as_str() {
                    "display" => SnapshotSource::Display,
                    "debug" => SnapshotSource::Debug,
                    other => {
                        return Err(syn::Error::new(
                            lit.span(),
                            format!("Unsupported snapshot source `{other}`. Supported: \"display\", \"debug\""),
                        ));
                    }
                };
                return Ok(());
            }

            if meta.path.is_ident("type_name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                options.type_name = Some(lit.value());
                return Ok(());
            }

            Err(meta.error(
                "Unsupported value_object attribute. Supported: snapshot = \"display\"|\"debug\", type_name = \"...\"",
            ))
        })?;
    }

    Ok(options)
}
