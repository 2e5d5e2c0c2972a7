use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use proc_macro_crate::{FoundCrate, crate_name};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    if !input.generics.params.is_empty() {
        return syn::Error::new_spanned(
            input.ident,
            "FormModel derive currently supports only non-generic structs",
        )
        .to_compile_error()
        .into();
    }

    let model_ident = input.ident;
    let fields_struct_ident = format_ident!("{model_ident}Fields");

    let named_fields = match input.data {
        Data::Struct(data) => match data.fields {
            Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new(
                    Span::call_site(),
                    "FormModel derive requires a struct with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new(
                Span::call_site(),
                "FormModel derive is only supported on structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let dojoform = dojoform_path();
    let mut key_methods = Vec::new();
    let mut keys = Vec::new();
    let mut writes = Vec::new();
    let mut reads = Vec::new();

    for field in named_fields {
        let Some(field_ident) = field.ident else {
            continue;
        };
        let field_ty = field.ty;
        let field_name = field_ident.to_string();
        let key = quote!(#dojoform::form::FieldKey::new(#field_name));

        key_methods.push(quote! {
            pub const fn #field_ident(&self) -> #dojoform::form::FieldKey {
                #key
            }
        });
        writes.push(quote! {
            #dojoform::form::write_field(&mut values, #key, self.#field_ident);
        });
        reads.push(quote! {
            #field_ident: #dojoform::form::read_field::<#field_ty>(values, #key)?
        });
        keys.push(key);
    }

    quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #fields_struct_ident;

        impl #fields_struct_ident {
            #(#key_methods)*
        }

        impl #dojoform::form::FormModel for #model_ident {
            type Fields = #fields_struct_ident;

            fn fields() -> Self::Fields {
                #fields_struct_ident
            }

            fn field_keys() -> &'static [#dojoform::form::FieldKey] {
                const KEYS: &[#dojoform::form::FieldKey] = &[#(#keys),*];
                KEYS
            }

            fn into_values(self) -> #dojoform::form::FormValues {
                let mut values = #dojoform::form::FormValues::new();
                #(#writes)*
                values
            }

            fn from_values(
                values: &#dojoform::form::FormValues,
            ) -> #dojoform::form::FormResult<Self> {
                Ok(Self {
                    #(#reads),*
                })
            }
        }
    }
    .into()
}

fn dojoform_path() -> TokenStream2 {
    match crate_name("dojoform") {
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        // The crate aliases itself as `dojoform`, so its own tests and integration tests agree.
        Ok(FoundCrate::Itself) | Err(_) => quote!(::dojoform),
    }
}
