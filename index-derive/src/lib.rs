extern crate proc_macro;

use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use proc_macro::TokenStream;

/// Derives `IndexBase` and the `From`/`Into` conversions for single-field newtype indices
#[proc_macro_derive(IndexBase)]
pub fn impl_index_base(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);

    let name = &ast.ident;

    if let syn::Data::Struct(data) = ast.data {
        if data.fields.len() != 1 {
            panic!("Expected exactly one struct field");
        }
        let head_field = data.fields.iter().next().unwrap();
        let field_type = &head_field.ty;

        let expanded = quote! {
            impl crate::strong::IndexBase for #name {
                type Type = #field_type;

                fn get(&self) -> #field_type {
                    self.0
                }
            }

            impl From<#field_type> for #name {
                fn from(value: #field_type) -> #name {
                    #name(value)
                }
            }

            impl From<#name> for #field_type {
                fn from(value: #name) -> #field_type {
                    value.0
                }
            }
        };

        TokenStream::from(expanded)
    } else {
        panic!("Expected a struct for IndexBase impl");
    }
}
