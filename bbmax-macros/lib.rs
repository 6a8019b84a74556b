//! Internal macros for bbmax

extern crate proc_macro;
extern crate proc_macro2;

use quote::quote;

/// Sum the heap usage of every field of a struct.
///
/// Implements [HeapSpace](../bbmax_common/memory/trait.HeapSpace.html) for
/// structs with named or unnamed fields. Each field must implement `HeapSpace`.
#[proc_macro_derive(HeapSpace)]
pub fn heap_space(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: syn::DeriveInput = syn::parse(input).unwrap();
    let type_name = ast.ident;
    let (impl_generics, type_generics, where_clause) = ast.generics.split_for_impl();
    let fields = match ast.data {
        syn::Data::Struct(data_struct) => data_struct.fields,
        syn::Data::Enum(_) | syn::Data::Union(_) => {
            panic!("HeapSpace can only be derived for structs")
        }
    };
    let summands = fields.iter().enumerate().map(|(position, field)| {
        match &field.ident {
            Some(name) => quote!(self.#name.heap_space()),
            None => {
                let index = syn::Index::from(position);
                quote!(self.#index.heap_space())
            }
        }
    });
    let implementation = quote!(
        impl #impl_generics
        HeapSpace for #type_name #type_generics #where_clause {
            fn heap_space(&self) -> usize {
                0 #(+ #summands)*
            }
        }
    );
    implementation.into()
}
