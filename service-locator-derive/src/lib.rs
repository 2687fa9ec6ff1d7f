mod attributes;
mod contract;
mod inject;

use crate::attributes::ContractAttributes;
use crate::contract::{expand_contract, generate_provides, register_service_contract};
use crate::inject::expand_inject;
use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, Error, Item};

#[proc_macro_derive(Contract, attributes(contract))]
pub fn generate_contract(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_contract(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

#[proc_macro_attribute]
pub fn service_contract(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut attributes = ContractAttributes::default();
    let parser = syn::meta::parser(|meta| attributes.parse_meta(meta));
    parse_macro_input!(args with parser);

    let item = parse_macro_input!(input as Item);
    register_service_contract(&item, &attributes)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

#[proc_macro_attribute]
pub fn provides(_args: TokenStream, input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as Item);
    generate_provides(&item)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

#[proc_macro_derive(Inject, attributes(inject))]
pub fn generate_inject(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_inject(&input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}
