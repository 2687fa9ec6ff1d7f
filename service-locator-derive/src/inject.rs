use crate::attributes::InjectAttributes;
use itertools::Itertools;
use proc_macro2::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Data, DataStruct, DeriveInput, Error, Field, Index, Member, Result};

const INJECT: &str = "inject";

struct InjectedField<'a> {
    member: Member,
    name: String,
    field: &'a Field,
}

fn is_injected(field: &Field) -> bool {
    field
        .attrs
        .iter()
        .any(|attribute| attribute.path().is_ident(INJECT))
}

fn injected_fields(data: &DataStruct) -> Vec<InjectedField> {
    data.fields
        .iter()
        .enumerate()
        .filter(|(_, field)| is_injected(field))
        .map(|(index, field)| {
            let member = field
                .ident
                .clone()
                .map(Member::Named)
                .unwrap_or_else(|| Member::Unnamed(Index::from(index)));
            let name = field
                .ident
                .as_ref()
                .map(|ident| ident.to_string())
                .unwrap_or_else(|| index.to_string());

            InjectedField {
                member,
                name,
                field,
            }
        })
        .collect()
}

fn extract_inject_attributes(input: &DeriveInput) -> Result<InjectAttributes> {
    let attributes: Vec<_> = input
        .attrs
        .iter()
        .filter(|attribute| attribute.path().is_ident(INJECT))
        .map(InjectAttributes::try_from)
        .try_collect()?;

    Ok(attributes
        .into_iter()
        .find(|attributes| attributes.on_injected.is_some())
        .unwrap_or_default())
}

pub fn expand_inject(input: &DeriveInput) -> Result<TokenStream> {
    if let Data::Struct(data) = &input.data {
        let ident = &input.ident;
        let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
        let fields = injected_fields(data);

        let members = fields.iter().map(|field| {
            let name = &field.name;
            let ty = &field.field.ty;
            quote! {
                service_locator::dependency::DependencyMember {
                    name: #name,
                    contract: service_locator::contract::ContractId::of::<
                        <#ty as service_locator::dependency::DependencySlot>::Contract
                    >(),
                }
            }
        });

        let assignments = fields.iter().enumerate().map(|(index, field)| {
            let member = &field.member;
            quote! {
                #index => service_locator::dependency::DependencySlot::assign(&self.#member, instance)
            }
        });

        let on_injected = extract_inject_attributes(input)?.on_injected.map(|path| {
            quote! {
                fn on_injected(&self) {
                    #path(self)
                }
            }
        });

        Ok(quote! {
            #[automatically_derived]
            impl #impl_generics service_locator::dependency::Consumer for #ident #ty_generics #where_clause {
                fn declare_dependencies() -> Vec<service_locator::dependency::DependencyMember> {
                    vec![#(#members),*]
                }

                #[allow(unused_variables)]
                fn assign_dependency(
                    &self,
                    member: usize,
                    instance: &service_locator::service::ServiceInstance,
                ) -> bool {
                    match member {
                        #(#assignments,)*
                        _ => false,
                    }
                }

                #on_injected
            }
        })
    } else {
        Err(Error::new(
            input.span(),
            "Can only derive Inject on structs!",
        ))
    }
}
