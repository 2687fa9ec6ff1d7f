use crate::attributes::ContractAttributes;
use convert_case::{Case, Casing};
use proc_macro2::{Ident, TokenStream};
use quote::quote;
use std::ops::Deref;
use syn::spanned::Spanned;
use syn::{Attribute, DeriveInput, Error, Generics, Item, Result, Type};

const CONTRACT: &str = "contract";

fn extract_contract_attributes(attributes: &[Attribute]) -> Result<ContractAttributes> {
    attributes
        .iter()
        .find(|attribute| attribute.path().is_ident(CONTRACT))
        .map(ContractAttributes::try_from)
        .transpose()
        .map(Option::unwrap_or_default)
}

fn ensure_not_generic(generics: &Generics) -> Result<()> {
    if generics.params.is_empty() {
        Ok(())
    } else {
        Err(Error::new(
            generics.span(),
            "Generic types cannot be registered as contracts!",
        ))
    }
}

fn generate_registration(
    contract: TokenStream,
    ident: &Ident,
    attributes: &ContractAttributes,
) -> TokenStream {
    let name = attributes
        .name
        .as_ref()
        .map(|name| name.value())
        .unwrap_or_else(|| ident.to_string().to_case(Case::Title));
    let category = attributes
        .category
        .as_ref()
        .map(|category| quote!(Some(#category.to_string())))
        .unwrap_or_else(|| quote!(None));
    let depends_on = &attributes.depends_on;

    quote! {
        const _: () = {
            fn register() -> service_locator::contract::ContractDescriptor {
                use service_locator::contract::{ContractDescriptor, ContractId};
                ContractDescriptor {
                    id: ContractId::of::<#contract>(),
                    name: #name.to_string(),
                    category: #category,
                    prerequisites: vec![#(ContractId::of::<#depends_on>()),*],
                }
            }

            service_locator::contract::internal::submit! {
                service_locator::contract::internal::ContractRegisterer {
                    register
                }
            };
        };
    }
}

pub fn expand_contract(input: &DeriveInput) -> Result<TokenStream> {
    ensure_not_generic(&input.generics)?;

    let ident = &input.ident;
    let attributes = extract_contract_attributes(&input.attrs)?;

    Ok(generate_registration(quote!(#ident), ident, &attributes))
}

pub fn register_service_contract(item: &Item, attributes: &ContractAttributes) -> Result<TokenStream> {
    if let Item::Trait(item_trait) = item {
        ensure_not_generic(&item_trait.generics)?;

        let ident = &item_trait.ident;
        let registration = generate_registration(quote!(dyn #ident), ident, attributes);

        Ok(quote! {
            #item_trait

            #registration
        })
    } else {
        Err(Error::new(
            item.span(),
            "Service contracts can only be declared on traits!",
        ))
    }
}

pub fn generate_provides(item: &Item) -> Result<TokenStream> {
    if let Item::Impl(item_impl) = item {
        let trait_type = item_impl
            .trait_
            .as_ref()
            .map(|(_, path, ..)| path)
            .ok_or_else(|| Error::new(item.span(), "Missing trait identifier!"))?;

        let target_type = if let Type::Path(path) = item_impl.self_ty.deref() {
            path
        } else {
            return Err(Error::new(
                item_impl.self_ty.span(),
                "Only named types can provide service contracts!",
            ));
        };

        let (impl_generics, _, where_clause) = item_impl.generics.split_for_impl();

        Ok(quote! {
            #item_impl

            #[automatically_derived]
            impl #impl_generics service_locator::service::Provides<dyn #trait_type> for #target_type #where_clause {
                fn provide(
                    self: service_locator::service::ServicePtr<Self>,
                ) -> service_locator::service::ServicePtr<dyn #trait_type> {
                    self
                }
            }
        })
    } else {
        Err(Error::new(
            item.span(),
            "Providing service contracts is possible only on trait implementations!",
        ))
    }
}
