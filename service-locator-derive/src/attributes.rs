use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{parenthesized, Attribute, Error, ExprPath, LitStr, Meta, Result, Token, Type};

#[derive(Default)]
pub struct ContractAttributes {
    pub name: Option<LitStr>,
    pub category: Option<LitStr>,
    pub depends_on: Vec<Type>,
}

impl ContractAttributes {
    pub fn parse_meta(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("name") {
            if self.name.is_some() {
                return Err(meta.error("Name is already defined!"));
            }

            self.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("category") {
            if self.category.is_some() {
                return Err(meta.error("Category is already defined!"));
            }

            self.category = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("depends_on") {
            let content;
            parenthesized!(content in meta.input);

            let types = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
            self.depends_on.extend(types);
        } else {
            return Err(meta.error("Unsupported contract attribute!"));
        }

        Ok(())
    }
}

impl TryFrom<&Attribute> for ContractAttributes {
    type Error = Error;

    fn try_from(value: &Attribute) -> Result<Self> {
        let mut result = Self::default();
        value.parse_nested_meta(|meta| result.parse_meta(meta))?;
        Ok(result)
    }
}

#[derive(Default)]
pub struct InjectAttributes {
    pub on_injected: Option<ExprPath>,
}

impl TryFrom<&Attribute> for InjectAttributes {
    type Error = Error;

    fn try_from(value: &Attribute) -> Result<Self> {
        let mut on_injected = None;

        // a bare #[inject] carries no arguments
        if let Meta::List(_) = value.meta {
            value.parse_nested_meta(|meta| {
                if meta.path.is_ident("on_injected") {
                    let expr: LitStr = meta.value()?.parse()?;
                    on_injected = Some(expr.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("Unsupported inject attribute!"))
                }
            })?;
        }

        Ok(Self { on_injected })
    }
}
