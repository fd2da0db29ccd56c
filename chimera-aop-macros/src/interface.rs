//! #[aop_interface] 宏实现

use crate::utils::{aop_module_ident, MethodInfo};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, ItemTrait, LitStr, Result, TraitItem};

pub fn impl_aop_interface(name: Option<LitStr>, input: &ItemTrait) -> Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[aop_interface] does not support generic traits",
        ));
    }

    let trait_ident = &input.ident;
    let vis = &input.vis;
    let interface_name = name
        .map(|n| n.value())
        .unwrap_or_else(|| trait_ident.to_string());

    let mut methods = Vec::new();
    for item in &input.items {
        match item {
            TraitItem::Fn(method) => {
                methods.push((MethodInfo::from_signature(&method.sig)?, &method.sig));
            }
            TraitItem::Const(_) | TraitItem::Type(_) => {
                return Err(Error::new_spanned(
                    item,
                    "#[aop_interface] traits may only declare methods",
                ));
            }
            _ => {}
        }
    }

    let module = aop_module_ident(trait_ident);
    let descriptors = methods.iter().map(|(m, _)| m.descriptor(&interface_name));
    let const_names: Vec<_> = methods.iter().map(|(m, _)| m.const_name()).collect();
    let arms = methods.iter().map(|(m, _)| m.dispatch_arm());
    let forwards = methods.iter().map(|(m, sig)| {
        let const_name = m.const_name();
        m.forwarding(quote!(#module::#const_name), sig)
    });

    Ok(quote! {
        #input

        /// 由 `#[aop_interface]` 生成的接口元数据
        #[doc(hidden)]
        #[allow(non_snake_case, dead_code, unused_imports, unused_variables)]
        #vis mod #module {
            use super::*;

            #(#descriptors)*

            pub static INTERFACE: ::chimera_aop::InterfaceDescriptor =
                ::chimera_aop::InterfaceDescriptor::new(#interface_name, &[#(&#const_names),*]);

            /// 把调用分派到实现了该接口的目标上，方法不属于该接口时返回 `None`
            pub fn dispatch<T: super::#trait_ident + ?Sized>(
                target: &T,
                method: &::chimera_aop::MethodDescriptor,
                args: &::chimera_aop::Arguments,
            ) -> Option<::chimera_aop::InvocationResult<::chimera_aop::ReturnValue>> {
                if !INTERFACE.declares(method) {
                    return None;
                }
                match method.name() {
                    #(#arms)*
                    _ => None,
                }
            }
        }

        impl #trait_ident for dyn ::chimera_aop::Invocable {
            #(#forwards)*
        }
    })
}
