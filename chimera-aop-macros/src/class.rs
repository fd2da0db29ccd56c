//! #[aop_class] 宏实现

use crate::utils::{aop_module_ident, interface_module_path, relative_to_child, result_ok_type, MethodInfo};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{Attribute, Error, ImplItem, ImplItemFn, ItemImpl, LitStr, Path, Result, Type, Visibility};

/// `#[aop_class(...)]` 的参数
#[derive(Default)]
pub struct ClassArgs {
    pub name: Option<String>,
    pub superclass: Option<String>,
    pub interfaces: Vec<Path>,
    pub sealed: bool,
}

impl ClassArgs {
    pub fn parse(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("superclass") {
            self.superclass = Some(meta.value()?.parse::<LitStr>()?.value());
            Ok(())
        } else if meta.path.is_ident("interfaces") {
            meta.parse_nested_meta(|nested| {
                self.interfaces.push(nested.path);
                Ok(())
            })
        } else if meta.path.is_ident("sealed") {
            self.sealed = true;
            Ok(())
        } else {
            Err(meta.error("unsupported aop_class argument, expected `name`, `superclass`, `interfaces` or `sealed`"))
        }
    }
}

/// 移除方法上的 `#[aop(final)]` 标记，返回是否存在
fn take_final_marker(attrs: &mut Vec<Attribute>) -> Result<bool> {
    let mut is_final = false;
    let mut error = None;
    attrs.retain(|attr| {
        if !attr.path().is_ident("aop") {
            return true;
        }
        match attr.meta.require_list() {
            Ok(list) if list.tokens.to_string().trim() == "final" => is_final = true,
            _ => {
                error.get_or_insert_with(|| Error::new_spanned(attr, "expected `#[aop(final)]`"));
            }
        }
        false
    });
    match error {
        Some(e) => Err(e),
        None => Ok(is_final),
    }
}

/// 公开的 `&self` 方法且返回 `Result` 时属于类的对象契约
fn is_exposed(method: &ImplItemFn) -> bool {
    matches!(method.vis, Visibility::Public(_))
        && method.sig.receiver().is_some()
        && result_ok_type(&method.sig.output).is_some()
}

pub fn impl_aop_class(args: ClassArgs, mut input: ItemImpl) -> Result<TokenStream> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(Error::new_spanned(
            path,
            "#[aop_class] must be placed on an inherent impl block",
        ));
    }
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "#[aop_class] does not support generic types",
        ));
    }

    let self_path = match &*input.self_ty {
        Type::Path(type_path) if type_path.qself.is_none() => type_path.path.clone(),
        other => {
            return Err(Error::new_spanned(
                other,
                "#[aop_class] expects a named struct type",
            ))
        }
    };
    let self_ident = match self_path.segments.last() {
        Some(segment) => segment.ident.clone(),
        None => return Err(Error::new_spanned(&self_path, "expected a type name")),
    };
    let class_name = args.name.clone().unwrap_or_else(|| self_ident.to_string());

    let mut methods = Vec::new();
    for item in input.items.iter_mut() {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        let is_final = take_final_marker(&mut method.attrs)?;
        if !is_exposed(method) {
            if is_final {
                return Err(Error::new_spanned(
                    &method.sig,
                    "#[aop(final)] only applies to public `&self` methods returning Result",
                ));
            }
            continue;
        }
        let mut info = MethodInfo::from_signature(&method.sig)?;
        info.is_final = is_final;
        methods.push((info, method.sig.clone()));
    }

    let self_ty = &input.self_ty;
    let module = aop_module_ident(&self_ident);
    let contract = format_ident!("{}Contract", self_ident);
    let child_self_path = relative_to_child(&self_path);

    let interface_modules = args
        .interfaces
        .iter()
        .map(interface_module_path)
        .collect::<Result<Vec<_>>>()?;
    let child_interface_modules: Vec<_> = interface_modules.iter().map(relative_to_child).collect();

    let descriptors = methods.iter().map(|(m, _)| m.descriptor(&class_name));
    let const_names: Vec<_> = methods.iter().map(|(m, _)| m.const_name()).collect();
    let arms = methods.iter().map(|(m, _)| m.dispatch_arm());
    let contract_sigs = methods.iter().map(|(m, sig)| {
        let sig = m.forwarding_signature(sig);
        quote!(#sig;)
    });
    let forwards = methods.iter().map(|(m, sig)| {
        let const_name = m.const_name();
        m.forwarding(quote!(#module::#const_name), sig)
    });

    let superclass = args.superclass.as_ref().map(|s| quote!(.with_superclass(#s)));
    let sealed = args.sealed.then(|| quote!(.sealed()));

    Ok(quote! {
        #input

        /// 由 `#[aop_class]` 生成的类元数据
        #[doc(hidden)]
        #[allow(non_snake_case, dead_code, unused_imports, unused_variables)]
        pub mod #module {
            use super::*;

            #(#descriptors)*

            pub static CLASS: ::chimera_aop::once_cell::sync::Lazy<::chimera_aop::ClassDescriptor> =
                ::chimera_aop::once_cell::sync::Lazy::new(|| {
                    ::chimera_aop::ClassDescriptor::new(#class_name)
                        #superclass
                        #( .implementing(&#child_interface_modules::INTERFACE) )*
                        #( .with_method(&#const_names) )*
                        #sealed
                });

            /// 把调用分派到类自身声明的方法，方法不属于该类时返回 `None`
            pub fn dispatch(
                target: &#child_self_path,
                method: &::chimera_aop::MethodDescriptor,
                args: &::chimera_aop::Arguments,
            ) -> Option<::chimera_aop::InvocationResult<::chimera_aop::ReturnValue>> {
                if ::chimera_aop::normalize_type_name(method.declaring_type()) != CLASS.name() {
                    return None;
                }
                match method.name() {
                    #(#arms)*
                    _ => None,
                }
            }
        }

        impl ::chimera_aop::Invocable for #self_ty {
            fn class(&self) -> &::chimera_aop::ClassDescriptor {
                &#module::CLASS
            }

            fn invoke(
                &self,
                method: &::chimera_aop::MethodDescriptor,
                args: &::chimera_aop::Arguments,
            ) -> ::chimera_aop::InvocationResult<::chimera_aop::ReturnValue> {
                #(
                    if let Some(result) = #interface_modules::dispatch(self, method, args) {
                        return result;
                    }
                )*
                if let Some(result) = #module::dispatch(self, method, args) {
                    return result;
                }
                Err(::chimera_aop::AopError::NoSuchMethod {
                    class: #class_name.to_string(),
                    method: method.to_string(),
                }
                .into())
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        /// 类自身方法的对象契约，可以在目标和代理上统一调用
        pub trait #contract {
            #(#contract_sigs)*
        }

        impl #contract for dyn ::chimera_aop::Invocable {
            #(#forwards)*
        }
    })
}
