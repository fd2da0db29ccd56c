//! 工具函数

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse_quote, Error, FnArg, GenericArgument, Ident, Path, PathArguments, ReturnType, Signature,
    Type,
};

/// 被代理方法的元数据
pub struct MethodInfo {
    pub ident: Ident,
    pub params: Vec<Type>,
    pub ok_type: Type,
    pub is_final: bool,
}

impl MethodInfo {
    /// 校验并解析方法签名
    pub fn from_signature(sig: &Signature) -> syn::Result<Self> {
        if let Some(asyncness) = &sig.asyncness {
            return Err(Error::new_spanned(
                asyncness,
                "async methods cannot be proxied: proxied calls are synchronous",
            ));
        }
        if !sig.generics.params.is_empty() {
            return Err(Error::new_spanned(
                &sig.generics,
                "generic methods cannot be proxied",
            ));
        }
        match sig.receiver() {
            Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
            _ => {
                return Err(Error::new_spanned(
                    sig,
                    "proxied methods must take `&self`",
                ))
            }
        }

        let params = sig
            .inputs
            .iter()
            .filter_map(|arg| match arg {
                FnArg::Typed(pat_type) => Some(pat_type),
                FnArg::Receiver(_) => None,
            })
            .map(|pat_type| match &*pat_type.ty {
                Type::Reference(reference) => Err(Error::new_spanned(
                    reference,
                    "parameters of proxied methods must be owned types",
                )),
                ty => Ok(ty.clone()),
            })
            .collect::<syn::Result<Vec<_>>>()?;

        let ok_type = result_ok_type(&sig.output).cloned().ok_or_else(|| {
            Error::new_spanned(
                &sig.output,
                "proxied methods must return Result<T, E> where E: From<anyhow::Error>",
            )
        })?;

        Ok(Self {
            ident: sig.ident.clone(),
            params,
            ok_type,
            is_final: false,
        })
    }

    /// 方法描述符 static 的名字
    pub fn const_name(&self) -> Ident {
        format_ident!("{}", self.ident.to_string().to_uppercase())
    }

    fn bindings(&self) -> Vec<Ident> {
        (0..self.params.len())
            .map(|i| format_ident!("__arg{}", i))
            .collect()
    }

    /// `pub static ADD: MethodDescriptor = ...;`
    pub fn descriptor(&self, declaring_type: &str) -> TokenStream {
        let const_name = self.const_name();
        let name = self.ident.to_string();
        let params: Vec<String> = self.params.iter().map(type_string).collect();
        let return_type = type_string(&self.ok_type);
        let final_marker = self.is_final.then(|| quote!(.with_final()));

        quote! {
            pub static #const_name: ::chimera_aop::MethodDescriptor =
                ::chimera_aop::MethodDescriptor::new(#declaring_type, #name, &[#(#params),*], #return_type)
                    #final_marker;
        }
    }

    /// `dispatch` 中的一个分支：取出参数并调用真实方法
    pub fn dispatch_arm(&self) -> TokenStream {
        let name = self.ident.to_string();
        let method = &self.ident;
        let bindings = self.bindings();
        let types = &self.params;
        let indices = 0..self.params.len();

        quote! {
            #name => Some((|| -> ::chimera_aop::InvocationResult<::chimera_aop::ReturnValue> {
                #( let #bindings: #types = args.extract::<#types>(method, #indices)?; )*
                let value = target
                    .#method(#(#bindings),*)
                    .map_err(::chimera_aop::anyhow::Error::from)?;
                Ok(::chimera_aop::ReturnValue::new(value))
            })()),
        }
    }

    /// 参数名替换为 `__argN` 的签名，用于转发实现和 trait 声明
    pub fn forwarding_signature(&self, sig: &Signature) -> Signature {
        let mut sig = sig.clone();
        let typed = sig.inputs.iter_mut().filter_map(|arg| match arg {
            FnArg::Typed(pat_type) => Some(pat_type),
            FnArg::Receiver(_) => None,
        });
        for (pat_type, binding) in typed.zip(self.bindings()) {
            pat_type.pat = Box::new(parse_quote!(#binding));
        }
        sig
    }

    /// 在 `dyn Invocable` 上的转发实现：打包参数，经 `invoke` 调用，再取回返回值
    pub fn forwarding(&self, descriptor: TokenStream, sig: &Signature) -> TokenStream {
        let sig = self.forwarding_signature(sig);
        let bindings = self.bindings();
        let ok_type = &self.ok_type;

        quote! {
            #sig {
                let args = ::chimera_aop::Arguments::new() #( .with(#bindings) )*;
                let value = ::chimera_aop::Invocable::invoke(self, &#descriptor, &args)?;
                Ok(value
                    .downcast::<#ok_type>()
                    .map_err(::chimera_aop::anyhow::Error::from)?)
            }
        }
    }
}

/// `Result<T, E>` 中的 `T`
pub fn result_ok_type(output: &ReturnType) -> Option<&Type> {
    let ReturnType::Type(_, ty) = output else {
        return None;
    };
    let Type::Path(type_path) = &**ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// 类型的紧凑字符串形式，例如 `Vec<String>`
pub fn type_string(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

/// `CalculatorImpl` -> `calculator_impl`
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut result = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                result.push('_');
            }
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// 生成的元数据模块名：`Calculator` -> `calculator_aop`
pub fn aop_module_ident(ident: &Ident) -> Ident {
    format_ident!("{}_aop", to_snake_case(&ident.to_string()))
}

/// 接口 trait 路径对应的元数据模块路径：`api::Calculator` -> `api::calculator_aop`
pub fn interface_module_path(interface: &Path) -> syn::Result<Path> {
    let mut path = interface.clone();
    let last = path
        .segments
        .last_mut()
        .ok_or_else(|| Error::new_spanned(interface, "expected an interface trait path"))?;
    last.ident = aop_module_ident(&last.ident);
    last.arguments = PathArguments::None;
    Ok(path)
}

/// 把相对父模块的路径改写为在子模块中可用的路径
pub fn relative_to_child(path: &Path) -> Path {
    match path.segments.first() {
        Some(first) if first.ident == "self" => {
            let mut path = path.clone();
            if let Some(first) = path.segments.first_mut() {
                first.ident = format_ident!("super");
            }
            path
        }
        Some(first) if first.ident == "super" => parse_quote!(super::#path),
        _ => path.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("Calculator"), "calculator");
        assert_eq!(to_snake_case("CalculatorImpl"), "calculator_impl");
        assert_eq!(to_snake_case("HTTPService"), "http_service");
        assert_eq!(to_snake_case("Oauth2Client"), "oauth2_client");
    }

    #[test]
    fn test_result_ok_type() {
        let sig: Signature = parse_quote!(fn add(&self, a: i32) -> anyhow::Result<Vec<String>>);
        let ok = result_ok_type(&sig.output).unwrap();
        assert_eq!(type_string(ok), "Vec<String>");

        let sig: Signature = parse_quote!(fn count(&self) -> usize);
        assert!(result_ok_type(&sig.output).is_none());
    }

    #[test]
    fn test_method_info_rejects_unsupported_signatures() {
        let sig: Signature = parse_quote!(async fn load(&self) -> Result<(), Error>);
        assert!(MethodInfo::from_signature(&sig).is_err());

        let sig: Signature = parse_quote!(fn rename(&self, name: &str) -> Result<(), Error>);
        assert!(MethodInfo::from_signature(&sig).is_err());

        let sig: Signature = parse_quote!(fn reset(&mut self) -> Result<(), Error>);
        assert!(MethodInfo::from_signature(&sig).is_err());

        let sig: Signature = parse_quote!(fn add(&self, a: i32, b: i32) -> Result<i32, Error>);
        let info = MethodInfo::from_signature(&sig).unwrap();
        assert_eq!(info.const_name(), "ADD");
        assert_eq!(info.params.len(), 2);
    }

    #[test]
    fn test_interface_module_path() {
        let path: Path = parse_quote!(crate::api::Calculator);
        let module = interface_module_path(&path).unwrap();
        assert_eq!(quote!(#module).to_string().replace(' ', ""), "crate::api::calculator_aop");

        let path: Path = parse_quote!(super::Greeter);
        let child = relative_to_child(&path);
        assert_eq!(quote!(#child).to_string().replace(' ', ""), "super::super::Greeter");
    }
}
