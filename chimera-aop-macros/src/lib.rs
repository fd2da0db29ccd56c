//! Chimera AOP 过程宏
//!
//! Rust 没有运行时反射，代理需要的类型元数据由以下宏在编译时生成：
//! - `#[aop_interface]` - 把 trait 声明为可代理的接口
//! - `#[aop_class]` - 为具体类型生成类描述符和 `Invocable` 实现

extern crate proc_macro;

mod class;
mod interface;
mod utils;

use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemImpl, ItemTrait, LitStr};

/// `#[aop_interface]` 属性宏
///
/// 用法：
/// ```ignore
/// #[aop_interface(name = "com.example.Calculator")]  // 可选：接口全名，默认为 trait 名
/// pub trait Calculator: Send + Sync {
///     fn add(&self, a: i32, b: i32) -> anyhow::Result<i32>;
/// }
/// ```
///
/// 生成 `calculator_aop` 模块（方法描述符 `ADD`、接口描述符 `INTERFACE`
/// 以及分派函数），并为 `dyn Invocable` 实现该 trait，因此代理可以直接
/// 当作 `Calculator` 调用。
///
/// 方法必须接收 `&self`，参数为拥有所有权的 `Clone + Send + Sync` 类型，
/// 返回 `Result<T, E>` 且 `E: From<anyhow::Error>`。
#[proc_macro_attribute]
pub fn aop_interface(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut name: Option<LitStr> = None;
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("name") {
            name = Some(meta.value()?.parse()?);
            Ok(())
        } else {
            Err(meta.error("unsupported aop_interface argument, expected `name`"))
        }
    });
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemTrait);
    interface::impl_aop_interface(name, &input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// `#[aop_class]` 属性宏
///
/// 放在类型的 inherent impl 块上：
/// ```ignore
/// #[aop_class(
///     name = "com.example.CalculatorImpl",   // 可选：类全名，默认为类型名
///     superclass = "com.example.Base",       // 可选：父类
///     interfaces(Calculator),                // 可选：实现的 #[aop_interface] trait
///     sealed,                                // 可选：禁止子类代理
/// )]
/// impl CalculatorImpl {
///     pub fn reset(&self) -> anyhow::Result<()> { ... }
///
///     #[aop(final)]  // 子类代理不会拦截 final 方法
///     pub fn calls(&self) -> anyhow::Result<usize> { ... }
/// }
/// ```
///
/// 公开的、接收 `&self` 且返回 `Result` 的方法会成为类的方法，
/// 其余方法保持为普通方法。
#[proc_macro_attribute]
pub fn aop_class(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = class::ClassArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemImpl);
    class::impl_aop_class(args, input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
