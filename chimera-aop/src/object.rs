//! 对象模型
//!
//! Rust 没有运行时反射，也不能在运行时生成子类。这里用显式的元数据和
//! trait 对象替代：
//! - [`MethodDescriptor`] / [`InterfaceDescriptor`] / [`ClassDescriptor`] 描述类型和方法签名
//! - [`Invocable`] 是"可代理对象"的能力：暴露类型描述，并能按方法描述符完成真实调用
//! - [`Arguments`] / [`ReturnValue`] 是类型擦除后的参数列表和返回值
//!
//! 这些元数据通常由 `chimera-aop-macros` 在编译时生成，也可以手写。

use crate::advised::Advised;
use crate::error::{AopError, AopResult, InvocationResult};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

/// 对象引用
///
/// 容器持有的、代理创建钩子接收和返回的对象引用。同一性通过 `Arc::ptr_eq` 判断。
pub type ObjectRef = Arc<dyn Invocable>;

/// 规范化类型名：`::` 统一为 `.`，去掉空白
pub fn normalize_type_name(name: &str) -> String {
    name.replace("::", ".").split_whitespace().collect()
}

/// 方法描述符
///
/// 可以在 `static` 中构造。Rust 没有重载，因此 `(declaring_type, name)` 唯一确定一个方法。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    declaring_type: &'static str,
    name: &'static str,
    param_types: &'static [&'static str],
    return_type: &'static str,
    is_final: bool,
}

impl MethodDescriptor {
    pub const fn new(
        declaring_type: &'static str,
        name: &'static str,
        param_types: &'static [&'static str],
        return_type: &'static str,
    ) -> Self {
        Self {
            declaring_type,
            name,
            param_types,
            return_type,
            is_final: false,
        }
    }

    /// 标记为 final：子类代理不会拦截该方法
    pub const fn with_final(self) -> Self {
        Self {
            is_final: true,
            ..self
        }
    }

    pub fn declaring_type(&self) -> &'static str {
        self.declaring_type
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn param_types(&self) -> &'static [&'static str] {
        self.param_types
    }

    pub fn return_type(&self) -> &'static str {
        self.return_type
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// 是否与另一个描述符指向同一个方法
    pub fn same_as(&self, other: &MethodDescriptor) -> bool {
        self.name == other.name
            && normalize_type_name(self.declaring_type) == normalize_type_name(other.declaring_type)
    }

    /// 完整签名，例如 `i32 com.example.Calculator.add(i32, i32)`
    pub fn signature(&self) -> String {
        format!(
            "{} {}.{}({})",
            self.return_type,
            normalize_type_name(self.declaring_type),
            self.name,
            self.param_types.join(", ")
        )
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", normalize_type_name(self.declaring_type), self.name)
    }
}

/// 接口描述符
#[derive(Debug)]
pub struct InterfaceDescriptor {
    name: &'static str,
    methods: &'static [&'static MethodDescriptor],
}

impl InterfaceDescriptor {
    pub const fn new(name: &'static str, methods: &'static [&'static MethodDescriptor]) -> Self {
        Self { name, methods }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn methods(&self) -> &'static [&'static MethodDescriptor] {
        self.methods
    }

    pub fn declares(&self, method: &MethodDescriptor) -> bool {
        self.methods.iter().any(|m| m.same_as(method))
    }
}

/// 基础设施接口：实现它们的类型永远不会被自动代理
pub static ADVICE_INTERFACE: InterfaceDescriptor = InterfaceDescriptor::new("chimera.aop.Advice", &[]);
pub static POINTCUT_INTERFACE: InterfaceDescriptor =
    InterfaceDescriptor::new("chimera.aop.Pointcut", &[]);
pub static ADVISOR_INTERFACE: InterfaceDescriptor =
    InterfaceDescriptor::new("chimera.aop.Advisor", &[]);

/// 类描述符
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<&'static InterfaceDescriptor>,
    methods: Vec<&'static MethodDescriptor>,
    subclassable: bool,
}

impl ClassDescriptor {
    /// 创建类描述符，默认可被子类化
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_type_name(name.as_ref()),
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            subclassable: true,
        }
    }

    pub fn with_superclass(mut self, superclass: impl AsRef<str>) -> Self {
        self.superclass = Some(normalize_type_name(superclass.as_ref()));
        self
    }

    pub fn implementing(mut self, interface: &'static InterfaceDescriptor) -> Self {
        if !self.interfaces.iter().any(|i| i.name == interface.name) {
            self.interfaces.push(interface);
        }
        self
    }

    pub fn with_method(mut self, method: &'static MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// 标记为 sealed，不能生成子类代理
    pub fn sealed(mut self) -> Self {
        self.subclassable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 不含包路径的类名
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn interfaces(&self) -> &[&'static InterfaceDescriptor] {
        &self.interfaces
    }

    pub fn has_interfaces(&self) -> bool {
        !self.interfaces.is_empty()
    }

    /// 类自身声明的方法
    pub fn methods(&self) -> &[&'static MethodDescriptor] {
        &self.methods
    }

    pub fn is_subclassable(&self) -> bool {
        self.subclassable
    }

    /// 自身方法加上所有接口方法
    pub fn all_methods(&self) -> Vec<&'static MethodDescriptor> {
        let mut all: Vec<&'static MethodDescriptor> = self.methods.clone();
        for interface in &self.interfaces {
            for method in interface.methods {
                if !all.iter().any(|m| m.same_as(method)) {
                    all.push(method);
                }
            }
        }
        all
    }

    pub fn find_method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods
            .iter()
            .chain(self.interfaces.iter().flat_map(|i| i.methods.iter()))
            .find(|m| m.name == name)
            .copied()
    }

    /// 方法是否由某个实现的接口声明
    pub fn is_interface_method(&self, method: &MethodDescriptor) -> bool {
        self.interfaces.iter().any(|i| i.declares(method))
    }

    /// 是否可以赋值给指定类型（自身、父类或实现的接口）
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        let type_name = normalize_type_name(type_name);
        self.name == type_name
            || self.superclass.as_deref() == Some(type_name.as_str())
            || self.interfaces.iter().any(|i| normalize_type_name(i.name) == type_name)
    }

    /// 参与类型匹配的所有名字：自身、父类、接口
    pub fn type_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        names.extend(self.superclass.clone());
        names.extend(self.interfaces.iter().map(|i| normalize_type_name(i.name)));
        names
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 方法参数列表
///
/// 参数以 `Arc` 保存，克隆开销很小；环绕通知可以读取或替换参数。
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Arc<dyn Any + Send + Sync>>,
    type_names: Vec<&'static str>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个参数
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(Arc::new(value));
        self.type_names.push(type_name::<T>());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref::<T>()
    }

    /// 取出参数的副本，类型或位置不符时报告所属方法
    pub fn extract<T: Any + Clone>(&self, method: &MethodDescriptor, index: usize) -> AopResult<T> {
        self.get::<T>(index)
            .cloned()
            .ok_or_else(|| AopError::ArgumentMismatch {
                method: method.to_string(),
                index,
                expected: type_name::<T>(),
            })
    }

    /// 替换指定位置的参数
    pub fn set<T: Any + Send + Sync>(&mut self, index: usize, value: T) -> AopResult<()> {
        if index >= self.values.len() {
            return Err(AopError::ArgumentMismatch {
                method: "<set>".to_string(),
                index,
                expected: type_name::<T>(),
            });
        }
        self.values[index] = Arc::new(value);
        self.type_names[index] = type_name::<T>();
        Ok(())
    }

    pub fn type_name(&self, index: usize) -> Option<&'static str> {
        self.type_names.get(index).copied()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names.iter()).finish()
    }
}

/// 构造参数列表
///
/// ```ignore
/// let args = chimera_aop::arguments![2, 3];
/// ```
#[macro_export]
macro_rules! arguments {
    () => {
        $crate::Arguments::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Arguments::new()$(.with($value))+
    };
}

/// 类型擦除的返回值
pub struct ReturnValue {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ReturnValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn unit() -> Self {
        Self::new(())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast<T: Any>(self) -> AopResult<T> {
        let actual = self.type_name;
        self.value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| AopError::ReturnTypeMismatch {
                expected: type_name::<T>(),
                actual,
            })
    }
}

impl fmt::Debug for ReturnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReturnValue({})", self.type_name)
    }
}

/// 可调用对象
///
/// 目标对象和代理都实现此 trait。`invoke` 相当于反射调用：按方法描述符把调用
/// 分派到真实方法上。
pub trait Invocable: Any + Send + Sync {
    /// 运行时类型描述
    fn class(&self) -> &ClassDescriptor;

    /// 调用指定方法
    fn invoke(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue>;

    fn as_any(&self) -> &dyn Any;

    /// 代理配置视图，只有代理返回 `Some`
    fn advised(&self) -> Option<&dyn Advised> {
        None
    }
}

impl dyn Invocable {
    pub fn downcast_ref<T: Invocable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.class().is_assignable_to(type_name)
    }

    /// 按方法名调用
    pub fn call(&self, method_name: &str, args: &Arguments) -> InvocationResult<ReturnValue> {
        let method = self
            .class()
            .find_method(method_name)
            .ok_or_else(|| AopError::NoSuchMethod {
                class: self.class().name().to_string(),
                method: method_name.to_string(),
            })?;
        self.invoke(method, args)
    }
}

impl fmt::Debug for dyn Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invocable({})", self.class().name())
    }
}
