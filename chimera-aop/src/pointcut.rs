//! 切点（Pointcut）
//!
//! 切点由类过滤器 [`ClassFilter`] 和方法匹配器 [`MethodMatcher`] 组成。
//! 两者都是纯函数：不修改状态，可以在任意线程上重复调用。
//!
//! 类级过滤只是快速排除：方法匹配总是要求类过滤器也接受目标类型。

use crate::object::{Arguments, ClassDescriptor, MethodDescriptor};
use std::fmt;
use std::sync::Arc;

/// 类过滤器
pub trait ClassFilter: Send + Sync {
    /// 切点是否可能作用于该类型
    fn matches(&self, class: &ClassDescriptor) -> bool;
}

/// 方法匹配器
pub trait MethodMatcher: Send + Sync {
    /// 静态匹配：方法加目标类型
    fn matches(&self, method: &MethodDescriptor, target_class: &ClassDescriptor) -> bool;

    /// 是否需要在每次调用时结合参数再次匹配
    fn is_runtime(&self) -> bool {
        false
    }

    /// 动态匹配，只有 `is_runtime()` 为 true 且静态匹配通过时才会调用
    fn matches_with_args(
        &self,
        method: &MethodDescriptor,
        target_class: &ClassDescriptor,
        _args: &Arguments,
    ) -> bool {
        self.matches(method, target_class)
    }
}

/// 切点 Trait
pub trait Pointcut: Send + Sync {
    fn class_filter(&self) -> &dyn ClassFilter;

    fn method_matcher(&self) -> &dyn MethodMatcher;

    /// 类级匹配
    fn matches_class(&self, class: &ClassDescriptor) -> bool {
        self.class_filter().matches(class)
    }

    /// 方法级匹配：类过滤器和方法匹配器必须同时接受
    fn matches_method(&self, method: &MethodDescriptor, target_class: &ClassDescriptor) -> bool {
        self.class_filter().matches(target_class)
            && self.method_matcher().matches(method, target_class)
    }
}

/// 接受所有类型
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueClassFilter;

impl ClassFilter for TrueClassFilter {
    fn matches(&self, _class: &ClassDescriptor) -> bool {
        true
    }
}

/// 接受所有方法
#[derive(Debug, Clone, Copy, Default)]
pub struct TrueMethodMatcher;

impl MethodMatcher for TrueMethodMatcher {
    fn matches(&self, _method: &MethodDescriptor, _target_class: &ClassDescriptor) -> bool {
        true
    }
}

/// 匹配一切的切点
#[derive(Debug, Clone, Copy, Default)]
pub struct TruePointcut;

impl Pointcut for TruePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        &TrueClassFilter
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        &TrueMethodMatcher
    }
}

/// 只接受可以赋值给指定类型的类
#[derive(Debug, Clone)]
pub struct RootClassFilter {
    type_name: String,
}

impl RootClassFilter {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

impl ClassFilter for RootClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        class.is_assignable_to(&self.type_name)
    }
}

/// 任一过滤器接受即接受
#[derive(Clone)]
pub struct UnionClassFilter {
    filters: Vec<Arc<dyn ClassFilter>>,
}

impl UnionClassFilter {
    pub fn new(filters: Vec<Arc<dyn ClassFilter>>) -> Self {
        Self { filters }
    }
}

impl ClassFilter for UnionClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        self.filters.iter().any(|f| f.matches(class))
    }
}

/// 所有过滤器都接受才接受
#[derive(Clone)]
pub struct IntersectionClassFilter {
    filters: Vec<Arc<dyn ClassFilter>>,
}

impl IntersectionClassFilter {
    pub fn new(filters: Vec<Arc<dyn ClassFilter>>) -> Self {
        Self { filters }
    }
}

impl ClassFilter for IntersectionClassFilter {
    fn matches(&self, class: &ClassDescriptor) -> bool {
        self.filters.iter().all(|f| f.matches(class))
    }
}

/// 两个方法匹配器的交集
#[derive(Clone)]
pub struct IntersectionMethodMatcher {
    left: Arc<dyn MethodMatcher>,
    right: Arc<dyn MethodMatcher>,
}

impl IntersectionMethodMatcher {
    pub fn new(left: Arc<dyn MethodMatcher>, right: Arc<dyn MethodMatcher>) -> Self {
        Self { left, right }
    }
}

impl MethodMatcher for IntersectionMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, target_class: &ClassDescriptor) -> bool {
        self.left.matches(method, target_class) && self.right.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.left.is_runtime() || self.right.is_runtime()
    }

    fn matches_with_args(
        &self,
        method: &MethodDescriptor,
        target_class: &ClassDescriptor,
        args: &Arguments,
    ) -> bool {
        let left = if self.left.is_runtime() {
            self.left.matches_with_args(method, target_class, args)
        } else {
            self.left.matches(method, target_class)
        };
        let right = if self.right.is_runtime() {
            self.right.matches_with_args(method, target_class, args)
        } else {
            self.right.matches(method, target_class)
        };
        left && right
    }
}

/// 两个方法匹配器的并集
#[derive(Clone)]
pub struct UnionMethodMatcher {
    left: Arc<dyn MethodMatcher>,
    right: Arc<dyn MethodMatcher>,
}

impl UnionMethodMatcher {
    pub fn new(left: Arc<dyn MethodMatcher>, right: Arc<dyn MethodMatcher>) -> Self {
        Self { left, right }
    }
}

impl MethodMatcher for UnionMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, target_class: &ClassDescriptor) -> bool {
        self.left.matches(method, target_class) || self.right.matches(method, target_class)
    }

    fn is_runtime(&self) -> bool {
        self.left.is_runtime() || self.right.is_runtime()
    }

    fn matches_with_args(
        &self,
        method: &MethodDescriptor,
        target_class: &ClassDescriptor,
        args: &Arguments,
    ) -> bool {
        (self.left.matches(method, target_class)
            && (!self.left.is_runtime() || self.left.matches_with_args(method, target_class, args)))
            || (self.right.matches(method, target_class)
                && (!self.right.is_runtime()
                    || self.right.matches_with_args(method, target_class, args)))
    }
}

/// 简单的通配符匹配（只支持 `*`）
///
/// - `*` - 匹配任意字符串
/// - `get*` - 以 get 开头
/// - `*User` - 以 User 结尾
/// - `*User*` - 包含 User
pub fn simple_match(pattern: &str, target: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == target,
        Some((prefix, rest)) => {
            if !target.starts_with(prefix) {
                return false;
            }
            let remaining = &target[prefix.len()..];
            if rest.is_empty() {
                return true;
            }
            (0..=remaining.len())
                .filter(|i| remaining.is_char_boundary(*i))
                .any(|i| simple_match(rest, &remaining[i..]))
        }
    }
}

/// 按方法名匹配
#[derive(Debug, Clone, Default)]
pub struct NameMatchMethodMatcher {
    mapped_names: Vec<String>,
}

impl NameMatchMethodMatcher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mapped_names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_method_name(mut self, name: impl Into<String>) -> Self {
        self.mapped_names.push(name.into());
        self
    }
}

impl MethodMatcher for NameMatchMethodMatcher {
    fn matches(&self, method: &MethodDescriptor, _target_class: &ClassDescriptor) -> bool {
        self.mapped_names
            .iter()
            .any(|pattern| simple_match(pattern, method.name()))
    }
}

/// 可组合切点
///
/// ```ignore
/// let pointcut = ComposablePointcut::new()
///     .intersection_class_filter(Arc::new(RootClassFilter::new("com.example.Repository")))
///     .intersection_method_matcher(Arc::new(NameMatchMethodMatcher::new(["find*"])));
/// ```
#[derive(Clone)]
pub struct ComposablePointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl ComposablePointcut {
    pub fn new() -> Self {
        Self {
            class_filter: Arc::new(TrueClassFilter),
            method_matcher: Arc::new(TrueMethodMatcher),
        }
    }

    pub fn with(class_filter: Arc<dyn ClassFilter>, method_matcher: Arc<dyn MethodMatcher>) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    pub fn union_class_filter(mut self, other: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = Arc::new(UnionClassFilter::new(vec![self.class_filter, other]));
        self
    }

    pub fn intersection_class_filter(mut self, other: Arc<dyn ClassFilter>) -> Self {
        self.class_filter = Arc::new(IntersectionClassFilter::new(vec![self.class_filter, other]));
        self
    }

    pub fn union_method_matcher(mut self, other: Arc<dyn MethodMatcher>) -> Self {
        self.method_matcher = Arc::new(UnionMethodMatcher::new(self.method_matcher, other));
        self
    }

    pub fn intersection_method_matcher(mut self, other: Arc<dyn MethodMatcher>) -> Self {
        self.method_matcher = Arc::new(IntersectionMethodMatcher::new(self.method_matcher, other));
        self
    }
}

impl Default for ComposablePointcut {
    fn default() -> Self {
        Self::new()
    }
}

impl Pointcut for ComposablePointcut {
    fn class_filter(&self) -> &dyn ClassFilter {
        self.class_filter.as_ref()
    }

    fn method_matcher(&self) -> &dyn MethodMatcher {
        self.method_matcher.as_ref()
    }
}

impl fmt::Debug for ComposablePointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposablePointcut").finish_non_exhaustive()
    }
}
