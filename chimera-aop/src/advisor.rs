//! Advisor 定义
//!
//! Advisor 把一个切点和一个通知绑定在一起，是注册的基本单位。Advisor 在配置阶段
//! 注册一次，之后只读。

use crate::advice::Advice;
use crate::error::{AopError, AopResult, InvocationResult};
use crate::expression::ExpressionPointcut;
use crate::object::{
    Arguments, ClassDescriptor, Invocable, MethodDescriptor, ReturnValue, ADVISOR_INTERFACE,
};
use crate::pointcut::{Pointcut, TruePointcut};
use once_cell::sync::Lazy;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Advisor Trait
pub trait Advisor: Send + Sync {
    /// Advisor 名称（通常是 Bean 名称）
    fn name(&self) -> &str;

    fn pointcut(&self) -> &dyn Pointcut;

    fn advice(&self) -> &Advice;
}

impl fmt::Debug for dyn Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("name", &self.name())
            .field("advice", self.advice())
            .finish()
    }
}

static DEFAULT_POINTCUT_ADVISOR_CLASS: Lazy<ClassDescriptor> = Lazy::new(|| {
    ClassDescriptor::new("chimera.aop.DefaultPointcutAdvisor")
        .implementing(&ADVISOR_INTERFACE)
        .sealed()
});

static EXPRESSION_POINTCUT_ADVISOR_CLASS: Lazy<ClassDescriptor> = Lazy::new(|| {
    ClassDescriptor::new("chimera.aop.ExpressionPointcutAdvisor")
        .implementing(&ADVISOR_INTERFACE)
        .sealed()
});

fn no_such_method(class: &ClassDescriptor, method: &MethodDescriptor) -> anyhow::Error {
    AopError::NoSuchMethod {
        class: class.name().to_string(),
        method: method.name().to_string(),
    }
    .into()
}

/// 使用任意切点的 Advisor
#[derive(Clone)]
pub struct DefaultPointcutAdvisor {
    name: String,
    pointcut: Arc<dyn Pointcut>,
    advice: Advice,
}

impl DefaultPointcutAdvisor {
    pub fn new(name: impl Into<String>, pointcut: Arc<dyn Pointcut>, advice: Advice) -> Self {
        Self {
            name: name.into(),
            pointcut,
            advice,
        }
    }

    /// 作用于所有方法的 Advisor
    pub fn for_advice(name: impl Into<String>, advice: Advice) -> Self {
        Self::new(name, Arc::new(TruePointcut), advice)
    }
}

impl Advisor for DefaultPointcutAdvisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pointcut(&self) -> &dyn Pointcut {
        self.pointcut.as_ref()
    }

    fn advice(&self) -> &Advice {
        &self.advice
    }
}

impl Invocable for DefaultPointcutAdvisor {
    fn class(&self) -> &ClassDescriptor {
        &DEFAULT_POINTCUT_ADVISOR_CLASS
    }

    fn invoke(&self, method: &MethodDescriptor, _args: &Arguments) -> InvocationResult<ReturnValue> {
        Err(no_such_method(self.class(), method))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for DefaultPointcutAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPointcutAdvisor")
            .field("name", &self.name)
            .field("advice", &self.advice)
            .finish()
    }
}

/// 基于切点表达式的 Advisor
///
/// 表达式在构造时编译，编译失败是配置错误。
#[derive(Clone)]
pub struct ExpressionPointcutAdvisor {
    name: String,
    pointcut: ExpressionPointcut,
    advice: Advice,
}

impl ExpressionPointcutAdvisor {
    pub fn new(name: impl Into<String>, expression: &str, advice: Advice) -> AopResult<Self> {
        let name = name.into();
        let pointcut = ExpressionPointcut::compile(expression)?;
        tracing::debug!("Created advisor '{}' with pointcut: {}", name, expression);
        Ok(Self {
            name,
            pointcut,
            advice,
        })
    }

    pub fn expression(&self) -> &str {
        self.pointcut.expression()
    }
}

impl Advisor for ExpressionPointcutAdvisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn pointcut(&self) -> &dyn Pointcut {
        &self.pointcut
    }

    fn advice(&self) -> &Advice {
        &self.advice
    }
}

impl Invocable for ExpressionPointcutAdvisor {
    fn class(&self) -> &ClassDescriptor {
        &EXPRESSION_POINTCUT_ADVISOR_CLASS
    }

    fn invoke(&self, method: &MethodDescriptor, _args: &Arguments) -> InvocationResult<ReturnValue> {
        Err(no_such_method(self.class(), method))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ExpressionPointcutAdvisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionPointcutAdvisor")
            .field("name", &self.name)
            .field("expression", &self.pointcut.expression())
            .field("advice", &self.advice)
            .finish()
    }
}

/// Advisor 注册器
///
/// 用于 inventory 在编译时收集 Advisor：
///
/// ```ignore
/// chimera_aop::inventory::submit! {
///     chimera_aop::AdvisorRegistration::new(
///         "auditAdvisor",
///         "execution(* com.example.service..*.*(..))",
///         || chimera_aop::Advice::after_throwing(AuditAdvice),
///     )
/// }
/// ```
pub struct AdvisorRegistration {
    /// Advisor 名称
    pub name: &'static str,

    /// 切点表达式
    pub expression: &'static str,

    /// 创建通知实例的函数
    pub advice: fn() -> Advice,
}

impl AdvisorRegistration {
    pub const fn new(name: &'static str, expression: &'static str, advice: fn() -> Advice) -> Self {
        Self {
            name,
            expression,
            advice,
        }
    }

    /// 编译表达式并创建 Advisor
    pub fn create_advisor(&self) -> AopResult<ExpressionPointcutAdvisor> {
        ExpressionPointcutAdvisor::new(self.name, self.expression, (self.advice)())
    }
}

inventory::collect!(AdvisorRegistration);

/// 获取所有编译时注册的 Advisor
pub fn get_all_advisor_registrations() -> impl Iterator<Item = &'static AdvisorRegistration> {
    inventory::iter::<AdvisorRegistration>()
}
