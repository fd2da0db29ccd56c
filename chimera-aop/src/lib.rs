//! Chimera AOP - 面向切面编程支持
//!
//! 为目标对象创建代理，拦截方法调用并按切点匹配执行通知：
//! - 切点表达式（`execution(...)` / `within(...)`，支持 `&&`、`||`、`!`）
//! - 多种通知类型（Around、Before、AfterReturning、AfterThrowing、After）
//! - 两种代理策略：基于接口的代理和基于子类的代理
//! - 通过 BeanPostProcessor 自动为匹配的 Bean 创建代理，循环依赖时也只代理一次
//!
//! Rust 没有运行时反射，目标类型需要提供元数据（[`ClassDescriptor`] 等）并实现
//! [`Invocable`]。`chimera-aop-macros` 的 `#[aop_interface]` 和 `#[aop_class]`
//! 可以在编译时生成这些代码。
//!
//! ```ignore
//! use chimera_aop::prelude::*;
//!
//! let mut factory = ProxyFactory::with_target(Arc::new(CalculatorImpl));
//! factory.add_advisor(Arc::new(ExpressionPointcutAdvisor::new(
//!     "tracing",
//!     "execution(* com.example.Calculator.*(..))",
//!     Advice::around(TraceInterceptor),
//! )?))?;
//!
//! let calculator = factory.get_proxy()?;
//! assert_eq!(calculator.add(2, 3)?, 5);
//! ```

pub mod advice;
pub mod advised;
pub mod advisor;
pub mod auto_proxy;
pub mod bean_post_processor;
pub mod config;
pub mod error;
pub mod error_info;
pub mod expression;
pub mod interceptor;
pub mod joinpoint;
pub mod logging;
pub mod object;
pub mod pointcut;
pub mod proxy;
pub mod proxy_factory;
pub mod registry;
pub mod target;
pub mod utils;

#[cfg(test)]
mod testing;

// 重新导出核心类型
pub use advice::{
    Advice, AdviceType, AfterAdvice, AfterReturningAdvice, MethodBeforeAdvice, MethodInterceptor,
    ThrowsAdvice,
};
pub use advised::{Advised, AdvisedSupport, AdvisorChainFactory, DefaultAdvisorChainFactory, ProxyConfig, ProxyKind};
pub use advisor::{
    get_all_advisor_registrations, Advisor, AdvisorRegistration, DefaultPointcutAdvisor,
    ExpressionPointcutAdvisor,
};
pub use auto_proxy::{is_infrastructure_class, AdvisorLookup, DefaultAdvisorAutoProxyCreator};
pub use bean_post_processor::{CreationSession, SmartInstantiationAwareBeanPostProcessor};
pub use config::AopConfig;
pub use error::{AopError, AopResult, InvocationResult};
pub use error_info::ErrorInfo;
pub use expression::ExpressionPointcut;
pub use interceptor::{ExceptionLoggingAdvice, PerformanceMonitorInterceptor, TraceInterceptor};
pub use joinpoint::{ChainElement, MethodInvocation, ReflectiveMethodInvocation};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use object::{
    normalize_type_name, Arguments, ClassDescriptor, InterfaceDescriptor, Invocable,
    MethodDescriptor, ObjectRef, ReturnValue, ADVICE_INTERFACE, ADVISOR_INTERFACE,
    POINTCUT_INTERFACE,
};
pub use pointcut::{
    ClassFilter, ComposablePointcut, MethodMatcher, NameMatchMethodMatcher, Pointcut,
    TrueClassFilter, TrueMethodMatcher, TruePointcut,
};
pub use proxy::{AopProxyFactory, DefaultAopProxyFactory, InterfaceProxy, SubclassProxy};
pub use proxy_factory::ProxyFactory;
pub use registry::{get_global_registry, AdvisorRegistry};
pub use target::{HotSwappableTargetSource, SingletonTargetSource, TargetSource};

// 导出供宏生成代码使用的依赖
pub use anyhow;
pub use inventory;
pub use once_cell;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::*;
    pub use crate::advised::{Advised, ProxyConfig, ProxyKind};
    pub use crate::advisor::{Advisor, AdvisorRegistration, DefaultPointcutAdvisor, ExpressionPointcutAdvisor};
    pub use crate::auto_proxy::{AdvisorLookup, DefaultAdvisorAutoProxyCreator};
    pub use crate::bean_post_processor::{CreationSession, SmartInstantiationAwareBeanPostProcessor};
    pub use crate::config::AopConfig;
    pub use crate::error::{AopError, AopResult, InvocationResult};
    pub use crate::expression::ExpressionPointcut;
    pub use crate::interceptor::{ExceptionLoggingAdvice, PerformanceMonitorInterceptor, TraceInterceptor};
    pub use crate::joinpoint::MethodInvocation;
    pub use crate::object::{Arguments, ClassDescriptor, Invocable, MethodDescriptor, ObjectRef, ReturnValue};
    pub use crate::pointcut::{ClassFilter, MethodMatcher, Pointcut};
    pub use crate::proxy_factory::ProxyFactory;
    pub use crate::registry::{get_global_registry, AdvisorRegistry};
    pub use crate::target::{HotSwappableTargetSource, SingletonTargetSource, TargetSource};
    pub use crate::{arguments, utils};
    pub use std::sync::Arc;
}
