//! 连接点（JoinPoint）与方法调用
//!
//! 每次通过代理调用方法都会创建一个 [`ReflectiveMethodInvocation`]，它独占自己的
//! 游标和参数列表，调用结束即丢弃。同一个代理上的并发调用或递归调用互不影响。

use crate::advice::MethodInterceptor;
use crate::advisor::Advisor;
use crate::error::InvocationResult;
use crate::object::{Arguments, ClassDescriptor, Invocable, MethodDescriptor, ObjectRef, ReturnValue};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// 方法调用连接点
///
/// 环绕通知通过 `proceed()` 继续执行链上的下一个拦截器，链尾是目标方法本身。
pub trait MethodInvocation {
    /// 被调用的方法
    fn method(&self) -> &MethodDescriptor;

    /// 调用参数
    fn arguments(&self) -> &Arguments;

    /// 可修改的调用参数，后续拦截器和目标方法看到修改后的值
    fn arguments_mut(&mut self) -> &mut Arguments;

    /// 目标对象
    fn this(&self) -> &dyn Invocable;

    /// 目标对象的类型
    fn target_class(&self) -> &ClassDescriptor;

    /// 调用开始的时间
    fn started_at(&self) -> Instant;

    /// 继续执行拦截链
    fn proceed(&mut self) -> InvocationResult<ReturnValue>;

    /// 完整的方法签名
    fn signature(&self) -> String {
        self.method().signature()
    }
}

/// 拦截链上的一个元素
#[derive(Clone)]
pub enum ChainElement {
    /// 静态匹配已确定，每次都执行
    Static(Arc<dyn MethodInterceptor>),
    /// 需要结合运行时参数再判断一次
    Dynamic {
        interceptor: Arc<dyn MethodInterceptor>,
        advisor: Arc<dyn Advisor>,
    },
}

impl fmt::Debug for ChainElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainElement::Static(_) => f.write_str("Static"),
            ChainElement::Dynamic { advisor, .. } => write!(f, "Dynamic({})", advisor.name()),
        }
    }
}

/// 基于 [`Invocable::invoke`] 的方法调用
pub struct ReflectiveMethodInvocation<'a> {
    target: ObjectRef,
    method: &'a MethodDescriptor,
    arguments: Arguments,
    target_class: &'a ClassDescriptor,
    chain: &'a [ChainElement],
    current: usize,
    started_at: Instant,
}

impl<'a> ReflectiveMethodInvocation<'a> {
    pub fn new(
        target: ObjectRef,
        method: &'a MethodDescriptor,
        arguments: Arguments,
        target_class: &'a ClassDescriptor,
        chain: &'a [ChainElement],
    ) -> Self {
        Self {
            target,
            method,
            arguments,
            target_class,
            chain,
            current: 0,
            started_at: Instant::now(),
        }
    }

    /// 链上剩余的元素个数
    pub fn remaining(&self) -> usize {
        self.chain.len() - self.current
    }

    fn invoke_joinpoint(&self) -> InvocationResult<ReturnValue> {
        tracing::trace!("Invoking target method {}", self.method);
        self.target.invoke(self.method, &self.arguments)
    }
}

impl MethodInvocation for ReflectiveMethodInvocation<'_> {
    fn method(&self) -> &MethodDescriptor {
        self.method
    }

    fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    fn this(&self) -> &dyn Invocable {
        self.target.as_ref()
    }

    fn target_class(&self) -> &ClassDescriptor {
        self.target_class
    }

    fn started_at(&self) -> Instant {
        self.started_at
    }

    fn proceed(&mut self) -> InvocationResult<ReturnValue> {
        let start = self.current;
        let chain = self.chain;
        let mut index = start;

        let result = loop {
            let Some(element) = chain.get(index) else {
                break self.invoke_joinpoint();
            };
            index += 1;

            let interceptor = match element {
                ChainElement::Static(interceptor) => interceptor,
                ChainElement::Dynamic {
                    interceptor,
                    advisor,
                } => {
                    let matcher = advisor.pointcut().method_matcher();
                    if !matcher.matches_with_args(self.method, self.target_class, &self.arguments) {
                        tracing::trace!(
                            "Dynamic matcher of '{}' rejected {}, skipping",
                            advisor.name(),
                            self.method
                        );
                        continue;
                    }
                    interceptor
                }
            };

            self.current = index;
            tracing::trace!("Interceptor {}/{} on {}", index, chain.len(), self.method);
            break interceptor.invoke(self);
        };

        // 恢复游标：环绕通知再次 proceed 时会重新执行其后的整段链
        self.current = start;
        result
    }
}

impl fmt::Debug for ReflectiveMethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReflectiveMethodInvocation")
            .field("method", &self.method.to_string())
            .field("target_class", &self.target_class.name())
            .field("arguments", &self.arguments)
            .field("current", &self.current)
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

impl fmt::Display for ReflectiveMethodInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method.signature())
    }
}
