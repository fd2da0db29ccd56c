//! 通知（Advice）定义
//!
//! 通知是一个封闭的枚举 [`Advice`]，每种变体参与拦截链的方式是固定的：
//!
//! | 变体 | 执行时机 |
//! |---|---|
//! | `Around` | 包裹链的剩余部分，必须显式 `proceed()` |
//! | `Before` | 先执行，失败则中止整条链 |
//! | `AfterReturning` | 目标方法成功返回后执行 |
//! | `AfterThrowing` | 链上抛出错误后执行，错误原样继续传播 |
//! | `After` | 无论成功还是失败都执行 |
//!
//! 所有变体都通过 [`Advice::to_interceptor`] 适配为 [`MethodInterceptor`]。

use crate::error::InvocationResult;
use crate::joinpoint::MethodInvocation;
use crate::object::{Arguments, Invocable, MethodDescriptor, ReturnValue};
use std::fmt;
use std::sync::Arc;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 后置通知（无论成功还是失败都执行）
    After,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（抛出异常时执行）
    AfterThrowing,
    /// 环绕通知（可以控制方法执行）
    Around,
}

/// 环绕通知 / 方法拦截器
///
/// 可以完全控制目标方法的执行：不调用 `proceed()` 则链的剩余部分和目标方法都不会执行。
pub trait MethodInterceptor: Send + Sync {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue>;
}

/// 前置通知
pub trait MethodBeforeAdvice: Send + Sync {
    /// 返回错误会中止调用，错误原样交给调用方
    fn before(
        &self,
        method: &MethodDescriptor,
        args: &Arguments,
        target: &dyn Invocable,
    ) -> InvocationResult<()>;
}

/// 返回后通知
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(
        &self,
        return_value: &ReturnValue,
        method: &MethodDescriptor,
        args: &Arguments,
        target: &dyn Invocable,
    ) -> InvocationResult<()>;
}

/// 异常通知
///
/// 只观察错误，不能替换或吞掉它。
pub trait ThrowsAdvice: Send + Sync {
    fn after_throwing(
        &self,
        method: &MethodDescriptor,
        args: &Arguments,
        target: &dyn Invocable,
        error: &anyhow::Error,
    );
}

/// 后置通知（finally 语义）
pub trait AfterAdvice: Send + Sync {
    fn after(&self, method: &MethodDescriptor, args: &Arguments, target: &dyn Invocable);
}

/// 通知
#[derive(Clone)]
pub enum Advice {
    Around(Arc<dyn MethodInterceptor>),
    Before(Arc<dyn MethodBeforeAdvice>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn ThrowsAdvice>),
    After(Arc<dyn AfterAdvice>),
}

impl Advice {
    pub fn around(interceptor: impl MethodInterceptor + 'static) -> Self {
        Advice::Around(Arc::new(interceptor))
    }

    pub fn before(advice: impl MethodBeforeAdvice + 'static) -> Self {
        Advice::Before(Arc::new(advice))
    }

    pub fn after_returning(advice: impl AfterReturningAdvice + 'static) -> Self {
        Advice::AfterReturning(Arc::new(advice))
    }

    pub fn after_throwing(advice: impl ThrowsAdvice + 'static) -> Self {
        Advice::AfterThrowing(Arc::new(advice))
    }

    pub fn after(advice: impl AfterAdvice + 'static) -> Self {
        Advice::After(Arc::new(advice))
    }

    /// 用闭包创建环绕通知
    pub fn around_fn<F>(f: F) -> Self
    where
        F: Fn(&mut dyn MethodInvocation) -> InvocationResult<ReturnValue> + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(FnAdvice(f)))
    }

    /// 用闭包创建前置通知
    pub fn before_fn<F>(f: F) -> Self
    where
        F: Fn(&MethodDescriptor, &Arguments, &dyn Invocable) -> InvocationResult<()>
            + Send
            + Sync
            + 'static,
    {
        Advice::Before(Arc::new(FnAdvice(f)))
    }

    /// 用闭包创建后置通知
    pub fn after_fn<F>(f: F) -> Self
    where
        F: Fn(&MethodDescriptor, &Arguments, &dyn Invocable) + Send + Sync + 'static,
    {
        Advice::After(Arc::new(FnAdvice(f)))
    }

    pub fn advice_type(&self) -> AdviceType {
        match self {
            Advice::Around(_) => AdviceType::Around,
            Advice::Before(_) => AdviceType::Before,
            Advice::AfterReturning(_) => AdviceType::AfterReturning,
            Advice::AfterThrowing(_) => AdviceType::AfterThrowing,
            Advice::After(_) => AdviceType::After,
        }
    }

    /// 适配为拦截器
    pub fn to_interceptor(&self) -> Arc<dyn MethodInterceptor> {
        match self {
            Advice::Around(interceptor) => Arc::clone(interceptor),
            Advice::Before(advice) => Arc::new(BeforeAdviceInterceptor(Arc::clone(advice))),
            Advice::AfterReturning(advice) => {
                Arc::new(AfterReturningAdviceInterceptor(Arc::clone(advice)))
            }
            Advice::AfterThrowing(advice) => Arc::new(ThrowsAdviceInterceptor(Arc::clone(advice))),
            Advice::After(advice) => Arc::new(AfterAdviceInterceptor(Arc::clone(advice))),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{:?}", self.advice_type())
    }
}

struct BeforeAdviceInterceptor(Arc<dyn MethodBeforeAdvice>);

impl MethodInterceptor for BeforeAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        self.0
            .before(invocation.method(), invocation.arguments(), invocation.this())?;
        invocation.proceed()
    }
}

struct AfterReturningAdviceInterceptor(Arc<dyn AfterReturningAdvice>);

impl MethodInterceptor for AfterReturningAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        let return_value = invocation.proceed()?;
        self.0.after_returning(
            &return_value,
            invocation.method(),
            invocation.arguments(),
            invocation.this(),
        )?;
        Ok(return_value)
    }
}

struct ThrowsAdviceInterceptor(Arc<dyn ThrowsAdvice>);

impl MethodInterceptor for ThrowsAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        invocation.proceed().inspect_err(|error| {
            self.0.after_throwing(
                invocation.method(),
                invocation.arguments(),
                invocation.this(),
                error,
            );
        })
    }
}

struct AfterAdviceInterceptor(Arc<dyn AfterAdvice>);

impl MethodInterceptor for AfterAdviceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        let result = invocation.proceed();
        self.0
            .after(invocation.method(), invocation.arguments(), invocation.this());
        result
    }
}

/// 闭包通知
struct FnAdvice<F>(F);

impl<F> MethodInterceptor for FnAdvice<F>
where
    F: Fn(&mut dyn MethodInvocation) -> InvocationResult<ReturnValue> + Send + Sync,
{
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        (self.0)(invocation)
    }
}

impl<F> MethodBeforeAdvice for FnAdvice<F>
where
    F: Fn(&MethodDescriptor, &Arguments, &dyn Invocable) -> InvocationResult<()> + Send + Sync,
{
    fn before(
        &self,
        method: &MethodDescriptor,
        args: &Arguments,
        target: &dyn Invocable,
    ) -> InvocationResult<()> {
        (self.0)(method, args, target)
    }
}

impl<F> AfterAdvice for FnAdvice<F>
where
    F: Fn(&MethodDescriptor, &Arguments, &dyn Invocable) + Send + Sync,
{
    fn after(&self, method: &MethodDescriptor, args: &Arguments, target: &dyn Invocable) {
        (self.0)(method, args, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joinpoint::{ChainElement, ReflectiveMethodInvocation};
    use crate::object::ObjectRef;
    use crate::testing::*;
    use parking_lot::Mutex;

    /// 记录通知被调用的情况
    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<String>>>);

    impl Events {
        fn push(&self, event: String) {
            self.0.lock().push(event);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl AfterReturningAdvice for Events {
        fn after_returning(
            &self,
            return_value: &ReturnValue,
            method: &MethodDescriptor,
            _args: &Arguments,
            _target: &dyn Invocable,
        ) -> InvocationResult<()> {
            self.push(format!("returned {} = {:?}", method.name(), return_value.downcast_ref::<i32>()));
            Ok(())
        }
    }

    impl ThrowsAdvice for Events {
        fn after_throwing(
            &self,
            method: &MethodDescriptor,
            _args: &Arguments,
            _target: &dyn Invocable,
            error: &anyhow::Error,
        ) {
            self.push(format!("threw {}: {}", method.name(), error));
        }
    }

    impl AfterAdvice for Events {
        fn after(&self, method: &MethodDescriptor, _args: &Arguments, _target: &dyn Invocable) {
            self.push(format!("after {}", method.name()));
        }
    }

    fn run(
        advice: &Advice,
        target: &Arc<CalculatorImpl>,
        method: &MethodDescriptor,
        a: i32,
        b: i32,
    ) -> InvocationResult<ReturnValue> {
        let chain = vec![ChainElement::Static(advice.to_interceptor())];
        let target: ObjectRef = Arc::clone(target) as ObjectRef;
        let mut invocation = ReflectiveMethodInvocation::new(
            target,
            method,
            crate::arguments![a, b],
            &CALCULATOR_CLASS,
            &chain,
        );
        invocation.proceed()
    }

    #[test]
    fn test_after_returning_runs_only_on_success() {
        let events = Events::default();
        let advice = Advice::after_returning(events.clone());
        let target = Arc::new(CalculatorImpl::new());

        assert_eq!(run(&advice, &target, &ADD, 6, 3).unwrap().downcast::<i32>().unwrap(), 9);
        assert!(run(&advice, &target, &DIVIDE, 1, 0).is_err());
        assert_eq!(events.take(), vec!["returned add = Some(9)"]);
    }

    #[test]
    fn test_throws_advice_observes_error_unchanged() {
        let events = Events::default();
        let advice = Advice::after_throwing(events.clone());
        let target = Arc::new(CalculatorImpl::new());

        run(&advice, &target, &ADD, 1, 1).unwrap();
        let err = run(&advice, &target, &DIVIDE, 1, 0).unwrap_err();
        assert!(err.downcast_ref::<DivisionByZero>().is_some());
        assert_eq!(events.take(), vec!["threw divide: division by zero"]);
    }

    #[test]
    fn test_after_advice_runs_on_success_and_failure() {
        let events = Events::default();
        let advice = Advice::after(events.clone());
        let target = Arc::new(CalculatorImpl::new());

        run(&advice, &target, &ADD, 1, 1).unwrap();
        run(&advice, &target, &DIVIDE, 1, 0).unwrap_err();
        assert_eq!(events.take(), vec!["after add", "after divide"]);
    }

    #[test]
    fn test_before_failure_aborts_the_call() {
        let advice = Advice::before_fn(|_, _, _| Err(anyhow::anyhow!("denied")));
        let target = Arc::new(CalculatorImpl::new());

        let err = run(&advice, &target, &ADD, 1, 2).unwrap_err();
        assert_eq!(err.to_string(), "denied");
        assert_eq!(target.calls(), 0);
    }

    #[test]
    fn test_around_without_proceed_short_circuits() {
        let advice = Advice::around_fn(|_| Ok(ReturnValue::new(42i32)));
        let target = Arc::new(CalculatorImpl::new());

        let value = run(&advice, &target, &ADD, 1, 2).unwrap();
        assert_eq!(value.downcast::<i32>().unwrap(), 42);
        assert_eq!(target.calls(), 0);
    }

    #[test]
    fn test_advice_type() {
        assert_eq!(Advice::around_fn(|inv| inv.proceed()).advice_type(), AdviceType::Around);
        assert_eq!(Advice::before_fn(|_, _, _| Ok(())).advice_type(), AdviceType::Before);
        assert_eq!(Advice::after_fn(|_, _, _| {}).advice_type(), AdviceType::After);
        assert_eq!(
            Advice::after_throwing(Events::default()).advice_type(),
            AdviceType::AfterThrowing
        );
    }
}
