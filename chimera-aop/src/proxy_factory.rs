//! 代理工厂
//!
//! 编程式创建代理的入口：
//!
//! ```ignore
//! let mut factory = ProxyFactory::with_target(Arc::new(CalculatorImpl::default()));
//! factory.add_advisor(Arc::new(ExpressionPointcutAdvisor::new(
//!     "logAdvisor",
//!     "execution(* com.example.Calculator.*(..))",
//!     Advice::before_fn(|method, _, _| {
//!         tracing::info!("calling {}", method);
//!         Ok(())
//!     }),
//! )?))?;
//! let proxy = factory.get_proxy()?;
//! ```

use crate::advice::Advice;
use crate::advised::{AdvisedSupport, ProxyConfig};
use crate::advisor::{Advisor, DefaultPointcutAdvisor};
use crate::error::{AopError, AopResult};
use crate::object::ObjectRef;
use crate::pointcut::MethodMatcher;
use crate::proxy::{AopProxyFactory, DefaultAopProxyFactory};
use crate::target::{SingletonTargetSource, TargetSource};
use std::fmt;
use std::sync::Arc;

/// 代理工厂
pub struct ProxyFactory {
    advised: AdvisedSupport,
    aop_proxy_factory: Arc<dyn AopProxyFactory>,
}

impl ProxyFactory {
    pub fn new() -> Self {
        Self {
            advised: AdvisedSupport::new(),
            aop_proxy_factory: Arc::new(DefaultAopProxyFactory),
        }
    }

    /// 以单例目标创建工厂
    pub fn with_target(target: ObjectRef) -> Self {
        let mut factory = Self::new();
        factory.set_target(target);
        factory
    }

    pub fn set_target(&mut self, target: ObjectRef) {
        self.set_target_source(Arc::new(SingletonTargetSource::new(target)));
    }

    pub fn set_target_source(&mut self, target_source: Arc<dyn TargetSource>) {
        self.advised.set_target_source(target_source);
    }

    /// 追加 Advisor，执行顺序与添加顺序一致
    pub fn add_advisor(&mut self, advisor: Arc<dyn Advisor>) -> AopResult<()> {
        self.advised.add_advisor(advisor)
    }

    /// 追加作用于所有方法的通知
    pub fn add_advice(&mut self, advice: Advice) -> AopResult<()> {
        let name = format!("advice#{}", self.advised.advisors().len());
        self.add_advisor(Arc::new(DefaultPointcutAdvisor::for_advice(name, advice)))
    }

    pub fn set_method_matcher(&mut self, matcher: Arc<dyn MethodMatcher>) {
        self.advised.set_method_matcher(matcher);
    }

    pub fn set_proxy_target_class(&mut self, proxy_target_class: bool) {
        self.advised.set_proxy_target_class(proxy_target_class);
    }

    pub fn set_opaque(&mut self, opaque: bool) {
        self.advised.set_opaque(opaque);
    }

    pub fn set_config(&mut self, config: ProxyConfig) {
        self.advised.set_config(config);
    }

    /// 替换代理构建策略
    pub fn set_aop_proxy_factory(&mut self, aop_proxy_factory: Arc<dyn AopProxyFactory>) {
        self.aop_proxy_factory = aop_proxy_factory;
    }

    pub fn advisors(&self) -> &[Arc<dyn Advisor>] {
        self.advised.advisors()
    }

    pub fn advised(&self) -> &AdvisedSupport {
        &self.advised
    }

    /// 创建代理
    ///
    /// 没有任何 Advisor 的类过滤器接受目标类型时返回原目标本身。
    pub fn get_proxy(&self) -> AopResult<ObjectRef> {
        let target_source = self
            .advised
            .target_source()
            .ok_or(AopError::NoTargetSource)?;
        let target_class = target_source.target_class();

        let mut snapshot = self.advised.clone();
        snapshot.retain_advisors(|advisor| advisor.pointcut().matches_class(target_class));

        if snapshot.advisors().is_empty() {
            tracing::debug!(
                "No advisor applies to '{}', returning target unchanged",
                target_class.name()
            );
            return target_source.get_target().map_err(AopError::Lookup);
        }

        tracing::debug!(
            "Proxying '{}' with advisors {:?}",
            target_class.name(),
            snapshot.advisors().iter().map(|a| a.name()).collect::<Vec<_>>()
        );
        self.aop_proxy_factory.create_aop_proxy(snapshot)
    }
}

impl Default for ProxyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("advised", &self.advised)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{MethodBeforeAdvice, MethodInterceptor, ThrowsAdvice};
    use crate::advised::ProxyKind;
    use crate::advisor::ExpressionPointcutAdvisor;
    use crate::error::InvocationResult;
    use crate::joinpoint::MethodInvocation;
    use crate::object::{Arguments, ClassDescriptor, Invocable, MethodDescriptor, ReturnValue};
    use crate::pointcut::{ComposablePointcut, NameMatchMethodMatcher, TrueClassFilter};
    use crate::target::HotSwappableTargetSource;
    use crate::testing::*;
    use once_cell::sync::OnceCell;
    use parking_lot::Mutex;
    use std::sync::Weak;
    use std::thread;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording_before(log: &Log, label: &'static str) -> Advice {
        let log = Arc::clone(log);
        Advice::before_fn(move |method, _, _| {
            log.lock().push(format!("{} {}", label, method.name()));
            Ok(())
        })
    }

    fn expression_advisor(name: &str, expression: &str, advice: Advice) -> Arc<dyn Advisor> {
        Arc::new(ExpressionPointcutAdvisor::new(name, expression, advice).unwrap())
    }

    #[derive(Debug, thiserror::Error)]
    #[error("access denied")]
    struct AccessDenied;

    struct DenyAll;

    impl MethodBeforeAdvice for DenyAll {
        fn before(
            &self,
            _method: &MethodDescriptor,
            _args: &Arguments,
            _target: &dyn Invocable,
        ) -> InvocationResult<()> {
            Err(AccessDenied.into())
        }
    }

    #[test]
    fn test_logging_before_advice_on_calculator() {
        let log: Log = Arc::default();
        let target = Arc::new(CalculatorImpl::new());
        let mut factory = ProxyFactory::with_target(target.clone());
        factory
            .add_advisor(expression_advisor(
                "logAdvisor",
                "execution(* com.example.Calculator.*(..))",
                recording_before(&log, "log"),
            ))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();

        assert_eq!(add(&proxy, 2, 3).unwrap(), 5);
        assert_eq!(*log.lock(), vec!["log add".to_string()]);
        assert_eq!(target.calls(), 1);
    }

    #[test]
    fn test_interface_proxy_is_assignable_to_interfaces_only() {
        let mut factory = ProxyFactory::with_target(calculator());
        factory
            .add_advice(Advice::before_fn(|_, _, _| Ok(())))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();

        assert!(proxy.is_instance_of("com.example.Calculator"));
        assert!(!proxy.is_instance_of("com.example.CalculatorImpl"));
        assert_eq!(proxy.advised().unwrap().proxy_kind(), ProxyKind::Interface);

        let err = proxy.invoke(&RESET, &Arguments::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AopError>(),
            Some(AopError::MethodNotExposed { .. })
        ));
    }

    #[test]
    fn test_advice_runs_in_order_and_failure_stops_chain() {
        let log: Log = Arc::default();
        let target = Arc::new(CalculatorImpl::new());
        let mut factory = ProxyFactory::with_target(target.clone());
        factory
            .add_advisor(expression_advisor(
                "timing",
                "execution(* com.example.Calculator.*(..))",
                recording_before(&log, "timing"),
            ))
            .unwrap();
        factory
            .add_advisor(expression_advisor(
                "auth",
                "execution(* com.example.Calculator.*(..))",
                Advice::before(DenyAll),
            ))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        let err = add(&proxy, 2, 3).unwrap_err();

        assert!(err.downcast_ref::<AccessDenied>().is_some());
        assert_eq!(*log.lock(), vec!["timing add".to_string()]);
        assert_eq!(target.calls(), 0);
    }

    #[test]
    fn test_no_matching_advisor_returns_target_itself() {
        let target = calculator();
        let mut factory = ProxyFactory::with_target(Arc::clone(&target));
        factory
            .add_advisor(expression_advisor(
                "other",
                "execution(* com.other..*.*(..))",
                Advice::before_fn(|_, _, _| Ok(())),
            ))
            .unwrap();

        let result = factory.get_proxy().unwrap();
        assert!(Arc::ptr_eq(&result, &target));
        assert!(result.advised().is_none());
    }

    #[test]
    fn test_missing_target_source() {
        let factory = ProxyFactory::new();
        assert!(matches!(factory.get_proxy(), Err(AopError::NoTargetSource)));
    }

    #[test]
    fn test_subclass_proxy_for_class_without_interfaces() {
        let log: Log = Arc::default();
        let mut factory = ProxyFactory::with_target(Arc::new(Greeter::default()));
        factory.add_advice(recording_before(&log, "greet")).unwrap();

        let proxy = factory.get_proxy().unwrap();

        assert!(proxy.is_instance_of("com.example.Greeter"));
        assert_eq!(proxy.class().name(), "com.example.Greeter$$ChimeraSubclass");
        let value = proxy
            .call("greet", &Arguments::new().with("Ada".to_string()))
            .unwrap()
            .downcast::<String>()
            .unwrap();
        assert_eq!(value, "Hello, Ada!");
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_subclass_proxy_forced_for_interface_target() {
        let log: Log = Arc::default();
        let mut factory = ProxyFactory::with_target(calculator());
        factory.set_proxy_target_class(true);
        factory.add_advice(recording_before(&log, "call")).unwrap();

        let proxy = factory.get_proxy().unwrap();

        assert!(proxy.is_instance_of("com.example.CalculatorImpl"));
        assert!(proxy.is_instance_of("com.example.Calculator"));
        assert_eq!(proxy.advised().unwrap().proxy_kind(), ProxyKind::Subclass);

        // final 方法不经过通知
        proxy.invoke(&RESET, &Arguments::new()).unwrap();
        assert!(log.lock().is_empty());

        assert_eq!(add(&proxy, 1, 1).unwrap(), 2);
        assert_eq!(*log.lock(), vec!["call add".to_string()]);
    }

    #[test]
    fn test_sealed_class_cannot_be_subclassed() {
        let mut factory = ProxyFactory::with_target(Arc::new(Greeter::sealed()));
        factory.add_advice(Advice::before_fn(|_, _, _| Ok(()))).unwrap();

        let err = factory.get_proxy().unwrap_err();
        assert!(matches!(err, AopError::NotSubclassable { ref class, .. } if class == "com.example.SealedGreeter"));
    }

    #[test]
    fn test_global_method_matcher_limits_interception() {
        let log: Log = Arc::default();
        let mut factory = ProxyFactory::with_target(calculator());
        factory.add_advice(recording_before(&log, "log")).unwrap();
        factory.set_method_matcher(Arc::new(NameMatchMethodMatcher::new(vec!["div*"])));

        let proxy = factory.get_proxy().unwrap();
        add(&proxy, 1, 2).unwrap();
        proxy
            .invoke(&DIVIDE, &Arguments::new().with(6).with(3))
            .unwrap();

        assert_eq!(*log.lock(), vec!["log divide".to_string()]);
    }

    #[test]
    fn test_proxy_is_unaffected_by_later_factory_changes() {
        let log: Log = Arc::default();
        let mut factory = ProxyFactory::with_target(calculator());
        factory.add_advice(recording_before(&log, "first")).unwrap();
        let proxy = factory.get_proxy().unwrap();

        factory.add_advice(recording_before(&log, "second")).unwrap();
        add(&proxy, 1, 2).unwrap();

        assert_eq!(*log.lock(), vec!["first add".to_string()]);
        assert_eq!(proxy.advised().unwrap().advisors().len(), 1);
    }

    #[test]
    fn test_duplicate_advisor_name_rejected() {
        let mut factory = ProxyFactory::with_target(calculator());
        factory
            .add_advisor(Arc::new(DefaultPointcutAdvisor::for_advice(
                "same",
                Advice::before_fn(|_, _, _| Ok(())),
            )))
            .unwrap();
        let err = factory
            .add_advisor(Arc::new(DefaultPointcutAdvisor::for_advice(
                "same",
                Advice::after_fn(|_, _, _| {}),
            )))
            .unwrap_err();
        assert!(matches!(err, AopError::DuplicateAdvisor(name) if name == "same"));
    }

    #[test]
    fn test_opaque_proxy_hides_configuration() {
        let mut factory = ProxyFactory::with_target(calculator());
        factory.add_advice(Advice::before_fn(|_, _, _| Ok(()))).unwrap();
        factory.set_opaque(true);

        let proxy = factory.get_proxy().unwrap();
        assert!(proxy.advised().is_none());
        assert_eq!(add(&proxy, 2, 2).unwrap(), 4);
    }

    struct Doubling;

    impl MethodInterceptor for Doubling {
        fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
            let a: i32 = invocation.arguments().extract(invocation.method(), 0)?;
            invocation.arguments_mut().set(0, a * 2)?;
            invocation.proceed()
        }
    }

    #[test]
    fn test_around_advice_rewrites_arguments() {
        let mut factory = ProxyFactory::with_target(calculator());
        factory.add_advice(Advice::around(Doubling)).unwrap();

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(add(&proxy, 5, 1).unwrap(), 11);
    }

    struct PositiveFirstArgument;

    impl MethodMatcher for PositiveFirstArgument {
        fn matches(&self, _method: &MethodDescriptor, _class: &ClassDescriptor) -> bool {
            true
        }

        fn is_runtime(&self) -> bool {
            true
        }

        fn matches_with_args(
            &self,
            _method: &MethodDescriptor,
            _class: &ClassDescriptor,
            args: &Arguments,
        ) -> bool {
            args.get::<i32>(0).is_some_and(|a| *a > 0)
        }
    }

    #[test]
    fn test_runtime_matcher_checks_each_call() {
        let log: Log = Arc::default();
        let pointcut = ComposablePointcut::with(
            Arc::new(TrueClassFilter),
            Arc::new(PositiveFirstArgument),
        );
        let mut factory = ProxyFactory::with_target(calculator());
        factory
            .add_advisor(Arc::new(DefaultPointcutAdvisor::new(
                "positiveOnly",
                Arc::new(pointcut),
                recording_before(&log, "positive"),
            )))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(add(&proxy, -1, 5).unwrap(), 4);
        assert!(log.lock().is_empty());
        assert_eq!(add(&proxy, 1, 5).unwrap(), 6);
        assert_eq!(*log.lock(), vec!["positive add".to_string()]);
    }

    #[test]
    fn test_around_advice_can_proceed_again() {
        let log: Log = Arc::default();
        let target = Arc::new(CalculatorImpl::new());
        let mut factory = ProxyFactory::with_target(target.clone());
        factory
            .add_advice(Advice::around_fn(|invocation| {
                let _ = invocation.proceed()?;
                invocation.proceed()
            }))
            .unwrap();
        factory.add_advice(recording_before(&log, "inner")).unwrap();

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(add(&proxy, 2, 2).unwrap(), 4);

        // 第二次 proceed 重新执行其后的整段链
        assert_eq!(log.lock().len(), 2);
        assert_eq!(target.calls(), 2);
    }

    struct RecordThrows(Log);

    impl ThrowsAdvice for RecordThrows {
        fn after_throwing(
            &self,
            method: &MethodDescriptor,
            _args: &Arguments,
            _target: &dyn Invocable,
            error: &anyhow::Error,
        ) {
            self.0.lock().push(format!("{}: {}", method.name(), error));
        }
    }

    #[test]
    fn test_after_throwing_observes_target_error() {
        let seen: Log = Arc::default();
        let mut factory = ProxyFactory::with_target(calculator());
        factory
            .add_advice(Advice::after_throwing(RecordThrows(Arc::clone(&seen))))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(add(&proxy, 1, 2).unwrap(), 3);
        assert!(seen.lock().is_empty());

        let err = proxy
            .invoke(&DIVIDE, &Arguments::new().with(1).with(0))
            .unwrap_err();

        // 错误原样返回给调用方
        assert!(err.downcast_ref::<DivisionByZero>().is_some());
        assert_eq!(*seen.lock(), vec!["divide: division by zero".to_string()]);
    }

    #[test]
    fn test_hot_swappable_target() {
        let swappable = Arc::new(HotSwappableTargetSource::new(calculator()));
        let mut factory = ProxyFactory::new();
        factory.set_target_source(swappable.clone());
        factory.add_advice(Advice::before_fn(|_, _, _| Ok(()))).unwrap();

        let proxy = factory.get_proxy().unwrap();
        assert_eq!(add(&proxy, 1, 1).unwrap(), 2);

        swappable
            .swap(Arc::new(CalculatorImpl::with_offset(100)))
            .unwrap();
        assert_eq!(add(&proxy, 1, 1).unwrap(), 102);

        let err = swappable.swap(Arc::new(Greeter::default())).unwrap_err();
        assert!(matches!(err, AopError::IncompatibleTarget { .. }));
    }

    #[test]
    fn test_concurrent_and_reentrant_invocations() {
        let target = Arc::new(CalculatorImpl::new());
        let mut factory = ProxyFactory::with_target(target.clone());
        factory
            .add_advice(Advice::around_fn(|invocation| invocation.proceed()))
            .unwrap();
        let proxy = factory.get_proxy().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let proxy = Arc::clone(&proxy);
                thread::spawn(move || {
                    (0..50)
                        .map(|j| add(&proxy, i, j).unwrap() == i + j)
                        .all(|ok| ok)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(target.calls(), 400);

        // 通知内部再次调用同一个代理
        let inner = Arc::clone(&proxy);
        let mut factory = ProxyFactory::with_target(calculator());
        factory
            .add_advice(Advice::around_fn(move |invocation| {
                let nested = add(&inner, 10, 10)?;
                let own = invocation.proceed()?.downcast::<i32>()?;
                Ok(ReturnValue::new(own + nested))
            }))
            .unwrap();
        let outer = factory.get_proxy().unwrap();
        assert_eq!(add(&outer, 1, 2).unwrap(), 23);
    }

    #[test]
    fn test_reentrant_call_into_same_proxy() {
        let log: Log = Arc::default();
        let own_proxy: Arc<OnceCell<Weak<dyn Invocable>>> = Arc::default();
        let target = Arc::new(CalculatorImpl::new());

        let mut factory = ProxyFactory::with_target(target.clone());
        factory.add_advice(recording_before(&log, "before")).unwrap();
        let around_log = Arc::clone(&log);
        let around_proxy = Arc::clone(&own_proxy);
        factory
            .add_advice(Advice::around_fn(move |invocation| {
                let a = *invocation.arguments().get::<i32>(0).unwrap_or(&0);
                around_log.lock().push(format!("enter {}", a));

                // 只在最外层回调一次，避免无限递归
                let nested = if a > 0 {
                    let proxy = around_proxy
                        .get()
                        .and_then(Weak::upgrade)
                        .ok_or_else(|| anyhow::anyhow!("proxy dropped"))?;
                    add(&proxy, 0, 5)?
                } else {
                    0
                };

                let own = invocation.proceed()?.downcast::<i32>()?;
                around_log.lock().push(format!("exit {}", a));
                Ok(ReturnValue::new(own + nested))
            }))
            .unwrap();

        let proxy = factory.get_proxy().unwrap();
        assert!(own_proxy.set(Arc::downgrade(&proxy)).is_ok());

        assert_eq!(add(&proxy, 1, 2).unwrap(), 8);
        assert_eq!(
            *log.lock(),
            vec!["before add", "enter 1", "before add", "enter 0", "exit 0", "exit 1"]
        );
        assert_eq!(target.calls(), 2);
    }
}
