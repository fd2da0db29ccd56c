//! AOP 代理
//!
//! 两种构建策略：
//! - [`InterfaceProxy`]：实现目标的全部接口，只拦截接口方法。目标有接口时优先使用。
//! - [`SubclassProxy`]：作为目标类型的"子类"，拦截目标的所有非 final 方法后委托给目标。
//!   目标类型必须可被子类化。
//!
//! ## 限制
//!
//! 子类代理无法拦截 final 方法和构造函数：final 方法直接调用目标（创建代理时会记录
//! 一条 warn 日志），没有 `&self` 接收者的关联函数不属于对象契约。

use crate::advised::{AdvisedSupport, Advised, ProxyConfig, ProxyKind};
use crate::advisor::Advisor;
use crate::error::{AopError, AopResult, InvocationResult};
use crate::joinpoint::{MethodInvocation, ReflectiveMethodInvocation};
use crate::object::{Arguments, ClassDescriptor, Invocable, MethodDescriptor, ObjectRef, ReturnValue};
use crate::target::TargetSource;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 代理构建策略工厂
pub trait AopProxyFactory: Send + Sync {
    /// 根据配置快照创建代理
    fn create_aop_proxy(&self, config: AdvisedSupport) -> AopResult<ObjectRef>;
}

/// 默认策略：有接口且未要求子类代理时使用接口代理，否则使用子类代理
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAopProxyFactory;

impl AopProxyFactory for DefaultAopProxyFactory {
    fn create_aop_proxy(&self, config: AdvisedSupport) -> AopResult<ObjectRef> {
        let target_source = config.target_source().ok_or(AopError::NoTargetSource)?;
        let target_class = target_source.target_class();

        if !config.config().proxy_target_class && target_class.has_interfaces() {
            tracing::debug!(
                "Creating interface proxy for '{}' ({} interface(s))",
                target_class.name(),
                target_class.interfaces().len()
            );
            Ok(Arc::new(InterfaceProxy::new(config)?))
        } else {
            tracing::debug!("Creating subclass proxy for '{}'", target_class.name());
            Ok(Arc::new(SubclassProxy::new(config)?))
        }
    }
}

/// 代理共享的部分：冻结的配置快照
struct ProxyCore {
    advised: Arc<AdvisedSupport>,
    target_source: Arc<dyn TargetSource>,
}

impl ProxyCore {
    fn new(config: AdvisedSupport) -> AopResult<Self> {
        let target_source = config
            .target_source()
            .cloned()
            .ok_or(AopError::NoTargetSource)?;
        Ok(Self {
            advised: Arc::new(config),
            target_source,
        })
    }

    /// 通过拦截链调用
    fn invoke(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue> {
        let target = self.target_source.get_target()?;
        let target_class = self.target_source.target_class();
        let chain = self.advised.interceptors_for(method, target_class);

        let result = if chain.is_empty() {
            tracing::trace!("No advice for {}, invoking target directly", method);
            target.invoke(method, args)
        } else {
            let mut invocation = ReflectiveMethodInvocation::new(
                Arc::clone(&target),
                method,
                args.clone(),
                target_class,
                &chain,
            );
            invocation.proceed()
        };

        if !self.target_source.is_static() {
            self.target_source.release_target(target);
        }
        result
    }

    /// 绕过拦截链直接调用目标
    fn invoke_direct(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue> {
        let target = self.target_source.get_target()?;
        let result = target.invoke(method, args);
        if !self.target_source.is_static() {
            self.target_source.release_target(target);
        }
        result
    }
}

/// 基于接口的代理
///
/// 只能赋值给目标实现的接口，不能赋值给目标类本身。
pub struct InterfaceProxy {
    core: ProxyCore,
    class: ClassDescriptor,
}

impl InterfaceProxy {
    pub fn new(config: AdvisedSupport) -> AopResult<Self> {
        let core = ProxyCore::new(config)?;
        let target_class = core.target_source.target_class();
        let class = target_class.interfaces().iter().fold(
            ClassDescriptor::new(format!("$Proxy<{}>", target_class.name())).sealed(),
            |class, interface| class.implementing(interface),
        );
        Ok(Self { core, class })
    }

    pub(crate) fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.core.target_source
    }
}

impl Invocable for InterfaceProxy {
    fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    fn invoke(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue> {
        if !self.class.is_interface_method(method) {
            return Err(AopError::MethodNotExposed {
                class: self.core.target_source.target_class().name().to_string(),
                method: method.to_string(),
            }
            .into());
        }
        self.core.invoke(method, args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn advised(&self) -> Option<&dyn Advised> {
        (!self.core.advised.config().opaque).then_some(self as &dyn Advised)
    }
}

impl Advised for InterfaceProxy {
    fn advisors(&self) -> &[Arc<dyn Advisor>] {
        self.core.advised.advisors()
    }

    fn target_source(&self) -> &dyn TargetSource {
        self.core.target_source.as_ref()
    }

    fn proxy_config(&self) -> ProxyConfig {
        self.core.advised.config()
    }

    fn proxy_kind(&self) -> ProxyKind {
        ProxyKind::Interface
    }
}

impl fmt::Debug for InterfaceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceProxy")
            .field("class", &self.class.name())
            .field("advised", &self.core.advised)
            .finish()
    }
}

/// 基于子类的代理
///
/// 可以赋值给目标类及其接口；拦截后委托给目标（相当于调用父类实现）。
pub struct SubclassProxy {
    core: ProxyCore,
    class: ClassDescriptor,
}

impl SubclassProxy {
    pub fn new(config: AdvisedSupport) -> AopResult<Self> {
        let core = ProxyCore::new(config)?;
        let target_class = core.target_source.target_class();

        if !target_class.is_subclassable() {
            return Err(AopError::NotSubclassable {
                class: target_class.name().to_string(),
                reason: "type is sealed".to_string(),
            });
        }

        for method in target_class.all_methods().into_iter().filter(|m| m.is_final()) {
            tracing::warn!(
                "Method {} is final and will not be intercepted by the subclass proxy of '{}'",
                method,
                target_class.name()
            );
        }

        let class = target_class.interfaces().iter().fold(
            ClassDescriptor::new(format!("{}$$ChimeraSubclass", target_class.name()))
                .with_superclass(target_class.name())
                .sealed(),
            |class, interface| class.implementing(interface),
        );
        let class = target_class
            .methods()
            .iter()
            .fold(class, |class, method| class.with_method(method));

        Ok(Self { core, class })
    }

    pub(crate) fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.core.target_source
    }

    fn is_final(&self, method: &MethodDescriptor) -> bool {
        method.is_final()
            || self
                .class
                .methods()
                .iter()
                .any(|m| m.same_as(method) && m.is_final())
    }
}

impl Invocable for SubclassProxy {
    fn class(&self) -> &ClassDescriptor {
        &self.class
    }

    fn invoke(&self, method: &MethodDescriptor, args: &Arguments) -> InvocationResult<ReturnValue> {
        if self.is_final(method) {
            return self.core.invoke_direct(method, args);
        }
        self.core.invoke(method, args)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn advised(&self) -> Option<&dyn Advised> {
        (!self.core.advised.config().opaque).then_some(self as &dyn Advised)
    }
}

impl Advised for SubclassProxy {
    fn advisors(&self) -> &[Arc<dyn Advisor>] {
        self.core.advised.advisors()
    }

    fn target_source(&self) -> &dyn TargetSource {
        self.core.target_source.as_ref()
    }

    fn proxy_config(&self) -> ProxyConfig {
        self.core.advised.config()
    }

    fn proxy_kind(&self) -> ProxyKind {
        ProxyKind::Subclass
    }
}

impl fmt::Debug for SubclassProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubclassProxy")
            .field("class", &self.class.name())
            .field("advised", &self.core.advised)
            .finish()
    }
}
