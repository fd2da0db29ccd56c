//! 自动代理创建器
//!
//! 作为 BeanPostProcessor 接入容器：每个 Bean 初始化完成后，查找所有 Advisor，
//! 只要有一个 Advisor 的类过滤器接受该 Bean 的类型就为其创建代理。
//!
//! ## 循环依赖
//!
//! Bean 在构造期间被提前引用时，代理在 `get_early_bean_reference` 中创建并记录到
//! [`CreationSession`]；随后同名 Bean 的初始化后处理会直接放行，
//! 容器再通过 [`CreationSession::exposed_object`] 取回提前交出的代理。
//! 因此同一个 Bean 最多被代理一次。

use crate::advisor::Advisor;
use crate::advised::ProxyConfig;
use crate::bean_post_processor::{CreationSession, SmartInstantiationAwareBeanPostProcessor};
use crate::config::AopConfig;
use crate::error::AopResult;
use crate::object::{ClassDescriptor, ObjectRef, ADVICE_INTERFACE, ADVISOR_INTERFACE, POINTCUT_INTERFACE};
use crate::proxy_factory::ProxyFactory;
use crate::utils::{find_advisors_that_can_apply, is_aop_proxy};
use std::fmt;
use std::sync::Arc;

/// 按类型查找容器中所有 Advisor
///
/// 查找失败的错误原样传播给容器。
pub trait AdvisorLookup: Send + Sync {
    fn advisors(&self) -> AopResult<Vec<Arc<dyn Advisor>>>;
}

impl<F> AdvisorLookup for F
where
    F: Fn() -> AopResult<Vec<Arc<dyn Advisor>>> + Send + Sync,
{
    fn advisors(&self) -> AopResult<Vec<Arc<dyn Advisor>>> {
        self()
    }
}

/// 是否为 AOP 基础设施类型（通知、切点、Advisor），这些类型永远不会被代理
pub fn is_infrastructure_class(class: &ClassDescriptor) -> bool {
    [&ADVICE_INTERFACE, &POINTCUT_INTERFACE, &ADVISOR_INTERFACE]
        .iter()
        .any(|marker| class.is_assignable_to(marker.name()))
}

/// 基于容器中全部 Advisor 的自动代理创建器
pub struct DefaultAdvisorAutoProxyCreator {
    lookup: Arc<dyn AdvisorLookup>,
    proxy_config: ProxyConfig,
    enabled: bool,
}

impl DefaultAdvisorAutoProxyCreator {
    pub fn new(lookup: Arc<dyn AdvisorLookup>) -> Self {
        Self {
            lookup,
            proxy_config: ProxyConfig::default(),
            enabled: true,
        }
    }

    /// 应用 AOP 配置
    pub fn with_config(mut self, config: &AopConfig) -> Self {
        self.enabled = config.enabled;
        self.proxy_config.proxy_target_class = config.proxy_target_class;
        self
    }

    pub fn set_proxy_target_class(&mut self, proxy_target_class: bool) {
        self.proxy_config.proxy_target_class = proxy_target_class;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 需要时为 Bean 创建代理，否则原样返回
    pub fn wrap_if_necessary(&self, bean: ObjectRef, bean_name: &str) -> AopResult<ObjectRef> {
        if !self.enabled {
            return Ok(bean);
        }

        if is_aop_proxy(bean.as_ref()) {
            tracing::trace!("Bean '{}' is already an AOP proxy, skipping", bean_name);
            return Ok(bean);
        }

        if is_infrastructure_class(bean.class()) {
            tracing::trace!("Bean '{}' is AOP infrastructure, skipping", bean_name);
            return Ok(bean);
        }

        let candidates = self.lookup.advisors()?;
        let applicable = find_advisors_that_can_apply(&candidates, bean.class());
        if applicable.is_empty() {
            tracing::trace!("Bean '{}' does not match any advisor, skipping", bean_name);
            return Ok(bean);
        }

        tracing::debug!(
            "Creating proxy for bean '{}' ({}) with {} advisor(s)",
            bean_name,
            bean.class().name(),
            applicable.len()
        );

        let mut factory = ProxyFactory::with_target(bean);
        factory.set_config(self.proxy_config);
        for advisor in applicable {
            factory
                .add_advisor(advisor)
                .map_err(|e| e.for_bean(bean_name))?;
        }
        factory.get_proxy().map_err(|e| e.for_bean(bean_name))
    }
}

impl SmartInstantiationAwareBeanPostProcessor for DefaultAdvisorAutoProxyCreator {
    fn post_process_after_initialization(
        &self,
        bean: ObjectRef,
        bean_name: &str,
        session: &mut CreationSession,
    ) -> AopResult<ObjectRef> {
        // 按 Bean 名判断：提前暴露过的 Bean 无论此时传入的是哪个对象都不再处理
        if session.is_early_exposed(bean_name) {
            tracing::trace!(
                "Bean '{}' was already exposed early, not proxying again",
                bean_name
            );
            return Ok(bean);
        }
        self.wrap_if_necessary(bean, bean_name)
    }

    fn get_early_bean_reference(
        &self,
        bean: ObjectRef,
        bean_name: &str,
        session: &mut CreationSession,
    ) -> AopResult<ObjectRef> {
        if let Some(exposed) = session.early_reference(bean_name) {
            return Ok(Arc::clone(exposed));
        }
        let exposed = self.wrap_if_necessary(Arc::clone(&bean), bean_name)?;
        session.record_early_reference(bean_name, bean, Arc::clone(&exposed));
        Ok(exposed)
    }

    fn name(&self) -> &str {
        "DefaultAdvisorAutoProxyCreator"
    }

    fn order(&self) -> i32 {
        // 在其他处理器之后执行，包装的是已完全初始化的 Bean
        2000
    }
}

impl fmt::Debug for DefaultAdvisorAutoProxyCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAdvisorAutoProxyCreator")
            .field("proxy_config", &self.proxy_config)
            .field("enabled", &self.enabled)
            .finish()
    }
}
