//! 代理配置
//!
//! [`AdvisedSupport`] 是构建期的可变配置；代理创建时会拿走它的一份快照，
//! 之后对工厂的修改不会影响已创建的代理。

use crate::advisor::Advisor;
use crate::error::{AopError, AopResult};
use crate::joinpoint::ChainElement;
use crate::object::{ClassDescriptor, MethodDescriptor};
use crate::pointcut::MethodMatcher;
use crate::target::TargetSource;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// 代理策略相关的开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// 即使目标实现了接口也使用子类代理
    pub proxy_target_class: bool,

    /// 代理不对外暴露 [`Advised`] 视图
    pub opaque: bool,
}

/// 代理的构建方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// 实现目标的接口并委托
    Interface,
    /// 目标类型的"子类"
    Subclass,
}

/// 代理配置的只读视图
pub trait Advised: Send + Sync {
    fn advisors(&self) -> &[Arc<dyn Advisor>];

    fn target_source(&self) -> &dyn TargetSource;

    fn proxy_config(&self) -> ProxyConfig;

    fn proxy_kind(&self) -> ProxyKind;
}

/// 拦截链工厂
///
/// 针对一次调用的方法和目标类型，计算需要执行的拦截器。
pub trait AdvisorChainFactory: Send + Sync {
    fn interceptors_and_dynamic_advice(
        &self,
        config: &AdvisedSupport,
        method: &MethodDescriptor,
        target_class: &ClassDescriptor,
    ) -> Vec<ChainElement>;
}

/// 默认拦截链工厂：按 Advisor 注册顺序逐个匹配
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdvisorChainFactory;

impl AdvisorChainFactory for DefaultAdvisorChainFactory {
    fn interceptors_and_dynamic_advice(
        &self,
        config: &AdvisedSupport,
        method: &MethodDescriptor,
        target_class: &ClassDescriptor,
    ) -> Vec<ChainElement> {
        if let Some(matcher) = config.method_matcher() {
            if !matcher.matches(method, target_class) {
                return Vec::new();
            }
        }

        config
            .advisors()
            .iter()
            .filter(|advisor| advisor.pointcut().matches_method(method, target_class))
            .map(|advisor| {
                let interceptor = advisor.advice().to_interceptor();
                if advisor.pointcut().method_matcher().is_runtime() {
                    ChainElement::Dynamic {
                        interceptor,
                        advisor: Arc::clone(advisor),
                    }
                } else {
                    ChainElement::Static(interceptor)
                }
            })
            .collect()
    }
}

/// 构建期代理配置
#[derive(Clone)]
pub struct AdvisedSupport {
    config: ProxyConfig,
    target_source: Option<Arc<dyn TargetSource>>,
    advisors: Vec<Arc<dyn Advisor>>,
    method_matcher: Option<Arc<dyn MethodMatcher>>,
    chain_factory: Arc<dyn AdvisorChainFactory>,
}

impl AdvisedSupport {
    pub fn new() -> Self {
        Self {
            config: ProxyConfig::default(),
            target_source: None,
            advisors: Vec::new(),
            method_matcher: None,
            chain_factory: Arc::new(DefaultAdvisorChainFactory),
        }
    }

    pub fn config(&self) -> ProxyConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ProxyConfig) {
        self.config = config;
    }

    pub fn set_proxy_target_class(&mut self, proxy_target_class: bool) {
        self.config.proxy_target_class = proxy_target_class;
    }

    pub fn set_opaque(&mut self, opaque: bool) {
        self.config.opaque = opaque;
    }

    pub fn set_target_source(&mut self, target_source: Arc<dyn TargetSource>) {
        self.target_source = Some(target_source);
    }

    pub fn target_source(&self) -> Option<&Arc<dyn TargetSource>> {
        self.target_source.as_ref()
    }

    /// 追加 Advisor，名称必须非空且唯一
    pub fn add_advisor(&mut self, advisor: Arc<dyn Advisor>) -> AopResult<()> {
        if advisor.name().is_empty() {
            return Err(AopError::InvalidAdvisor {
                name: String::new(),
                reason: "advisor name must not be empty".to_string(),
            });
        }
        if self.advisors.iter().any(|a| a.name() == advisor.name()) {
            return Err(AopError::DuplicateAdvisor(advisor.name().to_string()));
        }
        self.advisors.push(advisor);
        Ok(())
    }

    pub fn remove_advisor(&mut self, name: &str) -> bool {
        let before = self.advisors.len();
        self.advisors.retain(|a| a.name() != name);
        self.advisors.len() != before
    }

    pub fn advisors(&self) -> &[Arc<dyn Advisor>] {
        &self.advisors
    }

    pub(crate) fn retain_advisors(&mut self, f: impl FnMut(&Arc<dyn Advisor>) -> bool) {
        self.advisors.retain(f);
    }

    /// 限制哪些方法会被拦截，与各 Advisor 自己的切点同时生效
    pub fn set_method_matcher(&mut self, matcher: Arc<dyn MethodMatcher>) {
        self.method_matcher = Some(matcher);
    }

    pub fn method_matcher(&self) -> Option<&dyn MethodMatcher> {
        self.method_matcher.as_deref()
    }

    pub fn set_chain_factory(&mut self, chain_factory: Arc<dyn AdvisorChainFactory>) {
        self.chain_factory = chain_factory;
    }

    /// 计算某次调用的拦截链
    pub fn interceptors_for(
        &self,
        method: &MethodDescriptor,
        target_class: &ClassDescriptor,
    ) -> Vec<ChainElement> {
        self.chain_factory
            .interceptors_and_dynamic_advice(self, method, target_class)
    }
}

impl Default for AdvisedSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AdvisedSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisedSupport")
            .field("config", &self.config)
            .field(
                "target_class",
                &self.target_source.as_ref().map(|t| t.target_class().name().to_string()),
            )
            .field(
                "advisors",
                &self.advisors.iter().map(|a| a.name().to_string()).collect::<Vec<_>>(),
            )
            .field("method_matcher", &self.method_matcher.is_some())
            .finish()
    }
}
