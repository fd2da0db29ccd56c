//! Advisor 注册表
//!
//! 读多写少：配置阶段注册，之后每个 Bean 创建时查找一次。

use crate::advisor::{get_all_advisor_registrations, Advisor, AdvisorRegistration};
use crate::auto_proxy::AdvisorLookup;
use crate::error::{AopError, AopResult};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

static GLOBAL_ADVISOR_REGISTRY: OnceCell<Arc<AdvisorRegistry>> = OnceCell::new();

/// 获取全局 Advisor 注册表
///
/// 首次访问时加载所有通过 inventory 注册的 Advisor。任一表达式编译失败时返回错误，
/// 注册表保持未初始化，之后的每次访问都会再次报告同一个错误。
pub fn get_global_registry() -> AopResult<&'static Arc<AdvisorRegistry>> {
    GLOBAL_ADVISOR_REGISTRY.get_or_try_init(|| {
        let registry = AdvisorRegistry::new();
        registry.load_registrations()?;
        Ok(Arc::new(registry))
    })
}

/// Advisor 注册表
///
/// 按注册顺序保存 Advisor，名称唯一。
pub struct AdvisorRegistry {
    advisors: RwLock<Vec<Arc<dyn Advisor>>>,
}

impl AdvisorRegistry {
    pub fn new() -> Self {
        Self {
            advisors: RwLock::new(Vec::new()),
        }
    }

    /// 注册 Advisor，同名 Advisor 已存在时报错
    pub fn register(&self, advisor: Arc<dyn Advisor>) -> AopResult<()> {
        let mut advisors = self.advisors.write();
        if advisors.iter().any(|a| a.name() == advisor.name()) {
            return Err(AopError::DuplicateAdvisor(advisor.name().to_string()));
        }
        tracing::debug!("Registering advisor: {}", advisor.name());
        advisors.push(advisor);
        Ok(())
    }

    /// 批量注册，遇到第一个错误即停止
    pub fn register_all(
        &self,
        advisors: impl IntoIterator<Item = Arc<dyn Advisor>>,
    ) -> AopResult<()> {
        advisors.into_iter().try_for_each(|advisor| self.register(advisor))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Advisor>> {
        self.advisors.read().iter().find(|a| a.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.advisors
            .read()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    /// 当前所有 Advisor 的快照
    pub fn snapshot(&self) -> Vec<Arc<dyn Advisor>> {
        self.advisors.read().clone()
    }

    pub fn len(&self) -> usize {
        self.advisors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.read().is_empty()
    }

    pub fn clear(&self) {
        self.advisors.write().clear();
    }

    /// 加载所有通过 inventory 注册的 Advisor
    pub fn load_registrations(&self) -> AopResult<usize> {
        self.load_from(get_all_advisor_registrations())
    }

    /// 编译并注册一组 Advisor 声明
    ///
    /// 先编译全部表达式再注册：任一表达式编译失败时不注册任何 Advisor。
    pub fn load_from<'a>(
        &self,
        registrations: impl IntoIterator<Item = &'a AdvisorRegistration>,
    ) -> AopResult<usize> {
        let registrations: Vec<_> = registrations.into_iter().collect();
        tracing::info!("Loading {} registered advisor(s)", registrations.len());

        let mut advisors: Vec<Arc<dyn Advisor>> = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            tracing::debug!(
                "  ├─ Loading advisor: {} with pointcut: {}",
                registration.name,
                registration.expression
            );
            let advisor = registration.create_advisor().map_err(|e| {
                tracing::error!("Failed to load advisor '{}': {}", registration.name, e);
                e
            })?;
            advisors.push(Arc::new(advisor));
        }

        let count = advisors.len();
        self.register_all(advisors)?;
        tracing::info!("Loaded {} advisor(s)", count);
        Ok(count)
    }
}

impl Default for AdvisorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvisorLookup for AdvisorRegistry {
    fn advisors(&self) -> AopResult<Vec<Arc<dyn Advisor>>> {
        Ok(self.snapshot())
    }
}

impl fmt::Debug for AdvisorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisorRegistry")
            .field("advisors", &self.names())
            .finish()
    }
}
