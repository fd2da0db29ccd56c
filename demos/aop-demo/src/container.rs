//! 演示用的最小容器
//!
//! 只支持单例、setter 注入和 BeanPostProcessor，足以演示自动代理和循环依赖。

use chimera_aop::anyhow::{self, Context};
use chimera_aop::{CreationSession, ObjectRef, SmartInstantiationAwareBeanPostProcessor};
use std::collections::HashMap;
use std::sync::Arc;

/// 把依赖注入到原始 Bean 上
pub type Injector = fn(&ObjectRef, ObjectRef) -> anyhow::Result<()>;

/// Bean 定义
#[derive(Clone)]
pub struct BeanDefinition {
    name: &'static str,
    create: fn() -> ObjectRef,
    dependencies: Vec<(&'static str, Injector)>,
}

impl BeanDefinition {
    pub fn new(name: &'static str, create: fn() -> ObjectRef) -> Self {
        Self {
            name,
            create,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, bean_name: &'static str, inject: Injector) -> Self {
        self.dependencies.push((bean_name, inject));
        self
    }
}

/// 单例容器
#[derive(Default)]
pub struct MiniContainer {
    definitions: Vec<BeanDefinition>,
    processors: Vec<Arc<dyn SmartInstantiationAwareBeanPostProcessor>>,
    singletons: HashMap<String, ObjectRef>,
    early_singletons: HashMap<String, ObjectRef>,
    in_creation: HashMap<String, ObjectRef>,
    session: CreationSession,
}

impl MiniContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: BeanDefinition) {
        tracing::debug!("Registered bean definition '{}'", definition.name);
        self.definitions.push(definition);
    }

    pub fn add_post_processor(&mut self, processor: Arc<dyn SmartInstantiationAwareBeanPostProcessor>) {
        tracing::debug!("Registered post processor '{}'", processor.name());
        self.processors.push(processor);
        self.processors.sort_by_key(|p| p.order());
    }

    /// 按注册顺序创建所有单例
    pub fn refresh(&mut self) -> anyhow::Result<()> {
        let names: Vec<&'static str> = self.definitions.iter().map(|d| d.name).collect();
        for name in names {
            self.get_bean(name)?;
        }
        self.session.clear();
        tracing::info!("Container refreshed with {} singleton(s)", self.singletons.len());
        Ok(())
    }

    pub fn get_bean(&mut self, name: &str) -> anyhow::Result<ObjectRef> {
        if let Some(bean) = self.singletons.get(name).or_else(|| self.early_singletons.get(name)) {
            return Ok(Arc::clone(bean));
        }

        // 正在创建中，说明出现了循环依赖
        if let Some(raw) = self.in_creation.get(name).cloned() {
            tracing::debug!("Bean '{}' is in creation, exposing early reference", name);
            let mut exposed = raw;
            for processor in &self.processors {
                exposed = processor.get_early_bean_reference(exposed, name, &mut self.session)?;
            }
            self.early_singletons.insert(name.to_string(), Arc::clone(&exposed));
            return Ok(exposed);
        }

        let definition = self
            .definitions
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .with_context(|| format!("No bean named '{}' is defined", name))?;

        let raw = (definition.create)();
        self.in_creation.insert(name.to_string(), Arc::clone(&raw));

        for (dependency, inject) in &definition.dependencies {
            let bean = self.get_bean(dependency)?;
            inject(&raw, bean)
                .with_context(|| format!("Failed to inject '{}' into '{}'", dependency, name))?;
        }

        let mut processed = Arc::clone(&raw);
        for processor in &self.processors {
            processed = processor.post_process_before_initialization(processed, name)?;
        }
        for processor in &self.processors {
            processed = processor.post_process_after_initialization(processed, name, &mut self.session)?;
        }

        let exposed = self.session.exposed_object(name, &raw, processed);
        self.in_creation.remove(name);
        self.early_singletons.remove(name);
        self.singletons.insert(name.to_string(), Arc::clone(&exposed));
        tracing::info!("Created bean '{}' ({})", name, exposed.class().name());
        Ok(exposed)
    }
}
