//! BeanPostProcessor - 容器生命周期钩子
//!
//! 容器在创建 Bean 的过程中依次调用：
//!
//! 1. `get_early_bean_reference`：仅当 Bean 在构造期间被循环依赖提前引用时调用
//! 2. `post_process_before_initialization`
//! 3. `post_process_after_initialization`
//!
//! 提前暴露的引用记录在 [`CreationSession`] 中，由容器显式传入，而不是放在处理器
//! 内部的可变状态里。一次容器启动使用一个会话。

use crate::error::AopResult;
use crate::object::ObjectRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 一个提前暴露的 Bean
#[derive(Clone)]
struct EarlyReference {
    /// 提前暴露时的原始 Bean
    raw: ObjectRef,
    /// 交给依赖方的引用（可能是代理）
    exposed: ObjectRef,
}

/// Bean 创建会话
///
/// 记录哪些 Bean 已经通过 `get_early_bean_reference` 提前暴露，以及交出去的引用。
#[derive(Default)]
pub struct CreationSession {
    early_references: HashMap<String, EarlyReference>,
}

impl CreationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bean 是否已被提前暴露
    pub fn is_early_exposed(&self, bean_name: &str) -> bool {
        self.early_references.contains_key(bean_name)
    }

    /// 已交给依赖方的提前引用
    pub fn early_reference(&self, bean_name: &str) -> Option<&ObjectRef> {
        self.early_references.get(bean_name).map(|r| &r.exposed)
    }

    /// 提前暴露时的原始 Bean
    pub fn early_raw_bean(&self, bean_name: &str) -> Option<&ObjectRef> {
        self.early_references.get(bean_name).map(|r| &r.raw)
    }

    /// 记录提前暴露的引用
    pub fn record_early_reference(
        &mut self,
        bean_name: impl Into<String>,
        raw: ObjectRef,
        exposed: ObjectRef,
    ) {
        self.early_references
            .insert(bean_name.into(), EarlyReference { raw, exposed });
    }

    /// 容器最终应当保存的对象
    ///
    /// 初始化后处理原样返回了原始 Bean、而该 Bean 曾被提前暴露时，
    /// 必须保存提前交出的引用，保证所有依赖方拿到的是同一个对象。
    pub fn exposed_object(&self, bean_name: &str, raw: &ObjectRef, processed: ObjectRef) -> ObjectRef {
        match self.early_references.get(bean_name) {
            Some(early) if Arc::ptr_eq(&processed, raw) => Arc::clone(&early.exposed),
            _ => processed,
        }
    }

    pub fn len(&self) -> usize {
        self.early_references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.early_references.is_empty()
    }

    /// 会话结束，清空记录
    pub fn clear(&mut self) {
        self.early_references.clear();
    }
}

impl fmt::Debug for CreationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationSession")
            .field("early_exposed", &self.early_references.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 支持提前引用的 BeanPostProcessor
///
/// 在 Bean 初始化的不同阶段提供钩子，返回处理后的 Bean（原始 Bean 或包装后的代理）。
pub trait SmartInstantiationAwareBeanPostProcessor: Send + Sync {
    /// 在 Bean 初始化回调之前调用
    fn post_process_before_initialization(
        &self,
        bean: ObjectRef,
        _bean_name: &str,
    ) -> AopResult<ObjectRef> {
        Ok(bean)
    }

    /// 在 Bean 初始化回调之后调用
    ///
    /// 典型用途是创建 AOP 代理。
    fn post_process_after_initialization(
        &self,
        bean: ObjectRef,
        _bean_name: &str,
        _session: &mut CreationSession,
    ) -> AopResult<ObjectRef> {
        Ok(bean)
    }

    /// 循环依赖时，为尚未完成初始化的 Bean 提供提前引用
    fn get_early_bean_reference(
        &self,
        bean: ObjectRef,
        _bean_name: &str,
        _session: &mut CreationSession,
    ) -> AopResult<ObjectRef> {
        Ok(bean)
    }

    /// 获取处理器的名称（用于日志和调试）
    fn name(&self) -> &str {
        "BeanPostProcessor"
    }

    /// 获取处理器的优先级（数字越小优先级越高）
    fn order(&self) -> i32 {
        1000
    }
}
