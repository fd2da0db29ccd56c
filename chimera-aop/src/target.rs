//! 目标源（TargetSource）
//!
//! 代理不直接持有目标对象，而是每次调用时向目标源获取当前目标。

use crate::error::{AopError, AopResult, InvocationResult};
use crate::object::{ClassDescriptor, ObjectRef};
use parking_lot::RwLock;
use std::fmt;

/// 目标源 Trait
pub trait TargetSource: Send + Sync {
    /// 目标类型
    fn target_class(&self) -> &ClassDescriptor;

    /// 获取当前目标
    fn get_target(&self) -> InvocationResult<ObjectRef>;

    /// 调用结束后归还目标
    fn release_target(&self, _target: ObjectRef) {}

    /// 每次 `get_target` 是否都返回同一个对象
    fn is_static(&self) -> bool;
}

/// 持有单个固定目标
#[derive(Clone)]
pub struct SingletonTargetSource {
    target: ObjectRef,
}

impl SingletonTargetSource {
    pub fn new(target: ObjectRef) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_class(&self) -> &ClassDescriptor {
        self.target.class()
    }

    fn get_target(&self) -> InvocationResult<ObjectRef> {
        Ok(self.target.clone())
    }

    fn is_static(&self) -> bool {
        true
    }
}

impl fmt::Debug for SingletonTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingletonTargetSource({})", self.target.class().name())
    }
}

/// 可在运行时替换目标的目标源
///
/// 新目标必须可以赋值给原目标的类型；已在执行中的调用继续使用旧目标。
pub struct HotSwappableTargetSource {
    class: ClassDescriptor,
    target: RwLock<ObjectRef>,
}

impl HotSwappableTargetSource {
    pub fn new(target: ObjectRef) -> Self {
        Self {
            class: target.class().clone(),
            target: RwLock::new(target),
        }
    }

    /// 替换目标，返回旧目标
    pub fn swap(&self, new_target: ObjectRef) -> AopResult<ObjectRef> {
        if !new_target.is_instance_of(self.class.name()) {
            return Err(AopError::IncompatibleTarget {
                expected: self.class.name().to_string(),
                actual: new_target.class().name().to_string(),
            });
        }
        tracing::debug!(
            "Swapping target of type '{}' for '{}'",
            self.class.name(),
            new_target.class().name()
        );
        Ok(std::mem::replace(&mut *self.target.write(), new_target))
    }
}

impl TargetSource for HotSwappableTargetSource {
    fn target_class(&self) -> &ClassDescriptor {
        &self.class
    }

    fn get_target(&self) -> InvocationResult<ObjectRef> {
        Ok(self.target.read().clone())
    }

    fn is_static(&self) -> bool {
        false
    }
}

impl fmt::Debug for HotSwappableTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HotSwappableTargetSource({})", self.class.name())
    }
}
