//! AOP 工具函数

use crate::advisor::Advisor;
use crate::object::{ClassDescriptor, Invocable};
use crate::proxy::{InterfaceProxy, SubclassProxy};
use crate::target::TargetSource;
use std::sync::Arc;

/// 对象是否为 AOP 代理（对 opaque 代理同样有效）
pub fn is_aop_proxy(object: &dyn Invocable) -> bool {
    is_interface_proxy(object) || is_subclass_proxy(object)
}

pub fn is_interface_proxy(object: &dyn Invocable) -> bool {
    object.downcast_ref::<InterfaceProxy>().is_some()
}

pub fn is_subclass_proxy(object: &dyn Invocable) -> bool {
    object.downcast_ref::<SubclassProxy>().is_some()
}

fn target_source_of(object: &dyn Invocable) -> Option<&Arc<dyn TargetSource>> {
    object
        .downcast_ref::<InterfaceProxy>()
        .map(InterfaceProxy::target_source)
        .or_else(|| {
            object
                .downcast_ref::<SubclassProxy>()
                .map(SubclassProxy::target_source)
        })
}

/// 穿过所有代理层得到最终目标的类型
pub fn ultimate_target_class(object: &dyn Invocable) -> ClassDescriptor {
    let mut class = object.class().clone();
    let mut current = target_source_of(object).cloned();

    while let Some(target_source) = current {
        class = target_source.target_class().clone();
        // 只有静态目标源可以继续向下追溯
        current = match target_source.is_static().then(|| target_source.get_target()) {
            Some(Ok(target)) => target_source_of(target.as_ref()).cloned(),
            _ => None,
        };
    }
    class
}

/// 筛选类过滤器接受指定类型的 Advisor
pub fn find_advisors_that_can_apply(
    candidates: &[Arc<dyn Advisor>],
    class: &ClassDescriptor,
) -> Vec<Arc<dyn Advisor>> {
    candidates
        .iter()
        .filter(|advisor| advisor.pointcut().matches_class(class))
        .cloned()
        .collect()
}
