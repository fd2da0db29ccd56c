//! 通知定义
//!
//! 通过 inventory 在编译时注册，启动时由全局 AdvisorRegistry 加载。

use chimera_aop::prelude::*;
use std::time::Duration;

/// 审计通知：记录每个成功下单的订单号
pub struct OrderAuditAdvice;

impl AfterReturningAdvice for OrderAuditAdvice {
    fn after_returning(
        &self,
        return_value: &ReturnValue,
        method: &MethodDescriptor,
        args: &Arguments,
        _target: &dyn Invocable,
    ) -> InvocationResult<()> {
        if let (Some(order_id), Some(item)) = (return_value.downcast_ref::<u64>(), args.get::<String>(0)) {
            tracing::info!("🧾 [AUDIT] {} -> order #{} for '{}'", method.name(), order_id, item);
        }
        Ok(())
    }
}

inventory::submit! {
    AdvisorRegistration::new(
        "serviceTrace",
        "execution(* com.example.shop.*Service.*(..))",
        || Advice::around(TraceInterceptor),
    )
}

inventory::submit! {
    AdvisorRegistration::new(
        "slowCallMonitor",
        "within(com.example.shop..*)",
        || Advice::around(PerformanceMonitorInterceptor::new(Duration::from_millis(20))),
    )
}

inventory::submit! {
    AdvisorRegistration::new(
        "failureLogger",
        "execution(* com.example.shop..*.*(..))",
        || Advice::after_throwing(ExceptionLoggingAdvice),
    )
}

inventory::submit! {
    AdvisorRegistration::new(
        "orderAudit",
        "execution(u64 com.example.shop.OrderService.place_order(String, u32))",
        || Advice::after_returning(OrderAuditAdvice),
    )
}
