//! 常用通知
//!
//! 可直接放进 Advisor 使用的日志、耗时监控和异常记录通知。

use crate::advice::{MethodInterceptor, ThrowsAdvice};
use crate::error::InvocationResult;
use crate::error_info::ErrorInfo;
use crate::joinpoint::MethodInvocation;
use crate::object::{Arguments, Invocable, MethodDescriptor, ReturnValue};
use std::time::{Duration, Instant};

/// 方法进出日志
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceInterceptor;

impl MethodInterceptor for TraceInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        let signature = invocation.signature();
        tracing::debug!("→ Entering {} with {:?}", signature, invocation.arguments());

        let result = invocation.proceed();
        let elapsed = invocation.started_at().elapsed();
        match &result {
            Ok(value) => tracing::debug!("← Exiting {} returning {:?} (took {:?})", signature, value, elapsed),
            Err(e) => tracing::debug!("← Exiting {} with error: {} (took {:?})", signature, e, elapsed),
        }
        result
    }
}

/// 耗时监控，超过阈值时告警
#[derive(Debug, Clone, Copy)]
pub struct PerformanceMonitorInterceptor {
    threshold: Duration,
}

impl PerformanceMonitorInterceptor {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl Default for PerformanceMonitorInterceptor {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl MethodInterceptor for PerformanceMonitorInterceptor {
    fn invoke(&self, invocation: &mut dyn MethodInvocation) -> InvocationResult<ReturnValue> {
        let start = Instant::now();
        let result = invocation.proceed();
        let elapsed = start.elapsed();

        if elapsed > self.threshold {
            tracing::warn!(
                "Slow method detected: {} took {}ms (threshold: {}ms)",
                invocation.method(),
                elapsed.as_millis(),
                self.threshold.as_millis()
            );
        } else {
            tracing::debug!("{} took {:?}", invocation.method(), elapsed);
        }
        result
    }
}

/// 记录调用错误，不改变错误本身
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionLoggingAdvice;

impl ThrowsAdvice for ExceptionLoggingAdvice {
    fn after_throwing(
        &self,
        method: &MethodDescriptor,
        args: &Arguments,
        target: &dyn Invocable,
        error: &anyhow::Error,
    ) {
        let info = ErrorInfo::from_anyhow(error);
        tracing::error!(
            method = %method,
            class = %target.class(),
            error_type = %info.error_type,
            "Method failed with {:?}: {}",
            args,
            info.full_description()
        );
    }
}
