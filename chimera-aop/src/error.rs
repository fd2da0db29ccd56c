//! 错误类型
//!
//! 区分两类错误：
//! - 配置错误（[`AopError`]）：切点编译失败、重复注册、无法生成子类等，在代理创建时立即报告
//! - 调用错误（[`anyhow::Error`]）：目标方法或通知抛出的错误，沿拦截链原样传播

use thiserror::Error;

/// AOP 配置错误
#[derive(Debug, Error)]
pub enum AopError {
    /// 切点表达式编译失败
    #[error("Invalid pointcut expression '{expression}': {reason}")]
    PointcutCompile { expression: String, reason: String },

    /// 同名 Advisor 重复注册
    #[error("Advisor '{0}' is already registered")]
    DuplicateAdvisor(String),

    /// Advisor 定义无效
    #[error("Invalid advisor '{name}': {reason}")]
    InvalidAdvisor { name: String, reason: String },

    /// 未设置 TargetSource
    #[error("No target source configured for proxy")]
    NoTargetSource,

    /// 目标类型无法被子类化（sealed）
    #[error("Cannot generate subclass proxy for '{class}': {reason}")]
    NotSubclassable { class: String, reason: String },

    /// 热替换的目标与原类型不兼容
    #[error("Target of type '{actual}' is not assignable to '{expected}'")]
    IncompatibleTarget { expected: String, actual: String },

    /// 为某个 Bean 创建代理失败
    #[error("Error creating proxy for bean '{bean_name}'")]
    ProxyCreation {
        bean_name: String,
        #[source]
        source: Box<AopError>,
    },

    /// 目标对象不存在该方法
    #[error("No method '{method}' on '{class}'")]
    NoSuchMethod { class: String, method: String },

    /// 基于接口的代理不暴露该方法
    #[error("Method '{method}' is not exposed by interface proxy of '{class}'")]
    MethodNotExposed { class: String, method: String },

    /// 参数类型或数量不匹配
    #[error("Argument {index} of '{method}': expected {expected}")]
    ArgumentMismatch {
        method: String,
        index: usize,
        expected: &'static str,
    },

    /// 返回值类型不匹配
    #[error("Return value of type {actual} cannot be read as {expected}")]
    ReturnTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// 配置加载失败
    #[error("Failed to load AOP config: {0}")]
    Config(String),

    /// 日志系统初始化失败
    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),

    /// 容器查找错误，原样传播
    #[error(transparent)]
    Lookup(anyhow::Error),
}

impl AopError {
    /// 包装为指定 Bean 的代理创建错误
    pub fn for_bean(self, bean_name: impl Into<String>) -> Self {
        match self {
            // 容器查找错误不属于本模块，保持原样
            AopError::Lookup(_) => self,
            other => AopError::ProxyCreation {
                bean_name: bean_name.into(),
                source: Box::new(other),
            },
        }
    }
}

/// 配置错误结果类型
pub type AopResult<T> = Result<T, AopError>;

/// 方法调用结果类型
///
/// 目标方法和通知的错误都使用 `anyhow::Error` 传播，调用方可以通过
/// `downcast_ref` 取回原始错误类型。
pub type InvocationResult<T> = anyhow::Result<T>;
