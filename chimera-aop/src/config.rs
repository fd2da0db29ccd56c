//! AOP 配置
//!
//! 从 TOML 读取，所有字段都有默认值：
//!
//! ```toml
//! [aop]
//! enabled = true
//! proxy_target_class = false
//!
//! [aop.logging]
//! level = "debug"
//! format = "compact"
//! ```

use crate::error::{AopError, AopResult};
use crate::logging::LoggingConfig;
use serde::Deserialize;
use std::path::Path;

/// AOP 配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AopConfig {
    /// 是否启用自动代理（默认：true）
    pub enabled: bool,

    /// 是否总是使用子类代理（默认：false）
    pub proxy_target_class: bool,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for AopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            proxy_target_class: false,
            logging: LoggingConfig::default(),
        }
    }
}

/// 配置文件的顶层结构，AOP 配置位于 `[aop]` 表下
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    aop: AopConfig,
}

impl AopConfig {
    /// 解析 TOML 文本
    pub fn from_toml_str(content: &str) -> AopResult<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| AopError::Config(e.to_string()))?;
        Ok(file.aop)
    }

    /// 读取 TOML 文件
    pub fn from_file(path: impl AsRef<Path>) -> AopResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AopError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loading AOP config from {}", path.display());
        Self::from_toml_str(&content)
    }
}
