//! 错误信息结构
//!
//! 把调用错误整理成结构化信息，供异常通知记录日志

use std::error::Error;

/// 结构化的错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// 错误消息
    pub message: String,

    /// 错误类型名称
    pub error_type: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl ErrorInfo {
    /// 从标准错误创建 ErrorInfo
    pub fn from_error<E: Error>(error: &E) -> Self {
        let mut source_chain = Vec::new();
        let mut current_source = error.source();
        while let Some(source) = current_source {
            source_chain.push(source.to_string());
            current_source = source.source();
        }

        Self {
            message: error.to_string(),
            error_type: std::any::type_name::<E>().to_string(),
            source_chain,
        }
    }

    /// 从调用错误创建 ErrorInfo
    ///
    /// `anyhow::Error` 擦除了具体类型，类型名取自 Debug 输出的首个标识符。
    pub fn from_anyhow(error: &anyhow::Error) -> Self {
        let source_chain = error.chain().skip(1).map(|e| e.to_string()).collect();
        let debug = format!("{:?}", error.root_cause());
        let error_type = debug
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
            .to_string();

        Self {
            message: error.to_string(),
            error_type,
            source_chain,
        }
    }

    /// 创建只包含消息的 ErrorInfo
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: "Unknown".to_string(),
            source_chain: Vec::new(),
        }
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}
