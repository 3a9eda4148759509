//! 统一错误处理模型
//!
//! 主程序启动与命令行路径的顶层错误类型

use sourcelinks_common::ServiceError;
use thiserror::Error;

/// 主程序的统一错误枚举
#[derive(Debug, Error)]
pub enum Error {
    // ========== 账本错误 ==========
    /// 账本操作失败
    #[error("Ledger error: {0}")]
    Ledger(#[from] ServiceError),

    // ========== 系统级错误 ==========
    /// I/O 操作错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    // ========== 业务逻辑错误 ==========
    /// 服务启动失败
    #[error("Service startup failed: {message}")]
    ServiceStartup { message: String },

    /// 服务配置验证失败
    #[error("Service configuration validation failed: {message}")]
    ServiceValidation { message: String },

    // ========== 通用错误 ==========
    /// 自定义错误消息
    #[error("Application error: {message}")]
    Custom { message: String },
}

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 创建自定义错误
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }

    /// 创建服务启动失败错误
    pub fn service_startup(message: impl Into<String>) -> Self {
        Self::ServiceStartup {
            message: message.into(),
        }
    }

    /// 创建服务配置验证失败错误
    pub fn service_validation(message: impl Into<String>) -> Self {
        Self::ServiceValidation {
            message: message.into(),
        }
    }
}
