//! sourcelinks 通用基础设施库
//!
//! 提供跨组件共享的错误分类（稳定错误码、本地化描述）、结构化错误载体以及网络工具

pub mod error;
pub mod util;

// Re-export commonly used types for convenience
pub use error::{
    ErrorCategory, ErrorKind, ErrorResponse, Locale, ServiceError, ServiceResult, describe,
};
pub use util::client_address;

// 载体使用的状态码类型
pub use axum::http::StatusCode;
