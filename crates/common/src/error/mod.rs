//! 错误处理模块
//!
//! 错误分类（稳定错误码 + 本地化描述）与结构化错误载体

mod describe;
mod kind;
mod service_error;

pub use describe::{GENERIC_ERROR_MESSAGE, Locale, NO_DESCRIPTION, describe};
pub use kind::{ErrorCategory, ErrorKind};
pub use service_error::{ErrorResponse, NO_DETAIL, ServiceError, ServiceResult};
