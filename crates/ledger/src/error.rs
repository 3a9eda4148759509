//! 存储后端错误定义

use crate::provider::{NO_FURTHER_INFO, unwrap_envelope};
use thiserror::Error;

/// 找不到实体时使用的错误码，与表存储服务保持一致
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFound";

/// 存储后端错误类型
///
/// 只在账本内部流转；越过账本边界前会展开成 `ServiceError` 的详情。
#[derive(Error, Debug)]
pub enum StoreError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP 客户端错误
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// 表存储服务拒绝了请求
    #[error("Table service rejected request: status={status}")]
    Rejected { status: u16, body: String },

    /// 实体不存在
    #[error("Entity not found: {partition_key}/{row_key}")]
    EntityNotFound {
        partition_key: String,
        row_key: String,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 无法识别的响应
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl StoreError {
    /// 展开后端的错误信封，得到 `code?message`
    ///
    /// 无法展开时返回 "No further Info."
    pub fn envelope(&self) -> String {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => match db.code() {
                Some(code) => format!("{code}?{}", db.message()),
                None => NO_FURTHER_INFO.to_string(),
            },
            StoreError::Rejected { body, .. } => unwrap_envelope(body),
            StoreError::EntityNotFound { .. } => {
                format!("{RESOURCE_NOT_FOUND}?The specified resource does not exist.")
            }
            _ => NO_FURTHER_INFO.to_string(),
        }
    }
}

/// 存储结果类型别名
pub type StoreResult<T> = Result<T, StoreError>;
