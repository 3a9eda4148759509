//! # sourcelinks
//!
//! 链接目录服务：按名称返回配置好的 API 地址，所有故障写入按应用分区的审计账本

pub mod config;
pub mod http;
pub mod metrics;

// Re-export commonly used types
pub use config::SourcelinksConfig;
pub use http::{AppState, create_router, serve};
