//! 按应用分区、按时间倒序的审计日志账本
//!
//! # 存储后端
//!
//! - SQLite（本地文件，默认）
//! - 表存储服务（HTTP，SharedKeyLite 签名）
//!
//! # 示例
//!
//! ```no_run
//! use ledger::{Ledger, LedgerConfig, Severity};
//! use sourcelinks_common::ErrorKind;
//!
//! # async fn run() -> Result<(), sourcelinks_common::ServiceError> {
//! let ledger = Ledger::open(&LedgerConfig::default()).await?;
//! ledger
//!     .append(ErrorKind::Initialized, Severity::Info, "started", "main")
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod provider;
pub mod query;
pub mod severity;
pub mod storage;

pub use config::{LedgerConfig, SqliteConfig, StorageBackend, StorageConfig, TableConfig};
pub use entry::{LogEntry, NewEntry, row_key, row_key_time};
pub use error::{StoreError, StoreResult};
pub use ledger::{Ledger, WriteOutcome, compose_message};
pub use metrics::register_ledger_metrics;
pub use provider::{NO_FURTHER_INFO, unwrap_envelope};
pub use query::LedgerQuery;
pub use severity::{Severity, SeverityFilter, UNFILTERED};
pub use storage::{LedgerStorage, StorageAccount};
