//! 账本存储模块
//!
//! 提供两种存储后端：本地 SQLite 与表存储服务（HTTP）
//!
//! # 设计
//!
//! - `LedgerBackend` trait 定义统一的异步接口
//! - `LedgerStorage` enum 封装不同的后端实现
//! - 通过 `LedgerConfig` 选择和初始化后端

pub mod backend;
pub mod connection;
pub mod sqlite;
pub mod table;

use crate::config::{LedgerConfig, SqliteConfig, StorageBackend, validate_table_name};
use crate::entry::NewEntry;
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};

pub use backend::LedgerBackend;
pub use connection::StorageAccount;
pub use sqlite::SqliteBackend;
pub use table::TableBackend;

/// 分区 + 时间范围过滤条件，时间边界不包含在内
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    pub partition_key: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub page_size: u32,
}

/// 分页续接位置，只对产生它的后端有意义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub(crate) next_partition_key: String,
    pub(crate) next_row_key: Option<String>,
}

/// 一页查询结果
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entries: Vec<crate::entry::LogEntry>,
    pub continuation: Option<Continuation>,
}

/// 账本存储统一接口
///
/// 使用 enum 而不是 trait object：可以 Clone，分派在编译期确定。
#[derive(Clone, Debug)]
pub enum LedgerStorage {
    /// SQLite 存储后端
    Sqlite(Box<SqliteBackend>),

    /// 表存储服务后端
    Table(Box<TableBackend>),
}

impl LedgerStorage {
    /// 从配置创建存储实例（不创建表）
    ///
    /// # Errors
    /// - 表名不合法
    /// - 缺少表存储服务配置或连接字符串
    /// - 后端连接失败
    pub async fn from_config(config: &LedgerConfig) -> StoreResult<Self> {
        validate_table_name(&config.table_name).map_err(StoreError::Config)?;

        match config.storage.backend {
            StorageBackend::Sqlite => {
                let sqlite = config.storage.sqlite.clone().unwrap_or_default();
                let backend = SqliteBackend::new(&sqlite, &config.table_name).await?;
                Ok(Self::Sqlite(Box::new(backend)))
            }
            StorageBackend::Table => {
                let table = config
                    .storage
                    .table
                    .as_ref()
                    .ok_or_else(|| StoreError::Config("Missing table storage config".into()))?;
                let conn = table
                    .resolve_connection_string()
                    .map_err(StoreError::Config)?;
                let account = StorageAccount::parse(&conn)?;
                let backend = TableBackend::new(account, &config.table_name)?;
                Ok(Self::Table(Box::new(backend)))
            }
        }
    }

    /// 打开指定路径的 SQLite 存储
    pub async fn sqlite(config: &SqliteConfig, table_name: &str) -> StoreResult<Self> {
        let backend = SqliteBackend::new(config, table_name).await?;
        Ok(Self::Sqlite(Box::new(backend)))
    }

    fn backend(&self) -> &dyn LedgerBackend {
        match self {
            Self::Sqlite(b) => b.as_ref(),
            Self::Table(b) => b.as_ref(),
        }
    }

    /// 表不存在时创建
    pub async fn ensure_table(&self) -> StoreResult<()> {
        self.backend().ensure_table().await
    }

    /// 插入一条记录
    pub async fn insert(&self, entry: &NewEntry) -> StoreResult<()> {
        self.backend().insert(entry).await
    }

    /// 读取一页记录
    pub async fn query_page(
        &self,
        filter: &RangeFilter,
        continuation: Option<&Continuation>,
    ) -> StoreResult<Page> {
        self.backend().query_page(filter, continuation).await
    }

    /// 删除一条记录
    pub async fn delete(&self, partition_key: &str, row_key: &str) -> StoreResult<()> {
        self.backend().delete(partition_key, row_key).await
    }

    /// 批量删除
    pub async fn delete_batch(&self, partition_key: &str, row_keys: &[String]) -> StoreResult<()> {
        self.backend().delete_batch(partition_key, row_keys).await
    }

    /// 删除整张表
    pub async fn drop_table(&self) -> StoreResult<()> {
        self.backend().drop_table().await
    }

    /// 获取后端类型名称
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "SQLite",
            Self::Table(_) => "Table",
        }
    }
}
