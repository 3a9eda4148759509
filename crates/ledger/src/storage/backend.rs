//! 账本存储后端抽象接口
//!
//! 定义了所有存储后端必须实现的统一异步接口

use crate::entry::NewEntry;
use crate::error::StoreResult;
use crate::storage::{Continuation, Page, RangeFilter};
use async_trait::async_trait;

/// 账本存储后端抽象接口
///
/// 所有存储后端（SQLite, 表存储服务）都需要实现此 trait。
/// 后端只负责单张表的读写，分区、阈值和加锁策略由 `Ledger` 负责。
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// 表不存在时创建
    ///
    /// 必须是幂等的：多个进程并发创建时都应成功返回。
    async fn ensure_table(&self) -> StoreResult<()>;

    /// 插入一条记录，时间戳由后端分配
    ///
    /// 同一分区下行键重复时返回错误。
    async fn insert(&self, entry: &NewEntry) -> StoreResult<()>;

    /// 读取一页满足过滤条件的记录，按行键升序
    ///
    /// # Arguments
    /// * `filter` - 分区与时间范围（不含边界）
    /// * `continuation` - 上一页返回的续接位置，首页传 `None`
    ///
    /// # Returns
    /// 本页记录以及下一页的续接位置（没有更多数据时为 `None`）
    async fn query_page(
        &self,
        filter: &RangeFilter,
        continuation: Option<&Continuation>,
    ) -> StoreResult<Page>;

    /// 删除一条记录，不存在时返回 `EntityNotFound`
    async fn delete(&self, partition_key: &str, row_key: &str) -> StoreResult<()>;

    /// 在一个批次中删除同一分区下的多条记录
    async fn delete_batch(&self, partition_key: &str, row_keys: &[String]) -> StoreResult<()>;

    /// 删除整张表（不存在时视为成功）
    async fn drop_table(&self) -> StoreResult<()>;
}
