//! 按时间范围的延迟查询
//!
//! 查询在迭代时才访问存储，按页拉取直到没有续接位置。

use crate::entry::LogEntry;
use crate::storage::{Continuation, LedgerStorage, RangeFilter};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sourcelinks_common::{ServiceError, ServiceResult};

/// 查询出错时记录的来源
pub const QUERY_ORIGIN: &str = "Ledger::query(by_date)";

enum Cursor {
    First,
    Next(Continuation),
    Done,
}

/// 一次按时间范围的查询，结果按行键升序（新记录在前）
#[derive(Debug, Clone)]
pub struct LedgerQuery {
    storage: LedgerStorage,
    filter: RangeFilter,
}

impl LedgerQuery {
    pub(crate) fn new(storage: LedgerStorage, filter: RangeFilter) -> Self {
        Self { storage, filter }
    }

    pub fn filter(&self) -> &RangeFilter {
        &self.filter
    }

    /// 逐条产出记录的流
    ///
    /// 存储故障以 `EXP_TS_FAIL` 的形式在流中出现，详情为展开后的 `code?message`。
    pub fn stream(&self) -> BoxStream<'static, ServiceResult<LogEntry>> {
        let storage = self.storage.clone();
        let filter = self.filter.clone();

        stream::try_unfold(Cursor::First, move |cursor| {
            let storage = storage.clone();
            let filter = filter.clone();
            async move {
                let continuation = match cursor {
                    Cursor::First => None,
                    Cursor::Next(next) => Some(next),
                    Cursor::Done => return Ok(None),
                };
                let page = storage
                    .query_page(&filter, continuation.as_ref())
                    .await
                    .map_err(|e| {
                        crate::metrics::record_failure("query");
                        ServiceError::storage_failure(QUERY_ORIGIN, e.envelope())
                    })?;
                let next = match page.continuation {
                    Some(next) => Cursor::Next(next),
                    None => Cursor::Done,
                };
                let entries = stream::iter(page.entries.into_iter().map(Ok::<_, ServiceError>));
                Ok::<_, ServiceError>(Some((entries, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// 读取全部结果
    pub async fn collect(&self) -> ServiceResult<Vec<LogEntry>> {
        self.stream().try_collect().await
    }

    /// 结果条数
    pub async fn count(&self) -> ServiceResult<u64> {
        self.stream()
            .try_fold(0u64, |count, _| async move { Ok(count + 1) })
            .await
    }

    /// 结果的行键
    pub(crate) async fn row_keys(&self) -> ServiceResult<Vec<String>> {
        self.stream()
            .map_ok(|entry| entry.row_key)
            .try_collect()
            .await
    }
}
