//! 账本
//!
//! 单一应用分区的日志账本：写入（带严重级别过滤）、按时间范围查询、
//! 按键/按范围删除以及整表清除。

use crate::config::LedgerConfig;
use crate::entry::{NewEntry, is_sentinel, row_key};
use crate::metrics::{record_failure, record_write};
use crate::query::{LedgerQuery, QUERY_ORIGIN};
use crate::severity::{Severity, SeverityFilter};
use crate::storage::{LedgerStorage, RangeFilter};
use chrono::{DateTime, Utc};
use sourcelinks_common::{ErrorKind, ServiceError, ServiceResult, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DELETE_ORIGIN: &str = "Ledger::delete";
const DELETE_RANGE_ORIGIN: &str = "Ledger::delete(by_date)";

/// 一次写入的结果
///
/// 写入失败不会返回错误，只体现在这里。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 已写入
    Written { row_key: String },
    /// 严重级别超过阈值，被跳过
    Filtered,
    /// 存储失败，记录被丢弃
    Dropped { reason: String },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Written { .. } => "written",
            Self::Filtered => "filtered",
            Self::Dropped { .. } => "dropped",
        }
    }
}

/// 账本
#[derive(Debug)]
pub struct Ledger {
    storage: LedgerStorage,
    application: String,
    filter: SeverityFilter,
    page_size: u32,
    /// 串行化所有修改操作，查询不持有
    write_lock: Mutex<()>,
}

impl Ledger {
    /// 按配置打开账本，并确保表存在
    ///
    /// 每个进程只应调用一次；清除之后需要重新打开才会重建表。
    pub async fn open(config: &LedgerConfig) -> ServiceResult<Self> {
        let storage = LedgerStorage::from_config(config).await.map_err(|e| {
            ServiceError::new(
                ErrorKind::Config,
                "Ledger::open",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .with_detail(e.to_string())
        })?;
        Self::with_storage(config, storage).await
    }

    /// 使用已创建的存储打开账本，并确保表存在
    pub async fn with_storage(config: &LedgerConfig, storage: LedgerStorage) -> ServiceResult<Self> {
        storage.ensure_table().await.map_err(|e| {
            record_failure("ensure_table");
            ServiceError::storage_failure("Ledger::open", e.envelope())
        })?;

        info!(
            "Ledger opened: application={}, table={}, backend={}, max_severity={}",
            config.application_name,
            config.table_name,
            storage.backend_name(),
            config.max_severity
        );

        Ok(Self {
            storage,
            application: config.application_name.clone(),
            filter: config.severity_filter(),
            page_size: config.page_size,
            write_lock: Mutex::new(()),
        })
    }

    /// 应用名称（分区键）
    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn severity_filter(&self) -> SeverityFilter {
        self.filter
    }

    pub fn storage(&self) -> &LedgerStorage {
        &self.storage
    }

    /// 写入一条记录
    pub async fn append(
        &self,
        kind: ErrorKind,
        severity: Severity,
        message: &str,
        source: &str,
    ) -> WriteOutcome {
        self.append_as(kind, severity, message, source, "").await
    }

    /// 写入一条带调用方标识的记录
    ///
    /// 超过阈值的写入被跳过；存储失败只记录告警，不会返回错误。
    pub async fn append_as(
        &self,
        kind: ErrorKind,
        severity: Severity,
        message: &str,
        source: &str,
        who: &str,
    ) -> WriteOutcome {
        let outcome = self.write(kind, severity, message, source, who).await;
        record_write(outcome.label());
        outcome
    }

    async fn write(
        &self,
        kind: ErrorKind,
        severity: Severity,
        message: &str,
        source: &str,
        who: &str,
    ) -> WriteOutcome {
        if !self.filter.allows(severity.level()) {
            return WriteOutcome::Filtered;
        }

        let _guard = self.write_lock.lock().await;
        let entry = NewEntry {
            partition_key: self.application.clone(),
            row_key: row_key(Utc::now()),
            severity: severity.level(),
            message: compose_message(kind, message, source, who),
        };

        match self.storage.insert(&entry).await {
            Ok(()) => WriteOutcome::Written {
                row_key: entry.row_key,
            },
            Err(e) => {
                let reason = e.envelope();
                warn!(
                    "Ledger write dropped: severity={}, key={}, reason={}, error={}",
                    severity.name(),
                    entry.row_key,
                    reason,
                    e
                );
                WriteOutcome::Dropped { reason }
            }
        }
    }

    /// 按时间范围查询（不含边界）
    ///
    /// 返回的查询是延迟执行的，每次迭代都会重新访问存储。
    pub fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ServiceResult<LedgerQuery> {
        self.range_query(start, end, QUERY_ORIGIN)
    }

    fn range_query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        origin: &str,
    ) -> ServiceResult<LedgerQuery> {
        if is_sentinel(start) || is_sentinel(end) {
            return Err(
                ServiceError::new(ErrorKind::OutOfRange, origin, StatusCode::BAD_REQUEST)
                    .with_detail("Minimum and maximum timestamps are not valid query bounds"),
            );
        }
        debug!(
            "Ledger query: partition={}, start={}, end={}",
            self.application, start, end
        );
        Ok(LedgerQuery::new(
            self.storage.clone(),
            RangeFilter {
                partition_key: self.application.clone(),
                start,
                end,
                page_size: self.page_size,
            },
        ))
    }

    /// 删除一条记录
    pub async fn delete_by_key(&self, key: &str) -> ServiceResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage
            .delete(&self.application, key)
            .await
            .map_err(|e| {
                record_failure("delete");
                ServiceError::storage_failure(DELETE_ORIGIN, e.envelope())
            })?;
        info!("Ledger entry deleted: {}/{}", self.application, key);
        Ok(())
    }

    /// 删除时间范围内（不含边界）的全部记录，返回删除前统计的条数
    ///
    /// 条数在批量删除执行前得出，批次部分失败时不会修正。
    /// 统计阶段不持有写锁：期间被并发删除的键会让 SQLite 批次整体回滚并返回 `ResourceNotFound`。
    pub async fn delete_by_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ServiceResult<u64> {
        let keys = self
            .range_query(start, end, DELETE_RANGE_ORIGIN)?
            .row_keys()
            .await?;
        let count = keys.len() as u64;
        if keys.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        self.storage
            .delete_batch(&self.application, &keys)
            .await
            .map_err(|e| {
                record_failure("delete_range");
                ServiceError::storage_failure(DELETE_RANGE_ORIGIN, e.envelope())
            })?;
        info!(
            "Ledger range deleted: partition={}, start={}, end={}, count={}",
            self.application, start, end, count
        );
        Ok(count)
    }

    /// 删除整张表
    ///
    /// 表在下一次 `open` 时才会重建，期间所有写入都会被丢弃。
    pub async fn purge(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        match self.storage.drop_table().await {
            Ok(()) => {
                warn!("Ledger table purged; restart required to recreate it");
                true
            }
            Err(e) => {
                record_failure("purge");
                warn!("Ledger purge failed: {} ({})", e, e.envelope());
                false
            }
        }
    }
}

/// 组装记录正文：`[KIND: ][: (- source -) ][: (id-who -) ]message`
pub fn compose_message(kind: ErrorKind, message: &str, source: &str, who: &str) -> String {
    let mut text = String::new();
    if kind != ErrorKind::Ok {
        text.push_str(kind.name());
        text.push_str(": ");
    }
    if !source.is_empty() {
        text.push_str(": (- ");
        text.push_str(source);
        text.push_str(" -) ");
    }
    if !who.is_empty() {
        text.push_str(": (id-");
        text.push_str(who);
        text.push_str(" -) ");
    }
    text.push_str(message);
    text
}
