//! SQLite 存储后端实现
//!
//! 使用 sqlx 提供原生异步 SQLite 存储支持

use crate::config::{SqliteConfig, validate_table_name};
use crate::entry::{LogEntry, NewEntry};
use crate::error::{StoreError, StoreResult};
use crate::storage::backend::LedgerBackend;
use crate::storage::{Continuation, Page, RangeFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// SQLite 存储后端
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    table: String,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("table", &self.table)
            .finish()
    }
}

type EntryRow = (String, String, i64, String, i64);

impl SqliteBackend {
    /// 创建新的 SQLite 后端实例
    ///
    /// 只建立连接，不创建表。
    ///
    /// # Arguments
    /// * `config` - SQLite 配置（数据库文件路径）
    /// * `table` - 表名，必须通过 [`validate_table_name`]
    pub async fn new(config: &SqliteConfig, table: &str) -> StoreResult<Self> {
        validate_table_name(table).map_err(StoreError::Config)?;

        let file = Path::new(&config.path);
        if let Some(parent) = file.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Config(format!(
                    "Failed to create ledger directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        // 创建连接选项并启用 WAL 模式
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", file.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        info!(
            "SQLite ledger connected: path={}, table={}, WAL mode enabled",
            file.display(),
            table
        );

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    fn into_entry(row: EntryRow) -> StoreResult<LogEntry> {
        let (partition_key, row_key, severity, message, micros) = row;
        let timestamp = DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
            StoreError::InvalidResponse(format!("Timestamp out of range for row {row_key}"))
        })?;
        Ok(LogEntry {
            partition_key,
            row_key,
            severity: severity as i32,
            message,
            timestamp,
        })
    }
}

#[async_trait]
impl LedgerBackend for SqliteBackend {
    async fn ensure_table(&self) -> StoreResult<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                partition_key TEXT NOT NULL,
                row_key TEXT NOT NULL,
                severity INTEGER NOT NULL,
                message TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                PRIMARY KEY (partition_key, row_key)
            )
            "#,
            self.table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_timestamp ON {0}(partition_key, timestamp)",
            self.table
        ))
        .execute(&self.pool)
        .await?;

        debug!("SQLite ledger table {} initialized", self.table);
        Ok(())
    }

    async fn insert(&self, entry: &NewEntry) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO {} (partition_key, row_key, severity, message, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            self.table
        ))
        .bind(&entry.partition_key)
        .bind(&entry.row_key)
        .bind(i64::from(entry.severity))
        .bind(&entry.message)
        .bind(Utc::now().timestamp_micros())
        .execute(&self.pool)
        .await?;

        debug!("Inserted ledger entry {}/{}", entry.partition_key, entry.row_key);
        Ok(())
    }

    async fn query_page(
        &self,
        filter: &RangeFilter,
        continuation: Option<&Continuation>,
    ) -> StoreResult<Page> {
        let after = continuation
            .and_then(|c| c.next_row_key.as_deref())
            .unwrap_or("");

        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            r#"SELECT partition_key, row_key, severity, message, timestamp FROM {}
               WHERE partition_key = ?1 AND timestamp > ?2 AND timestamp < ?3 AND row_key > ?4
               ORDER BY row_key LIMIT ?5"#,
            self.table
        ))
        .bind(&filter.partition_key)
        .bind(filter.start.timestamp_micros())
        .bind(exclusive_end_micros(filter.end))
        .bind(after)
        .bind(i64::from(filter.page_size))
        .fetch_all(&self.pool)
        .await?;

        let full = rows.len() as u64 == u64::from(filter.page_size);
        let entries = rows
            .into_iter()
            .map(Self::into_entry)
            .collect::<StoreResult<Vec<_>>>()?;

        let continuation = if full {
            entries.last().map(|last| Continuation {
                next_partition_key: last.partition_key.clone(),
                next_row_key: Some(last.row_key.clone()),
            })
        } else {
            None
        };

        Ok(Page {
            entries,
            continuation,
        })
    }

    async fn delete(&self, partition_key: &str, row_key: &str) -> StoreResult<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE partition_key = ?1 AND row_key = ?2",
            self.table
        ))
        .bind(partition_key)
        .bind(row_key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntityNotFound {
                partition_key: partition_key.to_string(),
                row_key: row_key.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_batch(&self, partition_key: &str, row_keys: &[String]) -> StoreResult<()> {
        // 与表存储服务的批次语义一致：任何一条失败则整批回滚
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "DELETE FROM {} WHERE partition_key = ?1 AND row_key = ?2",
            self.table
        );
        for row_key in row_keys {
            let result = sqlx::query(&sql)
                .bind(partition_key)
                .bind(row_key)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(StoreError::EntityNotFound {
                    partition_key: partition_key.to_string(),
                    row_key: row_key.clone(),
                });
            }
        }
        tx.commit().await?;

        debug!(
            "Deleted {} ledger entries from partition {}",
            row_keys.len(),
            partition_key
        );
        Ok(())
    }

    async fn drop_table(&self) -> StoreResult<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", self.table))
            .execute(&self.pool)
            .await?;
        info!("SQLite ledger table {} dropped", self.table);
        Ok(())
    }
}

/// 不含边界的上限换算成微秒：有亚微秒余数时向上取整，避免截断后漏掉更早的记录
fn exclusive_end_micros(end: DateTime<Utc>) -> i64 {
    let micros = end.timestamp_micros();
    if end.timestamp_subsec_nanos() % 1_000 != 0 {
        micros.saturating_add(1)
    } else {
        micros
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::row_key;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn create_test_backend() -> (SqliteBackend, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = SqliteConfig {
            path: temp_dir
                .path()
                .join("nested")
                .join("ledger.db")
                .display()
                .to_string(),
        };
        let backend = SqliteBackend::new(&config, "LogLedger").await.unwrap();
        backend.ensure_table().await.unwrap();
        (backend, temp_dir)
    }

    fn entry(partition: &str, key: &str, message: &str) -> NewEntry {
        NewEntry {
            partition_key: partition.into(),
            row_key: key.into(),
            severity: 5,
            message: message.into(),
        }
    }

    fn window(partition: &str, page_size: u32) -> RangeFilter {
        let now = Utc::now();
        RangeFilter {
            partition_key: partition.into(),
            start: now - Duration::hours(1),
            end: now + Duration::hours(1),
            page_size,
        }
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.ensure_table().await.unwrap();
        backend.ensure_table().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.insert(&entry("app", "0000000000000000002", "b")).await.unwrap();
        backend.insert(&entry("app", "0000000000000000001", "a")).await.unwrap();
        backend.insert(&entry("other", "0000000000000000003", "c")).await.unwrap();

        let page = backend.query_page(&window("app", 10), None).await.unwrap();
        assert!(page.continuation.is_none());
        let messages: Vec<_> = page.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert_eq!(page.entries[0].severity, 5);
    }

    #[tokio::test]
    async fn test_duplicate_row_key_rejected() {
        let (backend, _temp_dir) = create_test_backend().await;
        let key = row_key(Utc::now());
        backend.insert(&entry("app", &key, "first")).await.unwrap();
        let err = backend.insert(&entry("app", &key, "second")).await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn test_paging_with_continuation() {
        let (backend, _temp_dir) = create_test_backend().await;
        for i in 0..5 {
            backend
                .insert(&entry("app", &format!("{i:019}"), &format!("m{i}")))
                .await
                .unwrap();
        }

        let filter = window("app", 2);
        let mut continuation = None;
        let mut seen = Vec::new();
        loop {
            let page = backend
                .query_page(&filter, continuation.as_ref())
                .await
                .unwrap();
            seen.extend(page.entries.into_iter().map(|e| e.message));
            match page.continuation {
                Some(next) => continuation = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_range_bounds_are_exclusive() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.insert(&entry("app", "0000000000000000001", "a")).await.unwrap();

        let page = backend.query_page(&window("app", 10), None).await.unwrap();
        let stamp = page.entries[0].timestamp;

        let filter = RangeFilter {
            partition_key: "app".into(),
            start: stamp,
            end: stamp + Duration::hours(1),
            page_size: 10,
        };
        let page = backend.query_page(&filter, None).await.unwrap();
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn test_end_bound_below_one_microsecond() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.insert(&entry("app", "0000000000000000001", "a")).await.unwrap();

        let page = backend.query_page(&window("app", 10), None).await.unwrap();
        let stamp = page.entries[0].timestamp;

        // 上限只比记录晚 500ns，记录仍在范围内
        let mut filter = RangeFilter {
            partition_key: "app".into(),
            start: stamp - Duration::hours(1),
            end: stamp + Duration::nanoseconds(500),
            page_size: 10,
        };
        let page = backend.query_page(&filter, None).await.unwrap();
        assert_eq!(page.entries.len(), 1);

        filter.end = stamp;
        let page = backend.query_page(&filter, None).await.unwrap();
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_exclusive_end_micros() {
        let at = DateTime::from_timestamp(1_700_000_000, 475_411_000).unwrap();
        assert_eq!(exclusive_end_micros(at), at.timestamp_micros());
        let later = DateTime::from_timestamp(1_700_000_000, 475_411_500).unwrap();
        assert_eq!(exclusive_end_micros(later), at.timestamp_micros() + 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.insert(&entry("app", "0000000000000000001", "a")).await.unwrap();

        backend.delete("app", "0000000000000000001").await.unwrap();
        let err = backend.delete("app", "0000000000000000001").await.unwrap_err();
        assert!(matches!(err, StoreError::EntityNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_batch_rolls_back_on_missing_key() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.insert(&entry("app", "0000000000000000001", "a")).await.unwrap();
        backend.insert(&entry("app", "0000000000000000002", "b")).await.unwrap();

        let keys = vec![
            "0000000000000000001".to_string(),
            "0000000000000000009".to_string(),
        ];
        assert!(backend.delete_batch("app", &keys).await.is_err());
        let page = backend.query_page(&window("app", 10), None).await.unwrap();
        assert_eq!(page.entries.len(), 2);

        let keys = vec![
            "0000000000000000001".to_string(),
            "0000000000000000002".to_string(),
        ];
        backend.delete_batch("app", &keys).await.unwrap();
        let page = backend.query_page(&window("app", 10), None).await.unwrap();
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn test_drop_table() {
        let (backend, _temp_dir) = create_test_backend().await;
        backend.drop_table().await.unwrap();
        backend.drop_table().await.unwrap();
        assert!(backend.query_page(&window("app", 10), None).await.is_err());
        assert!(backend.insert(&entry("app", "0000000000000000001", "a")).await.is_err());
    }
}
