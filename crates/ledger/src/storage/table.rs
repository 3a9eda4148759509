//! 表存储服务（HTTP）后端实现
//!
//! 通过 REST 接口访问表存储服务，使用 SharedKeyLite 签名。
//! 响应格式固定为 `application/json;odata=nometadata`。

use crate::config::validate_table_name;
use crate::entry::{LogEntry, NewEntry};
use crate::error::{StoreError, StoreResult};
use crate::storage::backend::LedgerBackend;
use crate::storage::connection::StorageAccount;
use crate::storage::{Continuation, Page, RangeFilter};
use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 请求使用的服务版本
pub const SERVICE_VERSION: &str = "2019-02-02";

/// 单个批次最多包含的操作数
pub const MAX_BATCH_OPERATIONS: usize = 100;

const ACCEPT_NO_METADATA: &str = "application/json;odata=nometadata";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const NEXT_PARTITION_KEY: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY: &str = "x-ms-continuation-nextrowkey";

/// 表存储服务后端
#[derive(Clone)]
pub struct TableBackend {
    client: reqwest::Client,
    account: StorageAccount,
    table: String,
}

impl std::fmt::Debug for TableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableBackend")
            .field("account", &self.account)
            .field("table", &self.table)
            .finish()
    }
}

/// 写入表存储服务的实体
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InsertEntity<'a> {
    partition_key: &'a str,
    row_key: &'a str,
    severity: i32,
    message: &'a str,
}

/// 查询返回的实体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueriedEntity {
    partition_key: String,
    row_key: String,
    #[serde(default)]
    severity: i32,
    #[serde(default)]
    message: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    value: Vec<QueriedEntity>,
}

impl From<QueriedEntity> for LogEntry {
    fn from(entity: QueriedEntity) -> Self {
        Self {
            partition_key: entity.partition_key,
            row_key: entity.row_key,
            severity: entity.severity,
            message: entity.message,
            timestamp: entity.timestamp,
        }
    }
}

impl TableBackend {
    /// 创建新的表存储服务后端
    ///
    /// 只构造客户端，不访问网络。
    pub fn new(account: StorageAccount, table: &str) -> StoreResult<Self> {
        validate_table_name(table).map_err(StoreError::Config)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        info!(
            "Table ledger configured: endpoint={}, account={}, table={}",
            account.endpoint, account.name, table
        );

        Ok(Self {
            client,
            account,
            table: table.to_string(),
        })
    }

    /// 拼接资源地址，`resource` 不带前导斜杠
    fn url(&self, resource: &str) -> StoreResult<Url> {
        let base = self.account.endpoint.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/{resource}"))
            .map_err(|e| StoreError::Config(format!("Invalid resource url for {resource}: {e}")))
    }

    /// 构造带签名的请求
    fn request(&self, method: Method, url: Url) -> StoreResult<RequestBuilder> {
        let date = http_date(Utc::now());
        let signature = sign(&self.account, &date, &url)?;
        Ok(self
            .client
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", SERVICE_VERSION)
            .header("Accept", ACCEPT_NO_METADATA)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION)
            .header(
                "Authorization",
                format!("SharedKeyLite {}:{signature}", self.account.name),
            ))
    }

    fn entity_resource(&self, partition_key: &str, row_key: &str) -> String {
        format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table,
            escape_key(partition_key),
            escape_key(row_key)
        )
    }

    async fn execute_batch(&self, partition_key: &str, row_keys: &[String]) -> StoreResult<()> {
        let batch_id = uuid::Uuid::new_v4();
        let changeset_id = uuid::Uuid::new_v4();
        let targets = row_keys
            .iter()
            .map(|row_key| self.url(&self.entity_resource(partition_key, row_key)))
            .collect::<StoreResult<Vec<_>>>()?;
        let body = batch_delete_body(&batch_id.to_string(), &changeset_id.to_string(), &targets);

        let response = self
            .request(Method::POST, self.url("$batch")?)?
            .header(
                "Content-Type",
                format!("multipart/mixed; boundary=batch_{batch_id}"),
            )
            .body(body)
            .send()
            .await?;
        let response = check(response).await?;

        // 批次整体返回 202，失败的操作藏在响应体里
        let text = response.text().await?;
        if let Some(status) = first_failed_status(&text) {
            return Err(StoreError::Rejected { status, body: text });
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerBackend for TableBackend {
    async fn ensure_table(&self) -> StoreResult<()> {
        let response = self
            .request(Method::POST, self.url("Tables")?)?
            .header("Prefer", "return-no-content")
            .json(&serde_json::json!({ "TableName": self.table }))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Table {} already exists", self.table);
            return Ok(());
        }
        check(response).await?;
        info!("Table {} created", self.table);
        Ok(())
    }

    async fn insert(&self, entry: &NewEntry) -> StoreResult<()> {
        let entity = InsertEntity {
            partition_key: &entry.partition_key,
            row_key: &entry.row_key,
            severity: entry.severity,
            message: &entry.message,
        };
        let response = self
            .request(Method::POST, self.url(&self.table)?)?
            .header("Prefer", "return-no-content")
            .json(&entity)
            .send()
            .await?;
        check(response).await?;
        debug!("Inserted ledger entry {}/{}", entry.partition_key, entry.row_key);
        Ok(())
    }

    async fn query_page(
        &self,
        filter: &RangeFilter,
        continuation: Option<&Continuation>,
    ) -> StoreResult<Page> {
        let mut url = self.url(&format!("{}()", self.table))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("$filter", &range_filter_expression(filter));
            pairs.append_pair("$top", &filter.page_size.to_string());
            if let Some(next) = continuation {
                pairs.append_pair("NextPartitionKey", &next.next_partition_key);
                if let Some(row_key) = &next.next_row_key {
                    pairs.append_pair("NextRowKey", row_key);
                }
            }
        }

        let response = check(self.request(Method::GET, url)?.send().await?).await?;
        let headers = response.headers();
        let next_partition = headers
            .get(NEXT_PARTITION_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let next_row = headers
            .get(NEXT_ROW_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("Unreadable query response: {e}")))?;

        Ok(Page {
            entries: body.value.into_iter().map(LogEntry::from).collect(),
            continuation: next_partition.map(|next_partition_key| Continuation {
                next_partition_key,
                next_row_key: next_row,
            }),
        })
    }

    async fn delete(&self, partition_key: &str, row_key: &str) -> StoreResult<()> {
        let response = self
            .request(
                Method::DELETE,
                self.url(&self.entity_resource(partition_key, row_key))?,
            )?
            .header("If-Match", "*")
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_batch(&self, partition_key: &str, row_keys: &[String]) -> StoreResult<()> {
        for chunk in row_keys.chunks(MAX_BATCH_OPERATIONS) {
            self.execute_batch(partition_key, chunk).await?;
        }
        debug!(
            "Deleted {} ledger entries from partition {}",
            row_keys.len(),
            partition_key
        );
        Ok(())
    }

    async fn drop_table(&self) -> StoreResult<()> {
        let resource = format!("Tables('{}')", self.table);
        let response = self
            .request(Method::DELETE, self.url(&resource)?)?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("Table {} did not exist when dropped", self.table);
            return Ok(());
        }
        check(response).await?;
        info!("Table {} dropped", self.table);
        Ok(())
    }
}

/// 非 2xx 响应转换为 `Rejected`，保留响应体以便展开错误信封
async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// RFC 1123 格式的请求时间
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// SharedKeyLite 签名
///
/// StringToSign = `x-ms-date` + "\n" + "/" + 账号 + 编码后的路径
fn sign(account: &StorageAccount, date: &str, url: &Url) -> StoreResult<String> {
    let string_to_sign = format!("{date}\n/{}{}", account.name, url.path());
    let mut mac = Hmac::<Sha256>::new_from_slice(account.key())
        .map_err(|e| StoreError::Config(format!("Invalid account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// 键值中的单引号需要双写
fn escape_key(key: &str) -> String {
    key.replace('\'', "''")
}

/// 分区 + 时间范围的 OData 过滤表达式（不含边界）
pub fn range_filter_expression(filter: &RangeFilter) -> String {
    format!(
        "PartitionKey eq '{}' and (Timestamp gt datetime'{}' and Timestamp lt datetime'{}')",
        escape_key(&filter.partition_key),
        odata_datetime(filter.start, false),
        odata_datetime(filter.end, true)
    )
}

/// 按服务端 100ns 精度格式化时间（7 位小数）
///
/// `round_up` 时把亚 tick 余数进位，用于不含边界的上限。
fn odata_datetime(at: DateTime<Utc>, round_up: bool) -> String {
    let remainder = at.timestamp_subsec_nanos() % 100;
    let at = if round_up && remainder != 0 {
        at + chrono::Duration::nanoseconds(i64::from(100 - remainder))
    } else {
        at
    };
    format!(
        "{}.{:07}Z",
        at.format("%Y-%m-%dT%H:%M:%S"),
        at.timestamp_subsec_nanos() / 100
    )
}

/// 构造批量删除的 multipart 请求体
pub fn batch_delete_body(batch_id: &str, changeset_id: &str, targets: &[Url]) -> String {
    let mut body = format!(
        "--batch_{batch_id}\r\nContent-Type: multipart/mixed; boundary=changeset_{changeset_id}\r\n\r\n"
    );
    for target in targets {
        body.push_str(&format!(
            "--changeset_{changeset_id}\r\n\
             Content-Type: application/http\r\n\
             Content-Transfer-Encoding: binary\r\n\r\n\
             DELETE {target} HTTP/1.1\r\n\
             Accept: {ACCEPT_NO_METADATA}\r\n\
             DataServiceVersion: {DATA_SERVICE_VERSION}\r\n\
             If-Match: *\r\n\r\n"
        ));
    }
    body.push_str(&format!("--changeset_{changeset_id}--\r\n--batch_{batch_id}--\r\n"));
    body
}

/// 在批量响应中查找第一个非 2xx 的内部状态码
fn first_failed_status(body: &str) -> Option<u16> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("HTTP/1.1 "))
        .filter_map(|rest| rest.split_whitespace().next()?.parse::<u16>().ok())
        .find(|status| !(200..300).contains(status))
}
