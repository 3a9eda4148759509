//! 账本配置
//!
//! 应用名称、表名、严重级别阈值以及存储后端的选择

use crate::severity::{SeverityFilter, UNFILTERED};
use serde::{Deserialize, Serialize};

/// 覆盖 `application_name` 的环境变量
pub const ENV_APPLICATION_NAME: &str = "LEDGER_APPLICATION_NAME";

/// 覆盖 `max_severity` 的环境变量，无法解析时视为 -1
pub const ENV_MAX_SEVERITY: &str = "LEDGER_MAX_SEVERITY";

/// 表存储服务单次查询最多返回的记录数
pub const MAX_PAGE_SIZE: u32 = 1000;

/// 账本配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// 应用名称，同时作为分区键
    ///
    /// 共用同一存储的多个应用依靠它隔离各自的日志。
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// 日志表名称
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// 最大严重级别
    ///
    /// 只有级别数值小于等于此值的记录会被写入；-1 表示全部写入。
    #[serde(default = "default_max_severity")]
    pub max_severity: i32,

    /// 查询分页大小
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// 存储后端配置
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            application_name: default_application_name(),
            table_name: default_table_name(),
            max_severity: default_max_severity(),
            page_size: default_page_size(),
            storage: StorageConfig::default(),
        }
    }
}

fn default_application_name() -> String {
    "UnknownApplication".to_string()
}

fn default_table_name() -> String {
    "LogLedger".to_string()
}

fn default_max_severity() -> i32 {
    UNFILTERED
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

/// 存储配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 存储后端类型
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite 配置（当 backend = "sqlite" 时使用，缺省取默认路径）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<SqliteConfig>,

    /// 表存储服务配置（当 backend = "table" 时必需）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableConfig>,
}

/// 存储后端类型枚举
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 本地 SQLite 数据库
    #[default]
    Sqlite,
    /// 表存储服务（HTTP）
    Table,
}

/// SQLite 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// 数据库文件路径
    #[serde(default = "default_sqlite_path")]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> String {
    "database/ledger.db".to_string()
}

/// 表存储服务配置
///
/// 连接字符串可以直接写在配置里，也可以从环境变量读取（直接配置优先）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableConfig {
    /// 连接字符串
    ///
    /// 格式：`DefaultEndpointsProtocol=https;AccountName=..;AccountKey=..;EndpointSuffix=core.windows.net`，
    /// 或本地模拟器 `UseDevelopmentStorage=true`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// 保存连接字符串的环境变量名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string_env: Option<String>,
}

impl TableConfig {
    /// 解析最终使用的连接字符串
    pub fn resolve_connection_string(&self) -> Result<String, String> {
        if let Some(conn) = self.connection_string.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(conn.clone());
        }
        if let Some(var) = &self.connection_string_env {
            return std::env::var(var)
                .map_err(|_| format!("Environment variable {var} is not set"))
                .and_then(|value| {
                    if value.trim().is_empty() {
                        Err(format!("Environment variable {var} is empty"))
                    } else {
                        Ok(value)
                    }
                });
        }
        Err("Table storage requires connection_string or connection_string_env".to_string())
    }
}

/// 检查表名是否符合表存储服务的命名规则
///
/// 以字母开头，只含字母和数字，长度 3–63。SQLite 后端也依赖这一点把表名直接拼进 SQL。
pub fn validate_table_name(name: &str) -> Result<(), String> {
    let valid_len = (3..=63).contains(&name.len());
    let starts_alpha = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let alnum = name.chars().all(|c| c.is_ascii_alphanumeric());
    if valid_len && starts_alpha && alnum {
        Ok(())
    } else {
        Err(format!(
            "Invalid table name '{name}': must be 3-63 alphanumeric characters starting with a letter"
        ))
    }
}

/// 检查应用名称能否作为分区键
pub fn validate_application_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Application name cannot be empty".to_string());
    }
    if name.len() > 1024 {
        return Err("Application name must not exceed 1024 bytes".to_string());
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(format!(
            "Application name '{name}' contains forbidden character {c:?}"
        ));
    }
    Ok(())
}

impl LedgerConfig {
    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var(ENV_APPLICATION_NAME)
            && !name.trim().is_empty()
        {
            self.application_name = name;
        }
        if let Ok(level) = std::env::var(ENV_MAX_SEVERITY) {
            self.max_severity = level.trim().parse().unwrap_or(UNFILTERED);
        }
    }

    /// 构造写入阈值
    pub fn severity_filter(&self) -> SeverityFilter {
        SeverityFilter::new(self.max_severity)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = validate_application_name(&self.application_name) {
            errors.push(e);
        }
        if self.application_name == default_application_name() {
            errors.push(
                "Warning: ledger.application_name is not set, entries go to the UnknownApplication partition"
                    .to_string(),
            );
        }
        if let Err(e) = validate_table_name(&self.table_name) {
            errors.push(e);
        }
        if self.max_severity < UNFILTERED {
            errors.push(format!(
                "Invalid max_severity {}: must be -1 (unfiltered) or a severity level",
                self.max_severity
            ));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            errors.push(format!(
                "Invalid page_size {}: must be between 1 and {MAX_PAGE_SIZE}",
                self.page_size
            ));
        }

        match self.storage.backend {
            StorageBackend::Sqlite => {
                if let Some(sqlite) = &self.storage.sqlite
                    && sqlite.path.trim().is_empty()
                {
                    errors.push("SQLite ledger path cannot be empty".to_string());
                }
            }
            StorageBackend::Table => match &self.storage.table {
                Some(table) => {
                    if let Err(e) = table.resolve_connection_string() {
                        errors.push(e);
                    }
                }
                None => errors.push(
                    "Ledger is configured to use table storage but [ledger.storage.table] is missing"
                        .to_string(),
                ),
            },
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
