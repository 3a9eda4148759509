//! sourcelinks 配置
//!
//! 从 TOML 文件加载，`validate()` 返回人类可读的问题列表，
//! 以 "Warning:" 开头的条目不阻止启动。

use ledger::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// 应用主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcelinksConfig {
    /// 实例名称
    #[serde(default = "default_name")]
    pub name: String,

    /// 运行环境（dev / prod / test）
    #[serde(default = "default_env")]
    pub env: String,

    /// HTTP 监听配置
    #[serde(default)]
    pub http: HttpConfig,

    /// 账本配置
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// 链接目录，键为 `target` 查询参数
    #[serde(default)]
    pub links: BTreeMap<String, LinkConfig>,

    /// 可观测性配置
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP 监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// 错误响应是否使用安全视图
    ///
    /// - false（默认）：返回完整描述和详情
    /// - true：只返回固定的通用消息，错误码和来源仍然可见
    #[serde(default)]
    pub safe_errors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            safe_errors: false,
        }
    }
}

impl HttpConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .ip
            .parse()
            .map_err(|e| format!("Invalid http.ip '{}': {e}", self.ip))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// 单个链接目标
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// 主机名（不带结尾分隔符）
    pub host: String,

    /// 路径（带前导分隔符，不带结尾分隔符）
    #[serde(default)]
    pub path: String,

    /// 参数（带前导分隔符）
    #[serde(default)]
    pub parameter: String,

    /// 是否需要授权令牌
    #[serde(default)]
    pub auth: bool,
}

/// 可观测性配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ObservabilityConfig {
    /// 过滤级别
    ///
    /// 支持 EnvFilter 语法（如 "info,sqlx=warn"）。默认值 "info"。
    #[serde(default = "default_filter_level")]
    pub filter_level: String,

    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    /// 日志输出目标："console"（默认）或 "file"
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 当 output = "file" 时是否按天轮转
    #[serde(default)]
    pub rotate: bool,

    /// 日志文件目录
    #[serde(default = "default_log_path")]
    pub path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter_level: default_filter_level(),
            log: LogConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: default_log_output(),
            rotate: false,
            path: default_log_path(),
        }
    }
}

impl Default for SourcelinksConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            env: default_env(),
            http: HttpConfig::default(),
            ledger: LedgerConfig::default(),
            links: BTreeMap::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_name() -> String {
    "sourcelinks-01".to_string()
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7071
}

fn default_filter_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "console".to_string()
}

fn default_log_path() -> String {
    "logs/".to_string()
}

impl SourcelinksConfig {
    /// 从 TOML 文件加载配置，并应用环境变量覆盖
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(format!("Configuration file does not exist: {path_ref:?}").into());
        }
        if !path_ref.is_file() {
            return Err(format!("Path is not a valid file: {path_ref:?}").into());
        }

        let content = std::fs::read_to_string(path_ref)?;
        let mut config = Self::from_toml(&content)?;
        config.ledger.apply_env_overrides();
        Ok(config)
    }

    /// 从 TOML 字符串加载配置（不应用环境变量）
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 查找链接目标
    pub fn link(&self, target: &str) -> Option<&LinkConfig> {
        self.links.get(target)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Instance name cannot be empty".to_string());
        }
        if !matches!(self.env.as_str(), "dev" | "prod" | "test") {
            errors.push(format!(
                "Invalid env '{}': must be one of dev, prod, test",
                self.env
            ));
        }

        if let Err(e) = self.http.socket_addr() {
            errors.push(e);
        }
        if self.http.port == 0 {
            errors.push("http.port cannot be 0".to_string());
        }
        if self.env == "prod" && !self.http.safe_errors {
            errors.push(
                "Warning: http.safe_errors is false in prod, error details are exposed to clients"
                    .to_string(),
            );
        }

        if let Err(ledger_errors) = self.ledger.validate() {
            errors.extend(ledger_errors);
        }

        if self.links.is_empty() {
            errors.push("Warning: no [links] configured, every target lookup will fail".to_string());
        }
        for (target, link) in &self.links {
            if link.host.trim().is_empty() {
                errors.push(format!("links.{target}.host cannot be empty"));
            }
            if link.host.ends_with('/') {
                errors.push(format!(
                    "Warning: links.{target}.host should not end with a delimiter"
                ));
            }
            if !link.path.is_empty() && !link.path.starts_with('/') {
                errors.push(format!(
                    "Warning: links.{target}.path should start with a delimiter"
                ));
            }
        }

        if !matches!(self.observability.log.output.as_str(), "console" | "file") {
            errors.push(format!(
                "Invalid observability.log.output '{}': must be console or file",
                self.observability.log.output
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SAMPLE: &str = r#"
        name = "links-test"
        env = "test"

        [http]
        ip = "127.0.0.1"
        port = 8088
        safe_errors = true

        [ledger]
        application_name = "sourcelinks"
        max_severity = 5

        [ledger.storage]
        backend = "sqlite"

        [ledger.storage.sqlite]
        path = "database/ledger.db"

        [links.myhost]
        host = "https://api.example.com"
        path = "/v1/things"
        parameter = "?code="
        auth = true
    "#;

    #[test]
    fn test_parse_sample() {
        let config = SourcelinksConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.name, "links-test");
        assert!(config.http.safe_errors);
        assert_eq!(
            config.http.socket_addr().unwrap(),
            "127.0.0.1:8088".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.ledger.application_name, "sourcelinks");
        assert_eq!(config.ledger.max_severity, 5);

        let link = config.link("myhost").unwrap();
        assert_eq!(link.host, "https://api.example.com");
        assert!(link.auth);
        assert!(config.link("other").is_none());

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults_only_warn() {
        let errors = SourcelinksConfig::default().validate().unwrap_err();
        assert!(errors.iter().all(|e| e.starts_with("Warning:")));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = SourcelinksConfig::from_toml(SAMPLE).unwrap();
        config.env = "staging".into();
        config.http.ip = "not-an-ip".into();
        config.links.insert("broken".into(), LinkConfig::default());
        config.observability.log.output = "syslog".into();

        let errors = config.validate().unwrap_err();
        let fatal: Vec<_> = errors.iter().filter(|e| !e.starts_with("Warning:")).collect();
        assert_eq!(fatal.len(), 4);
    }

    #[test]
    fn test_missing_file() {
        assert!(SourcelinksConfig::from_file("/nonexistent/config.toml").is_err());
    }

    #[test]
    #[serial]
    fn test_from_file_applies_ledger_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        unsafe {
            std::env::set_var(ledger::config::ENV_MAX_SEVERITY, "2");
        }
        let config = SourcelinksConfig::from_file(&path).unwrap();
        unsafe {
            std::env::remove_var(ledger::config::ENV_MAX_SEVERITY);
        }

        assert_eq!(config.ledger.application_name, "sourcelinks");
        assert_eq!(config.ledger.max_severity, 2);
    }
}
