//! 表存储服务连接字符串解析

use crate::error::{StoreError, StoreResult};
use base64::prelude::*;
use reqwest::Url;

/// 本地模拟器的固定账号
pub const DEVELOPMENT_ACCOUNT: &str = "devstoreaccount1";

/// 本地模拟器的公开密钥
pub const DEVELOPMENT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// 本地模拟器的表服务地址
pub const DEVELOPMENT_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// 解析后的存储账号
#[derive(Clone)]
pub struct StorageAccount {
    pub name: String,
    key: Vec<u8>,
    pub endpoint: Url,
}

impl std::fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl StorageAccount {
    /// 直接构造账号
    ///
    /// # Arguments
    /// * `name` - 账号名
    /// * `key` - Base64 编码的账号密钥
    /// * `endpoint` - 表服务根地址
    pub fn new(name: &str, key: &str, endpoint: &str) -> StoreResult<Self> {
        let key = BASE64_STANDARD
            .decode(key.trim())
            .map_err(|e| StoreError::Config(format!("AccountKey is not valid base64: {e}")))?;
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| StoreError::Config(format!("Invalid table endpoint '{endpoint}': {e}")))?;
        Ok(Self {
            name: name.to_string(),
            key,
            endpoint,
        })
    }

    /// 解析连接字符串
    ///
    /// 支持 `UseDevelopmentStorage=true` 以及
    /// `DefaultEndpointsProtocol=..;AccountName=..;AccountKey=..;[EndpointSuffix=..];[TableEndpoint=..]`
    pub fn parse(connection_string: &str) -> StoreResult<Self> {
        let mut protocol = "https";
        let mut name = None;
        let mut key = None;
        let mut suffix = DEFAULT_ENDPOINT_SUFFIX;
        let mut table_endpoint = None;

        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((field, value)) = part.split_once('=') else {
                return Err(StoreError::Config(format!(
                    "Malformed connection string segment '{part}'"
                )));
            };
            match field.trim() {
                "UseDevelopmentStorage" if value.trim().eq_ignore_ascii_case("true") => {
                    return Self::new(DEVELOPMENT_ACCOUNT, DEVELOPMENT_KEY, DEVELOPMENT_ENDPOINT);
                }
                "DefaultEndpointsProtocol" => protocol = value.trim(),
                "AccountName" => name = Some(value.trim()),
                // 密钥的 base64 填充里有 '='，split_once 只切第一个
                "AccountKey" => key = Some(value.trim()),
                "EndpointSuffix" => suffix = value.trim(),
                "TableEndpoint" => table_endpoint = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let name =
            name.ok_or_else(|| StoreError::Config("Connection string lacks AccountName".into()))?;
        let key =
            key.ok_or_else(|| StoreError::Config("Connection string lacks AccountKey".into()))?;
        let endpoint =
            table_endpoint.unwrap_or_else(|| format!("{protocol}://{name}.table.{suffix}"));
        Self::new(name, key, &endpoint)
    }

    /// 解码后的账号密钥
    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }
}
