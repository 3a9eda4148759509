//! 成功响应体

use crate::config::LinkConfig;
use axum::{
    Json,
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// 链接目录查询结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiLinkResponse {
    /// 主机名（不带结尾分隔符）
    pub host: String,
    /// 路径（带前导分隔符）
    pub path: String,
    /// 参数（带前导分隔符）
    pub parameter: String,
    /// 是否需要授权令牌
    pub auth: bool,
}

impl From<&LinkConfig> for ApiLinkResponse {
    fn from(link: &LinkConfig) -> Self {
        Self {
            host: link.host.clone(),
            path: link.path.clone(),
            parameter: link.parameter.clone(),
            auth: link.auth,
        }
    }
}

impl IntoResponse for ApiLinkResponse {
    /// 附带禁止缓存的头：`Expires` 为一年前，`Cache-Control: no-cache, no-store`
    fn into_response(self) -> Response {
        let mut response = Json(self).into_response();
        let headers = response.headers_mut();
        if let Ok(expires) = HeaderValue::from_str(&expired_date(Utc::now())) {
            headers.insert(header::EXPIRES, expires);
        }
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store"),
        );
        response
    }
}

/// 一年前的 RFC 1123 时间
fn expired_date(now: DateTime<Utc>) -> String {
    now.checked_sub_months(Months::new(12))
        .unwrap_or(now)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
