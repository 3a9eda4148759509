//! 结构化错误载体
//!
//! `ServiceError` 是唯一跨越组件边界的结构化错误类型：
//! 它在故障点创建，渲染进账本记录和/或客户端响应后即被丢弃。

use super::describe::{GENERIC_ERROR_MESSAGE, Locale, describe};
use super::ErrorKind;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

/// 未提供详情时的哨兵值
pub const NO_DETAIL: &str = "No Detail Available";

/// 带错误种类、调用位置、详情和对外状态码的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail} [{origin}]")]
pub struct ServiceError {
    kind: ErrorKind,
    origin: String,
    detail: String,
    status: StatusCode,
}

/// 对外暴露的错误响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    /// 稳定的数字错误码
    pub code: i32,
    /// 错误消息（安全视图下为固定的通用消息）
    pub message: String,
    /// 错误来源
    pub source: String,
}

impl ServiceError {
    /// 创建错误
    ///
    /// `status` 是返回给客户端的 HTTP 状态码，抛出时必须是非成功状态。
    pub fn new(kind: ErrorKind, origin: impl Into<String>, status: StatusCode) -> Self {
        debug_assert!(
            !status.is_success(),
            "ServiceError raised with success status {status}"
        );
        Self {
            kind,
            origin: origin.into(),
            detail: NO_DETAIL.to_string(),
            status,
        }
    }

    /// 附加自由文本详情
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// 包装未分类的故障，原始消息作为详情
    pub fn unknown(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, origin, StatusCode::INTERNAL_SERVER_ERROR).with_detail(detail)
    }

    /// 表存储故障
    pub fn storage_failure(origin: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TableStorageFail,
            origin,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .with_detail(detail)
    }

    /// 在外层边界把任意错误转换为载体
    ///
    /// 已经是 `ServiceError` 的保持原样，其他错误包装为 `EXP_UNKNOWN`。
    pub fn from_failure(
        origin: impl Into<String>,
        err: &(dyn std::error::Error + 'static),
    ) -> Self {
        match err.downcast_ref::<ServiceError>() {
            Some(carrier) => carrier.clone(),
            None => Self::unknown(origin, err.to_string()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// 实际展示的详情
    ///
    /// 详情仍是哨兵值且状态码不是 200 时，用状态码替代。
    pub fn effective_detail(&self) -> Cow<'_, str> {
        if self.detail == NO_DETAIL && self.status != StatusCode::OK {
            Cow::Owned(format!("HTTP Status {}", format_status(self.status)))
        } else {
            Cow::Borrowed(&self.detail)
        }
    }

    /// 完整描述：`describe(kind, locale) + " - " + detail`
    pub fn description(&self, locale: Locale) -> String {
        format!(
            "{} - {}",
            describe(self.kind, locale),
            self.effective_detail()
        )
    }

    /// 对外视图
    ///
    /// `safe = true` 时隐藏详情，只返回固定的通用消息；错误码和来源始终可见。
    pub fn external_view(&self, safe: bool, locale: Locale) -> ErrorResponse {
        let message = if safe {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            self.description(locale)
        };
        ErrorResponse {
            code: self.code(),
            message,
            source: self.origin.clone(),
        }
    }

    /// 结构化日志使用的诊断映射，键集合固定
    pub fn diagnostic_map(&self, extra: &str, client_address: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Code".to_string(), self.kind.name().to_string()),
            ("HTTP".to_string(), format_status(self.status)),
            ("Source".to_string(), self.origin.clone()),
            ("Detail".to_string(), self.effective_detail().into_owned()),
            ("Extra".to_string(), extra.to_string()),
            ("Network".to_string(), client_address.to_string()),
        ])
    }

    /// 渲染为 JSON 响应，状态码取自载体
    pub fn into_response_with(self, safe: bool) -> Response {
        let body = self.external_view(safe, Locale::default());
        (self.status, Json(body)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

fn format_status(status: StatusCode) -> String {
    format!(
        "{}({})",
        status.canonical_reason().unwrap_or("Unknown").replace(' ', ""),
        status.as_u16()
    )
}

/// 统一的 Result 类型
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn no_match() -> ServiceError {
        ServiceError::new(ErrorKind::NoMatch, "ApiAnchorLink", StatusCode::NOT_FOUND)
            .with_detail("Unknown Target = foo")
    }

    #[test]
    fn test_defaults_to_sentinel_detail() {
        let err = ServiceError::new(ErrorKind::Config, "loader", StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), NO_DETAIL);
        assert_eq!(err.code(), 17001);
    }

    #[test]
    fn test_safe_view_hides_detail() {
        let view = no_match().external_view(true, Locale::AmericanEnglish);
        assert_eq!(view.code, 17002);
        assert_eq!(view.message, GENERIC_ERROR_MESSAGE);
        assert_eq!(view.source, "ApiAnchorLink");
    }

    #[test]
    fn test_unsafe_view_shows_description_and_detail() {
        let view = no_match().external_view(false, Locale::AmericanEnglish);
        assert_eq!(
            view.message,
            format!(
                "{} - Unknown Target = foo",
                describe(ErrorKind::NoMatch, Locale::AmericanEnglish)
            )
        );
    }

    #[test]
    fn test_sentinel_detail_replaced_by_status() {
        let err = ServiceError::new(ErrorKind::NoData, "lookup", StatusCode::NOT_FOUND);
        assert_eq!(err.effective_detail(), "HTTP Status NotFound(404)");
        assert!(err.description(Locale::default()).ends_with(" - HTTP Status NotFound(404)"));
    }

    #[test]
    fn test_diagnostic_map_keys() {
        let map = no_match().diagnostic_map("extra info", "10.0.0.1");
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Code", "Detail", "Extra", "HTTP", "Network", "Source"]);
        assert_eq!(map["Code"], "EXP_NOMATCH");
        assert_eq!(map["HTTP"], "NotFound(404)");
        assert_eq!(map["Network"], "10.0.0.1");
    }

    #[test]
    fn test_from_failure_wraps_foreign_errors() {
        let io = std::io::Error::other("disk on fire");
        let err = ServiceError::from_failure("boundary", &io);
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.detail(), "disk on fire");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let carried = no_match();
        let same = ServiceError::from_failure("boundary", &carried);
        assert_eq!(same, carried);
    }

    #[test]
    fn test_response_serializes_pascal_case() {
        let json = serde_json::to_value(no_match().external_view(true, Locale::default())).unwrap();
        assert_eq!(json["Code"], 17002);
        assert_eq!(json["Source"], "ApiAnchorLink");
    }

    #[tokio::test]
    async fn test_into_response_uses_carrier_status() {
        let response = no_match().into_response_with(true);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
