//! 账本管理接口
//!
//! - `GET /v1/ledger?start=&end=`：按时间范围读取（RFC 3339，不含边界）
//! - `DELETE /v1/ledger?start=&end=`：按时间范围删除
//! - `DELETE /v1/ledger/{row_key}`：按行键删除

use super::AppState;
use crate::metrics::RequestTimer;
use axum::{
    Json,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sourcelinks_common::{ErrorKind, ServiceError, ServiceResult};
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub(crate) struct RangeParams {
    start: Option<String>,
    end: Option<String>,
}

/// 范围删除结果
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRangeResponse {
    pub deleted: u64,
}

impl RangeParams {
    fn bounds(&self, origin: &str) -> ServiceResult<(DateTime<Utc>, DateTime<Utc>)> {
        Ok((
            parse_bound(self.start.as_deref(), "start", origin)?,
            parse_bound(self.end.as_deref(), "end", origin)?,
        ))
    }
}

fn parse_bound(value: Option<&str>, name: &str, origin: &str) -> ServiceResult<DateTime<Utc>> {
    let value = value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        ServiceError::new(ErrorKind::RequiredField, origin, StatusCode::BAD_REQUEST)
            .with_detail(format!("Missing query parameter '{name}'"))
    })?;
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| {
            ServiceError::new(ErrorKind::ParseFail, origin, StatusCode::BAD_REQUEST)
                .with_detail(format!("Invalid '{name}' timestamp '{value}': {e}"))
        })
}

pub(crate) async fn read_range_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<RangeParams>,
) -> Response {
    const HANDLER: &str = "LedgerRead";
    let timer = RequestTimer::new(HANDLER);

    let result = async {
        let (start, end) = params.bounds(HANDLER)?;
        state.ledger().query(start, end)?.collect().await
    }
    .await;

    let response = match result {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => state.fail(HANDLER, e, &headers, peer).await,
    };
    timer.finish(response.status().as_u16());
    response
}

pub(crate) async fn delete_range_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<RangeParams>,
) -> Response {
    const HANDLER: &str = "LedgerDeleteRange";
    let timer = RequestTimer::new(HANDLER);

    let result = async {
        let (start, end) = params.bounds(HANDLER)?;
        state.ledger().delete_by_range(start, end).await
    }
    .await;

    let response = match result {
        Ok(deleted) => Json(DeleteRangeResponse { deleted }).into_response(),
        Err(e) => state.fail(HANDLER, e, &headers, peer).await,
    };
    timer.finish(response.status().as_u16());
    response
}

pub(crate) async fn delete_key_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(row_key): Path<String>,
) -> Response {
    const HANDLER: &str = "LedgerDelete";
    let timer = RequestTimer::new(HANDLER);

    let response = match state.ledger().delete_by_key(&row_key).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => state.fail(HANDLER, e, &headers, peer).await,
    };
    timer.finish(response.status().as_u16());
    response
}
