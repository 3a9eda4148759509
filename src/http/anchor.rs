//! 链接目录查询：`GET /v1/ApiAnchorLink?target=<name>`

use super::{ApiLinkResponse, AppState};
use crate::metrics::RequestTimer;
use axum::{
    extract::{ConnectInfo, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sourcelinks_common::{ErrorKind, ServiceError, ServiceResult};
use std::net::SocketAddr;
use tracing::debug;

const HANDLER: &str = "ApiAnchorLink";

#[derive(Debug, Deserialize)]
pub(crate) struct AnchorQuery {
    target: Option<String>,
}

pub(crate) async fn anchor_link_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<AnchorQuery>, QueryRejection>,
) -> Response {
    let timer = RequestTimer::new(HANDLER);

    // 查询串无法解析时按未分类故障处理
    let result = query
        .map_err(|rejection| ServiceError::from_failure(HANDLER, &rejection))
        .and_then(|Query(query)| resolve(&state, &query.target.unwrap_or_default()));

    let response = match result {
        Ok(link) => {
            debug!("Resolved link target {}", link.host);
            link.into_response()
        }
        Err(e) => state.fail(HANDLER, e, &headers, peer).await,
    };
    timer.finish(response.status().as_u16());
    response
}

fn resolve(state: &AppState, target: &str) -> ServiceResult<ApiLinkResponse> {
    state
        .link(target)
        .map(ApiLinkResponse::from)
        .ok_or_else(|| {
            ServiceError::new(ErrorKind::NoMatch, HANDLER, StatusCode::NOT_FOUND)
                .with_detail(format!("Unknown Target = {target}"))
        })
}
