//! HTTP 边界
//!
//! 链接目录查询、账本管理、健康检查和指标导出。
//! 所有失败都先写入账本（SEV_EXCEPTION），再按配置的视图渲染给客户端。

mod anchor;
mod ledger_admin;
mod response;
mod trace;

pub use response::ApiLinkResponse;

use crate::config::{LinkConfig, SourcelinksConfig};
use crate::metrics::{ERRORS_TOTAL, export_metrics};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use ledger::{Ledger, Severity};
use serde_json::json;
use sourcelinks_common::{Locale, ServiceError, client_address};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Ledger>,
    links: Arc<BTreeMap<String, LinkConfig>>,
    safe_errors: bool,
}

impl AppState {
    pub fn new(config: &SourcelinksConfig, ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            links: Arc::new(config.links.clone()),
            safe_errors: config.http.safe_errors,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub(crate) fn link(&self, target: &str) -> Option<&LinkConfig> {
        self.links.get(target)
    }

    /// 处理器失败的统一出口
    ///
    /// 记录到账本：来源为 `<应用>.<处理器>--<错误来源>`，调用方为客户端地址；
    /// 然后以载体的状态码渲染错误响应。
    pub(crate) async fn fail(
        &self,
        handler: &'static str,
        err: ServiceError,
        headers: &HeaderMap,
        peer: SocketAddr,
    ) -> Response {
        let who = client_address(headers, Some(peer));
        let source = format!("{}.{handler}--{}", self.ledger.application(), err.origin());

        warn!(
            "Request failed: {:?}",
            err.diagnostic_map(handler, &who)
        );
        ERRORS_TOTAL
            .with_label_values(&[handler, &err.code().to_string()])
            .inc();

        self.ledger
            .append_as(
                err.kind(),
                Severity::Exception,
                &err.description(Locale::default()),
                &source,
                &who,
            )
            .await;

        err.into_response_with(self.safe_errors)
    }
}

/// 创建路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/ApiAnchorLink", get(anchor::anchor_link_handler))
        .route(
            "/v1/ledger",
            get(ledger_admin::read_range_handler).delete(ledger_admin::delete_range_handler),
        )
        .route("/v1/ledger/{row_key}", delete(ledger_admin::delete_key_handler))
        .route("/health", get(health_check_handler))
        .route("/metrics", get(metrics_handler))
        .layer(trace::http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 在已绑定的监听器上运行服务，直到 `shutdown` 完成
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

async fn health_check_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "sourcelinks",
        "application": state.ledger.application(),
        "backend": state.ledger.storage().backend_name(),
    }))
}

async fn metrics_handler() -> Response {
    match export_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to export metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
