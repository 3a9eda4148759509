//! HTTP 端到端测试：真实监听端口 + 临时 SQLite 账本

use chrono::{Duration, SecondsFormat, Utc};
use ledger::{Ledger, LogEntry, Severity};
use reqwest::StatusCode;
use sourcelinks::{AppState, SourcelinksConfig, create_router, metrics, serve};
use sourcelinks_common::error::GENERIC_ERROR_MESSAGE;
use sourcelinks_common::{ErrorKind, ErrorResponse, Locale, describe};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct TestServer {
    base_url: String,
    ledger: Arc<Ledger>,
    shutdown: Option<oneshot::Sender<()>>,
    _temp_dir: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn test_config(temp_dir: &TempDir, safe_errors: bool) -> SourcelinksConfig {
    let toml = format!(
        r#"
name = "http-test"
env = "test"

[http]
ip = "127.0.0.1"
port = 7071
safe_errors = {safe_errors}

[ledger]
application_name = "httptest"

[ledger.storage.sqlite]
path = "{path}"

[links.myhost]
host = "https://api.example.com"
path = "/v1/things"
parameter = "?code="
auth = true
"#,
        path = temp_dir.path().join("ledger.db").display()
    );
    SourcelinksConfig::from_toml(&toml).expect("valid test config")
}

async fn start_server(safe_errors: bool) -> TestServer {
    let _ = metrics::register_metrics();

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(&temp_dir, safe_errors);
    let ledger = Arc::new(
        Ledger::open(&config.ledger)
            .await
            .expect("Failed to open ledger"),
    );

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read bound addr");
    let router = create_router(AppState::new(&config, ledger.clone()));

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = serve(listener, router, async {
            let _ = rx.await;
        })
        .await;
    });

    TestServer {
        base_url: format!("http://{addr}"),
        ledger,
        shutdown: Some(tx),
        _temp_dir: temp_dir,
    }
}

fn rfc3339(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[tokio::test]
async fn test_anchor_link_found() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/v1/ApiAnchorLink", server.base_url))
        .query(&[("target", "myhost")])
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["cache-control"].to_str().unwrap(),
        "no-cache, no-store"
    );
    assert!(response.headers().contains_key("expires"));

    let body: serde_json::Value = response.json().await.expect("json body");
    assert_eq!(body["Host"], "https://api.example.com");
    assert_eq!(body["Path"], "/v1/things");
    assert_eq!(body["Parameter"], "?code=");
    assert_eq!(body["Auth"], true);
}

#[tokio::test]
async fn test_unknown_target_is_logged_and_rendered() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();
    let start = Utc::now() - Duration::seconds(5);

    let response = client
        .get(format!("{}/v1/ApiAnchorLink", server.base_url))
        .query(&[("target", "nope")])
        .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = response.json().await.expect("error body");
    assert_eq!(body.code, 17002);
    assert_eq!(body.source, "ApiAnchorLink");
    let description = format!(
        "{} - Unknown Target = nope",
        describe(ErrorKind::NoMatch, Locale::default())
    );
    assert_eq!(body.message, description);

    // 失败已写入账本
    let entries = server
        .ledger
        .query(start, Utc::now() + Duration::seconds(5))
        .expect("valid bounds")
        .collect()
        .await
        .expect("query should succeed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, Severity::Exception.level());
    assert_eq!(
        entries[0].message,
        format!(
            "EXP_NOMATCH: : (- httptest.ApiAnchorLink--ApiAnchorLink -) : (id-203.0.113.7 -) {description}"
        )
    );
}

#[tokio::test]
async fn test_missing_target_uses_peer_address() {
    let server = start_server(false).await;
    let start = Utc::now() - Duration::seconds(5);

    let response = reqwest::get(format!("{}/v1/ApiAnchorLink", server.base_url))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let entries = server
        .ledger
        .query(start, Utc::now() + Duration::seconds(5))
        .expect("valid bounds")
        .collect()
        .await
        .expect("query should succeed");
    assert_eq!(entries.len(), 1);
    assert!(entries[0].message.contains(": (id-127.0.0.1 -) "));
    assert!(entries[0].message.ends_with("Unknown Target = "));
}

#[tokio::test]
async fn test_safe_errors_hide_detail() {
    let server = start_server(true).await;

    let response = reqwest::get(format!("{}/v1/ApiAnchorLink?target=nope", server.base_url))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: ErrorResponse = response.json().await.expect("error body");
    assert_eq!(body.code, 17002);
    assert_eq!(body.message, GENERIC_ERROR_MESSAGE);
    assert_eq!(body.source, "ApiAnchorLink");
}

#[tokio::test]
async fn test_ledger_admin_endpoints() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();
    let start = Utc::now() - Duration::seconds(5);

    for i in 0..3 {
        server
            .ledger
            .append(ErrorKind::Ok, Severity::Info, &format!("entry {i}"), "admin")
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(15)).await;
    }
    let end = Utc::now() + Duration::seconds(5);
    let range = [("start", rfc3339(start)), ("end", rfc3339(end))];

    let entries: Vec<LogEntry> = client
        .get(format!("{}/v1/ledger", server.base_url))
        .query(&range)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("entries body");
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].message, ": (- admin -) entry 2");

    let response = client
        .delete(format!("{}/v1/ledger/{}", server.base_url, entries[0].row_key))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body: serde_json::Value = client
        .delete(format!("{}/v1/ledger", server.base_url))
        .query(&range)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("delete body");
    assert_eq!(body["Deleted"], 2);
}

#[tokio::test]
async fn test_ledger_read_rejects_bad_bounds() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/v1/ledger", server.base_url))
        .query(&[("start", "2026-01-01T00:00:00Z")])
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("error body");
    assert_eq!(body.code, ErrorKind::RequiredField.code());

    let response = client
        .get(format!("{}/v1/ledger", server.base_url))
        .query(&[("start", "yesterday"), ("end", "today")])
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("error body");
    assert_eq!(body.code, ErrorKind::ParseFail.code());

    // 0001-01-01 是最小时间哨兵
    let response = client
        .get(format!("{}/v1/ledger", server.base_url))
        .query(&[("start", "0001-01-01T00:00:00Z"), ("end", "2026-01-01T00:00:00Z")])
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.expect("error body");
    assert_eq!(body.code, ErrorKind::OutOfRange.code());
    assert_eq!(body.source, "LedgerRead");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let server = start_server(false).await;

    let health: serde_json::Value = reqwest::get(format!("{}/health", server.base_url))
        .await
        .expect("request failed")
        .json()
        .await
        .expect("health body");
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["application"], "httptest");
    assert_eq!(health["backend"], "SQLite");

    reqwest::get(format!("{}/v1/ApiAnchorLink?target=myhost", server.base_url))
        .await
        .expect("request failed");

    let text = reqwest::get(format!("{}/metrics", server.base_url))
        .await
        .expect("request failed")
        .text()
        .await
        .expect("metrics body");
    assert!(text.contains("sourcelinks_requests_total"));
    assert!(text.contains("handler=\"ApiAnchorLink\""));
}
