//! Prometheus 监控指标模块
//!
//! 全局 Registry、HTTP 请求指标以及导出

use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;
use std::time::Instant;

static METRICS_INIT: Once = Once::new();

lazy_static! {
    /// 全局 Prometheus Registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// HTTP 请求总数
    pub static ref REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("requests_total", "Total number of HTTP requests")
            .namespace("sourcelinks"),
        &["handler", "status"]
    ).unwrap();

    /// HTTP 请求延迟（秒）
    pub static ref REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("request_duration_seconds", "HTTP request duration in seconds")
            .namespace("sourcelinks")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["handler"]
    ).unwrap();

    /// 按错误码统计的错误响应
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("errors_total", "Total number of error responses by code")
            .namespace("sourcelinks"),
        &["handler", "code"]
    ).unwrap();
}

/// 注册所有指标到全局 Registry
///
/// 可重复调用，只有第一次真正注册。
pub fn register_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    METRICS_INIT.call_once(|| {
        let register_result = (|| {
            REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()))?;
            REGISTRY.register(Box::new(REQUEST_DURATION.clone()))?;
            REGISTRY.register(Box::new(ERRORS_TOTAL.clone()))?;
            ledger::register_ledger_metrics(&REGISTRY)?;
            Ok(())
        })();
        result = register_result;
    });

    result
}

/// 请求计时器，结束时记录请求数和延迟
pub struct RequestTimer {
    handler: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(handler: &'static str) -> Self {
        Self {
            handler,
            start: Instant::now(),
        }
    }

    pub fn finish(self, status: u16) {
        REQUEST_DURATION
            .with_label_values(&[self.handler])
            .observe(self.start.elapsed().as_secs_f64());
        REQUESTS_TOTAL
            .with_label_values(&[self.handler, &status.to_string()])
            .inc();
    }
}

/// 导出 Prometheus 文本格式的指标
pub fn export_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_request_timer_exports() {
        let _ = register_metrics();
        RequestTimer::new("health").finish(200);
        let text = export_metrics().unwrap();
        assert!(text.contains("sourcelinks_requests_total"));
        assert!(text.contains("handler=\"health\""));
    }
}
