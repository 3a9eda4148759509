use axum::http::Request;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{MakeSpan, TraceLayer},
};
use tracing::{Span, info_span};

pub type HttpTraceLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, HttpMakeSpan>;

pub fn http_trace_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http().make_span_with(HttpMakeSpan)
}

/// 每个请求一个 span，带上方法、路径和转发来源
#[derive(Clone, Debug, Default)]
pub struct HttpMakeSpan;

impl<B> MakeSpan<B> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info_span!(
            "http.request",
            method = %request.method(),
            uri = %request.uri(),
            forwarded_for = %forwarded
        )
    }
}
