//! 客户端网络地址解析

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// 无法确定客户端地址时返回的文本
pub const NO_ADDRESS: &str = "No IP Available.";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REMOTE_ADDR: &str = "remote_addr";

/// 解析客户端地址
///
/// 优先级：`X-Forwarded-For`（第一跳）→ `REMOTE_ADDR` 头 → 对端套接字地址。
/// 本机 IPv6 回环地址 `::1` 统一写成 `127.0.0.1`。
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let from_header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    from_header(FORWARDED_FOR)
        .or_else(|| from_header(REMOTE_ADDR))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .map(|ip| {
            if ip == "::1" {
                "127.0.0.1".to_string()
            } else {
                ip
            }
        })
        .unwrap_or_else(|| NO_ADDRESS.to_string())
}
