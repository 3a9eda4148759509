//! 存储服务错误信封解析
//!
//! 表存储服务把真正的错误原因埋在响应体里（XML 的 `<code>`/`<message>`，
//! 或 JSON 的 `odata.error`），这里把它提取成扁平的 `code?message` 字符串。

use lazy_static::lazy_static;
use regex::Regex;

/// 无法解析错误信封时使用的详情
pub const NO_FURTHER_INFO: &str = "No further Info.";

lazy_static! {
    static ref XML_CODE: Regex = Regex::new(r"(?s)<code(?:\s[^>]*)?>(.*?)</code>").unwrap();
    static ref XML_MESSAGE: Regex =
        Regex::new(r"(?s)<message(?:\s[^>]*)?>(.*?)</message>").unwrap();
}

/// 解析错误信封，返回 `(code, message)`
pub fn parse_envelope(body: &str) -> Option<(String, String)> {
    parse_xml(body).or_else(|| parse_json(body))
}

/// 把错误信封展开成 `code?message`，解析失败时返回 [`NO_FURTHER_INFO`]
pub fn unwrap_envelope(body: &str) -> String {
    match parse_envelope(body) {
        Some((code, message)) => format!("{code}?{message}"),
        None => NO_FURTHER_INFO.to_string(),
    }
}

fn parse_xml(body: &str) -> Option<(String, String)> {
    let code = XML_CODE.captures(body)?.get(1)?.as_str();
    let message = XML_MESSAGE.captures(body)?.get(1)?.as_str();
    Some((decode_entities(code.trim()), decode_entities(message.trim())))
}

fn parse_json(body: &str) -> Option<(String, String)> {
    // 批量响应是 multipart，JSON 信封只是其中一段
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    let value: serde_json::Value = serde_json::from_str(body.get(start..=end)?).ok()?;
    let error = value.get("odata.error")?;
    let code = error.get("code")?.as_str()?;
    let message = match error.get("message")? {
        serde_json::Value::String(text) => text.as_str(),
        other => other.get("value")?.as_str()?,
    };
    Some((code.to_string(), message.to_string()))
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
