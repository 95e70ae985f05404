//! The guard chain's view of an inbound request.
//!
//! The body is buffered once by the middleware, up to the configured limit,
//! so every guard sees the same bytes and the handler still receives them.

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri, header};
use serde_json::Value;
use std::borrow::Cow;

/// Fallback when no proxy header names the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone)]
pub struct GuardRequest {
    method: Method,
    path: String,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    body_error: Option<String>,
}

impl GuardRequest {
    pub fn new(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: uri.path().to_string(),
            url: uri.to_string(),
            headers,
            body,
            body_error: None,
        }
    }

    /// A request whose body could not be buffered.
    pub fn with_body_error(mut self, error: impl Into<String>) -> Self {
        self.body = Bytes::new();
        self.body_error = Some(error.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The request target as received (path and query).
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_error(&self) -> Option<&str> {
        self.body_error.as_deref()
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }

    pub fn client_ip(&self) -> String {
        client_ip(&self.headers)
    }

    /// Everything the WAF matches against, newline separated.
    ///
    /// A JSON body is scanned twice: as raw bytes, then as its decoded keys
    /// and string values, so `\u` escapes cannot hide a signature from the
    /// text a handler will actually see.
    pub fn scan_buffer(&self) -> String {
        let decoded = percent_decode(&self.url);
        let body = self.body_text();
        let mut buffer = String::with_capacity(
            self.path.len() + self.url.len() * 2 + body.len() + 128,
        );
        buffer.push_str(&self.path);
        buffer.push('\n');
        buffer.push_str(&self.url);
        buffer.push('\n');
        buffer.push_str(&decoded);
        buffer.push('\n');
        buffer.push_str(self.user_agent().unwrap_or_default());
        buffer.push('\n');
        buffer.push_str(&body);

        if let Ok(json) = serde_json::from_slice::<Value>(&self.body) {
            push_json_strings(&mut buffer, &json);
        }
        buffer
    }
}

/// Append every object key and string value of `value`, one per line.
fn push_json_strings(buffer: &mut String, value: &Value) {
    match value {
        Value::String(s) => {
            buffer.push('\n');
            buffer.push_str(s);
        }
        Value::Array(items) => {
            for item in items {
                push_json_strings(buffer, item);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                buffer.push('\n');
                buffer.push_str(key);
                push_json_strings(buffer, item);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// First `x-forwarded-for` entry, else `x-real-ip`, else [`UNKNOWN_CLIENT`].
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Decode `%XX` escapes and `+` (as a space). Malformed escapes are kept
/// verbatim; invalid UTF-8 is replaced.
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn decodes_escapes_and_plus() {
        assert_eq!(percent_decode("%27%20OR%201%3D1"), "' OR 1=1");
        assert_eq!(percent_decode("ignore+previous"), "ignore previous");
        assert_eq!(percent_decode("%2e%2e%2F"), "../");
    }

    #[test]
    fn malformed_escapes_survive() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz%4"), "%zz%4");
        assert_eq!(percent_decode("%ff"), "\u{fffd}");
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers), "198.51.100.4");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn scan_buffer_covers_every_source() {
        let uri: Uri = "/search?q=%3Cscript%3E".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("scanner/1.0"));
        let request = GuardRequest::new(
            Method::POST,
            &uri,
            headers,
            Bytes::from_static(b"{\"prompt\":\"hi\"}"),
        );

        let buffer = request.scan_buffer();
        assert!(buffer.contains("/search"));
        assert!(buffer.contains("%3Cscript%3E"));
        assert!(buffer.contains("<script>"));
        assert!(buffer.contains("scanner/1.0"));
        assert!(buffer.contains("\"prompt\""));
    }

    #[test]
    fn scan_buffer_decodes_json_escapes() {
        let uri: Uri = "/api/gpt-test".parse().unwrap();
        let body =
            r#"{"prompt":"ignore\u0020previous","nested":[{"\u006bey":"\u003cscript\u003e"}]}"#;
        let request = GuardRequest::new(Method::POST, &uri, HeaderMap::new(), Bytes::from(body));

        let buffer = request.scan_buffer();
        assert!(buffer.contains("ignore previous"));
        assert!(buffer.contains("\nkey"));
        assert!(buffer.contains("<script>"));
    }

    #[test]
    fn non_json_body_is_scanned_raw() {
        let uri: Uri = "/upload".parse().unwrap();
        let request =
            GuardRequest::new(Method::POST, &uri, HeaderMap::new(), Bytes::from("a=\\u003c"));
        assert!(request.scan_buffer().ends_with("a=\\u003c"));
    }

    #[test]
    fn body_error_clears_body() {
        let uri: Uri = "/api/run".parse().unwrap();
        let request = GuardRequest::new(Method::POST, &uri, HeaderMap::new(), Bytes::from("x"))
            .with_body_error("length limit exceeded");
        assert!(request.body().is_empty());
        assert_eq!(request.body_error(), Some("length limit exceeded"));
    }
}
