//! HTTP response building module
//!
//! A response is assembled entirely in memory and serialized once. Header
//! order is transmission order and repeated names are kept as-is.

use chrono::Utc;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde::Serialize;

use super::HttpVersion;
use crate::logger;

/// `Date` header value, RFC 1123 style
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Escape text embedded in an HTML error page
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status: StatusCode,
    reason: Option<&'static str>,
    headers: Vec<(&'static str, String)>,
    body: Bytes,
}

impl Response {
    pub fn new(version: HttpVersion, status: StatusCode) -> Self {
        Self {
            version,
            status,
            reason: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Override the canonical reason phrase
    #[must_use]
    pub fn with_reason(mut self, reason: &'static str) -> Self {
        self.reason = Some(reason);
        self
    }

    #[must_use]
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Append `Content-Length` for the current body
    #[must_use]
    pub fn content_length(self) -> Self {
        let len = self.body.len();
        self.header("Content-Length", len.to_string())
    }

    /// Drop the body but keep every header, `Content-Length` included
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = Bytes::new();
        self
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn reason(&self) -> &str {
        self.reason
            .or_else(|| self.status.canonical_reason())
            .unwrap_or("")
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// First header with this name, case-insensitive
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub const fn body_bytes(&self) -> &Bytes {
        &self.body
    }

    /// Serialize status line, headers and body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}\r\n",
            self.version.as_str(),
            self.status.as_u16(),
            self.reason()
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

/// Fixed HTML body with the minimal header set
pub fn build_html_response(
    version: HttpVersion,
    status: StatusCode,
    html: impl Into<Bytes>,
    server_name: &str,
) -> Response {
    Response::new(version, status)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html)
        .content_length()
        .header("Date", http_date())
        .header("Server", server_name)
        .header("Connection", "close")
}

/// JSON envelope response used by the mutating methods
pub fn build_json_response<T: Serialize>(
    version: HttpVersion,
    status: StatusCode,
    body: &T,
    server_name: &str,
) -> Response {
    let (status, json) = match serde_json::to_string_pretty(body) {
        Ok(j) => (status, j),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize response: {e}"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error","message":"Internal server error"}"#.to_string(),
            )
        }
    };

    Response::new(version, status)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(json)
        .content_length()
        .header("Date", http_date())
        .header("Server", server_name)
        .header("X-Content-Type-Options", "nosniff")
        .header("Connection", "close")
}

/// Plain-text protocol error (bad request line, unsupported version)
pub fn build_text_response(status: StatusCode, text: impl Into<Bytes>) -> Response {
    Response::new(HttpVersion::Http11, status)
        .header("Content-Type", "text/plain")
        .body(text)
        .content_length()
        .header("Connection", "close")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_keeps_header_order() {
        let resp = Response::new(HttpVersion::Http10, StatusCode::OK)
            .header("X-First", "1")
            .header("Set-Cookie", "a=1")
            .header("Set-Cookie", "b=2")
            .body("hi")
            .content_length();

        let text = String::from_utf8(resp.to_bytes()).unwrap();
        assert_eq!(
            text,
            "HTTP/1.0 200 OK\r\nX-First: 1\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 2\r\n\r\nhi"
        );
    }

    #[test]
    fn test_custom_reason() {
        let resp = Response::new(HttpVersion::Http11, StatusCode::OK)
            .with_reason("Connection established");
        assert!(resp.to_bytes().starts_with(b"HTTP/1.1 200 Connection established\r\n"));
    }

    #[test]
    fn test_without_body_keeps_length() {
        let resp = Response::new(HttpVersion::Http11, StatusCode::OK)
            .body("12345")
            .content_length()
            .without_body();
        assert_eq!(resp.header_value("content-length"), Some("5"));
        assert!(resp.body_bytes().is_empty());
        assert!(resp.to_bytes().ends_with(b"\r\n\r\n"));
    }

    #[test]
    fn test_json_response_headers() {
        let resp = build_json_response(
            HttpVersion::Http11,
            StatusCode::CREATED,
            &serde_json::json!({"status": "success"}),
            "test",
        );
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.header_value("Content-Type"),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(resp.header_value("Server"), Some("test"));
        let value: serde_json::Value = serde_json::from_slice(resp.body_bytes()).unwrap();
        assert_eq!(value["status"], "success");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>a & \"b\"</b>"), "&lt;b&gt;a &amp; &quot;b&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_date_format() {
        let date = http_date();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), "Sun, 06 Nov 1994 08:49:37 GMT".len());
    }
}
