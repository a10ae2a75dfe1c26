//! OPTIONS, CONNECT and TRACE
//!
//! None of these read or write files; TRACE only checks for existence.

use hyper::StatusCode;
use tokio::fs;

use super::HandlerContext;
use crate::http::{http_date, Response};
use crate::security::ResolvedTarget;

const OPTIONS_ALLOW: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";
const CORS_ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";

/// Fixed capability answer, independent of the method flags
pub fn options(ctx: HandlerContext<'_>) -> Response {
    Response::new(ctx.version, StatusCode::NO_CONTENT)
        .header("Allow", OPTIONS_ALLOW)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", OPTIONS_ALLOW)
        .header("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS)
        .header("Access-Control-Max-Age", "86400")
        .header("Date", http_date())
        .header("Server", ctx.server_name)
}

/// Acknowledge `host:port` for ports 80 and 443. No tunnel is opened.
pub fn connect(ctx: HandlerContext<'_>, target: &str) -> Response {
    let authority = target.strip_prefix('/').unwrap_or(target);
    let response = match authority.rsplit_once(':').map(|(_, port)| port.parse::<u16>()) {
        Some(Ok(80 | 443)) => Response::new(ctx.version, StatusCode::OK)
            .with_reason("Connection established"),
        Some(Ok(_)) => Response::new(ctx.version, StatusCode::FORBIDDEN),
        Some(Err(_)) | None => Response::new(ctx.version, StatusCode::BAD_REQUEST),
    };

    response
        .header("Date", http_date())
        .header("Server", ctx.server_name)
        .header("Connection", "close")
}

/// Echo the request back as `message/http`.
///
/// Status is 200 when the resolved path exists, 404 otherwise.
pub async fn trace(ctx: HandlerContext<'_>, target: &ResolvedTarget, raw: &str) -> Response {
    let status = if fs::try_exists(&target.full).await.unwrap_or(false) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };

    Response::new(ctx.version, status)
        .header("Content-Type", "message/http")
        .body(raw.to_string())
        .content_length()
        .header("Date", http_date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpVersion;
    use crate::security::resolve;
    use tempfile::TempDir;

    const CTX: HandlerContext<'static> = HandlerContext {
        version: HttpVersion::Http11,
        server_name: "test",
    };

    #[test]
    fn test_options_is_fixed() {
        let resp = options(CTX);
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(resp.header_value("Allow"), Some(OPTIONS_ALLOW));
        assert_eq!(resp.header_value("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(resp.header_value("Access-Control-Max-Age"), Some("86400"));
        assert!(resp.body_bytes().is_empty());
    }

    #[test]
    fn test_connect_ports() {
        let resp = connect(CTX, "example.com:443");
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp
            .to_bytes()
            .starts_with(b"HTTP/1.1 200 Connection established\r\n"));

        assert_eq!(connect(CTX, "/example.com:80").status(), StatusCode::OK);
        assert_eq!(connect(CTX, "example.com:22").status(), StatusCode::FORBIDDEN);
        assert_eq!(connect(CTX, "example.com").status(), StatusCode::BAD_REQUEST);
        assert_eq!(connect(CTX, "example.com:http").status(), StatusCode::BAD_REQUEST);
        assert_eq!(connect(CTX, "example.com:70000").status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_trace_echoes_request() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("here.txt"), "x").unwrap();
        let raw = "TRACE /here.txt HTTP/1.1\r\nHost: a\r\n\r\n";

        let target = resolve(dir.path(), "index.html", "/here.txt").unwrap();
        let resp = trace(CTX, &target, raw).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header_value("Content-Type"), Some("message/http"));
        assert_eq!(resp.body_bytes().as_ref(), raw.as_bytes());

        let missing = resolve(dir.path(), "index.html", "/gone.txt").unwrap();
        let resp = trace(CTX, &missing, raw).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.body_bytes().as_ref(), raw.as_bytes());
    }
}
