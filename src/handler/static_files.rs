//! Static file serving module
//!
//! GET and HEAD: serve a file from disk, or run it through the backend
//! runner when its extension has a registered interpreter.

use std::io;
use std::path::Path;

use hyper::body::Bytes;
use hyper::StatusCode;
use tokio::fs;

use super::HandlerContext;
use crate::backend::BackendRunner;
use crate::http::cache::CachePolicy;
use crate::http::{escape_html, http_date, mime, Response};
use crate::logger;
use crate::security::ResolvedTarget;

const HTML_UTF8: &str = "text/html; charset=utf-8";

const NOT_FOUND_HTML: &str = "<html><body><h1>404 Not Found</h1><p>The requested resource could not be found.</p></body></html>";
const ACCESS_DENIED_HTML: &str =
    "<html><body><h1>403 Forbidden</h1><p>Access denied.</p></body></html>";

/// Serve a GET (`head == false`) or HEAD request.
///
/// HEAD runs the exact same computation and drops the body at the end.
pub async fn serve(
    ctx: HandlerContext<'_>,
    target: &ResolvedTarget,
    query: &str,
    host: &str,
    runner: &BackendRunner,
    head: bool,
) -> Response {
    let scriptable = runner.handles(&target.full);

    let (status, content_type, body) = if scriptable && is_file(&target.full).await {
        run_script(target, query, host, runner).await
    } else {
        load_file(target).await
    };

    let cache = CachePolicy::for_content(content_type, scriptable);
    let response = Response::new(ctx.version, status)
        .body(body)
        .content_length()
        .header("Content-Type", content_type)
        .header("Date", http_date())
        .header("Server", ctx.server_name)
        .header("Cache-Control", cache.to_header_value())
        .header("X-Content-Type-Options", "nosniff")
        .header("X-Frame-Options", "DENY")
        .header("X-XSS-Protection", "1; mode=block")
        .header("Connection", "close");

    if head {
        response.without_body()
    } else {
        response
    }
}

async fn run_script(
    target: &ResolvedTarget,
    query: &str,
    host: &str,
    runner: &BackendRunner,
) -> (StatusCode, &'static str, Bytes) {
    match runner.execute(&target.full, query, host).await {
        Ok(output) => (StatusCode::OK, HTML_UTF8, Bytes::from(output)),
        Err(e) => {
            logger::log_error(&format!("Backend script '{}': {e}", target.relative));
            let html = format!(
                "<html><body><h1>500 Internal Server Error</h1><p>{}</p></body></html>",
                escape_html(&e.to_string())
            );
            (StatusCode::INTERNAL_SERVER_ERROR, HTML_UTF8, Bytes::from(html))
        }
    }
}

async fn load_file(target: &ResolvedTarget) -> (StatusCode, &'static str, Bytes) {
    match fs::read(&target.full).await {
        Ok(data) => (
            StatusCode::OK,
            mime::get_content_type(target.extension.as_deref()),
            Bytes::from(data),
        ),
        // File not found is common (404), no need to log
        Err(e) if e.kind() == io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            HTML_UTF8,
            Bytes::from_static(NOT_FOUND_HTML.as_bytes()),
        ),
        Err(e) => {
            logger::log_warning(&format!(
                "Failed to read file '{}': {e}",
                target.full.display()
            ));
            (
                StatusCode::FORBIDDEN,
                HTML_UTF8,
                Bytes::from_static(ACCESS_DENIED_HTML.as_bytes()),
            )
        }
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpVersion;
    use crate::security::{resolve, Policy};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    const CTX: HandlerContext<'static> = HandlerContext {
        version: HttpVersion::Http11,
        server_name: "test",
    };

    fn runner(enabled: bool, policy: Policy) -> BackendRunner {
        BackendRunner::new(enabled, Duration::from_secs(5), Arc::new(policy))
    }

    #[tokio::test]
    async fn test_serves_file_with_security_headers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let target = resolve(dir.path(), "index.html", "/logo.png").unwrap();

        let resp = serve(CTX, &target, "", "localhost", &runner(false, Policy::standard()), false).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body_bytes().as_ref(), &[0x89, b'P', b'N', b'G']);
        assert_eq!(resp.header_value("Content-Type"), Some("image/png"));
        assert_eq!(resp.header_value("Content-Length"), Some("4"));
        assert_eq!(resp.header_value("Cache-Control"), Some("public, max-age=31536000"));
        assert_eq!(resp.header_value("X-Frame-Options"), Some("DENY"));
        assert_eq!(resp.header_value("X-XSS-Protection"), Some("1; mode=block"));
        assert_eq!(resp.header_value("Connection"), Some("close"));
    }

    #[tokio::test]
    async fn test_head_keeps_headers_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.css"), "body{}").unwrap();
        let target = resolve(dir.path(), "index.html", "/a.css").unwrap();

        let resp = serve(CTX, &target, "", "localhost", &runner(false, Policy::standard()), true).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header_value("Content-Length"), Some("6"));
        assert_eq!(resp.header_value("Cache-Control"), Some("public, max-age=86400"));
        assert!(resp.body_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let runner = runner(false, Policy::standard());

        let missing = resolve(dir.path(), "index.html", "/nope.html").unwrap();
        let resp = serve(CTX, &missing, "", "localhost", &runner, false).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.header_value("Content-Type"), Some(HTML_UTF8));

        let sub = resolve(dir.path(), "index.html", "/sub").unwrap();
        let resp = serve(CTX, &sub, "", "localhost", &runner, false).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_script_disabled_fails_closed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('hi')").unwrap();
        let target = resolve(dir.path(), "index.html", "/app.js").unwrap();

        let resp = serve(CTX, &target, "", "localhost", &runner(false, Policy::standard()), false).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.header_value("Cache-Control"),
            Some("no-cache, no-store, must-revalidate")
        );
        let body = String::from_utf8_lossy(resp.body_bytes());
        assert!(body.contains("Backend execution is disabled"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_output_is_served_as_html() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("page.cgi"), "printf '<p>%s</p>' \"$QUERY_STRING\"").unwrap();
        let target = resolve(dir.path(), "index.html", "/page.cgi").unwrap();
        let runner = runner(true, Policy::standard().with_interpreter("cgi", &["sh"]));

        let resp = serve(CTX, &target, "name=x", "localhost", &runner, false).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.header_value("Content-Type"), Some(HTML_UTF8));
        assert_eq!(resp.body_bytes().as_ref(), b"<p>name=x</p>");
        assert_eq!(
            resp.header_value("Cache-Control"),
            Some("no-cache, no-store, must-revalidate")
        );
    }
}
