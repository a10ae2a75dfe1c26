//! DELETE handler
//!
//! Removes regular files only. The main file and the root itself are never
//! deletable.

use std::io;

use hyper::StatusCode;
use tokio::fs;

use super::write::Envelope;
use super::HandlerContext;
use crate::http::{build_json_response, Response};
use crate::logger;
use crate::security::{normalize, ResolvedTarget};

const NOT_ALLOWED: &str = "Deletion of this resource is not allowed";
const PERMISSION_DENIED: &str = "Permission denied - cannot delete resource";

pub async fn delete(ctx: HandlerContext<'_>, target: &ResolvedTarget, main_file: &str) -> Response {
    let (status, envelope) = if is_protected(target, main_file) {
        (StatusCode::FORBIDDEN, Envelope::error(NOT_ALLOWED))
    } else {
        remove(target).await
    };
    build_json_response(ctx.version, status, &envelope, ctx.server_name)
}

/// Deletion is refused for the main file, `.` and `..`
pub fn is_protected(target: &ResolvedTarget, main_file: &str) -> bool {
    target.relative == normalize(main_file) || target.relative == "." || target.relative == ".."
}

async fn remove(target: &ResolvedTarget) -> (StatusCode, Envelope) {
    let result = match fs::metadata(&target.full).await {
        Ok(meta) if meta.is_dir() => {
            return (StatusCode::FORBIDDEN, Envelope::error(PERMISSION_DENIED));
        }
        Ok(_) => fs::remove_file(&target.full).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => (
            StatusCode::OK,
            Envelope::success("File deleted successfully", target),
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, Envelope::error("Resource not found"))
        }
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            (StatusCode::FORBIDDEN, Envelope::error(PERMISSION_DENIED))
        }
        Err(e) => {
            logger::log_error(&format!(
                "Failed to delete '{}': {e}",
                target.full.display()
            ));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Envelope::error(format!("Failed to delete resource: {e}")),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpVersion;
    use crate::security::resolve;
    use serde_json::Value;
    use tempfile::TempDir;

    const CTX: HandlerContext<'static> = HandlerContext {
        version: HttpVersion::Http10,
        server_name: "test",
    };

    fn json(resp: &Response) -> Value {
        serde_json::from_slice(resp.body_bytes()).unwrap()
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.txt"), "x").unwrap();
        let target = resolve(dir.path(), "index.html", "/old.txt").unwrap();

        let resp = delete(CTX, &target, "index.html").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.version(), HttpVersion::Http10);
        assert_eq!(json(&resp)["resource"], "old.txt");
        assert!(!target.full.exists());

        let resp = delete(CTX, &target, "index.html").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(&resp)["message"], "Resource not found");
    }

    #[tokio::test]
    async fn test_main_file_is_protected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();

        for path in ["/index.html", "/", "/./index.html"] {
            let target = resolve(dir.path(), "index.html", path).unwrap();
            let resp = delete(CTX, &target, "index.html").await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{path}");
            assert_eq!(json(&resp)["message"], NOT_ALLOWED);
        }
        assert!(dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn test_directories_are_refused() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let target = resolve(dir.path(), "index.html", "/sub").unwrap();
        let resp = delete(CTX, &target, "index.html").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json(&resp)["message"], PERMISSION_DENIED);

        let root = resolve(dir.path(), "index.html", "/./").unwrap();
        let resp = delete(CTX, &root, "index.html").await;
        assert_eq!(json(&resp)["message"], NOT_ALLOWED);
        assert!(dir.path().join("sub").is_dir());
    }
}
