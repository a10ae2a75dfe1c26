//! Write handlers: POST, PUT and PATCH
//!
//! Every outcome is reported as a JSON envelope. Concurrent writers to the
//! same path are not serialized.

use hyper::StatusCode;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{HandlerContext, HandlerError};
use crate::http::{build_json_response, http_date, Response};
use crate::logger;
use crate::security::ResolvedTarget;

const POST_DELIMITER: &[u8] = b"\n--- POST DATA ---\n";
const PATCH_DELIMITER: &[u8] = b"\n--- PATCH APPLIED ---\n";

/// JSON body shared by the mutating methods
#[derive(Debug, Default, Serialize)]
pub struct Envelope {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_received: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patched_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Envelope {
    pub fn success(message: impl Into<String>, target: &ResolvedTarget) -> Self {
        Self {
            status: "success",
            message: message.into(),
            resource: Some(resource_name(target)),
            timestamp: Some(http_date()),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            ..Self::default()
        }
    }
}

/// File name of the target, as reported in `resource`
pub fn resource_name(target: &ResolvedTarget) -> String {
    target.full.file_name().map_or_else(
        || target.relative.clone(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// 500 envelope for a failed write, `"{action}: {error}"`
pub fn failure(ctx: HandlerContext<'_>, action: &str, error: &HandlerError) -> Response {
    logger::log_error(&format!("{action}: {error}"));
    build_json_response(
        ctx.version,
        StatusCode::INTERNAL_SERVER_ERROR,
        &Envelope::error(format!("{action}: {error}")),
        ctx.server_name,
    )
}

/// Append to an existing resource or create it
pub async fn post(
    ctx: HandlerContext<'_>,
    target: &ResolvedTarget,
    body: &[u8],
    limit: u64,
) -> Result<Response, HandlerError> {
    if body.is_empty() {
        let envelope = Envelope {
            data_received: Some(0),
            ..Envelope::success("POST request received but no data provided", target)
        };
        return Ok(build_json_response(ctx.version, StatusCode::OK, &envelope, ctx.server_name));
    }

    HandlerError::check_body_size(body, limit)?;

    let (status, message) = if exists(target).await {
        let mut file = OpenOptions::new().append(true).open(&target.full).await?;
        file.write_all(POST_DELIMITER).await?;
        file.write_all(body).await?;
        file.flush().await?;
        (StatusCode::OK, "Data appended to existing resource")
    } else {
        fs::write(&target.full, body).await?;
        (StatusCode::CREATED, "New resource created with POST data")
    };

    let envelope = Envelope {
        data_received: Some(body.len()),
        ..Envelope::success(message, target)
    };
    Ok(build_json_response(ctx.version, status, &envelope, ctx.server_name))
}

/// Replace the resource with the body.
///
/// Existence is checked before the write: 201 for a new file, 200 otherwise.
pub async fn put(
    ctx: HandlerContext<'_>,
    target: &ResolvedTarget,
    body: &[u8],
    limit: u64,
) -> Result<Response, HandlerError> {
    HandlerError::check_body_size(body, limit)?;

    let existed = exists(target).await;
    fs::write(&target.full, body).await?;

    let (status, message) = if existed {
        (StatusCode::OK, "Resource updated successfully")
    } else {
        (StatusCode::CREATED, "Resource created successfully")
    };
    let envelope = Envelope {
        size: Some(body.len()),
        ..Envelope::success(message, target)
    };
    Ok(build_json_response(ctx.version, status, &envelope, ctx.server_name))
}

/// Append a delimiter and the body to an existing resource
pub async fn patch(
    ctx: HandlerContext<'_>,
    target: &ResolvedTarget,
    body: &[u8],
    limit: u64,
) -> Result<Response, HandlerError> {
    if !exists(target).await {
        return Ok(patch_not_found(ctx));
    }

    HandlerError::check_body_size(body, limit)?;

    let existing = fs::read(&target.full).await?;
    let mut patched = Vec::with_capacity(existing.len() + PATCH_DELIMITER.len() + body.len());
    patched.extend_from_slice(&existing);
    patched.extend_from_slice(PATCH_DELIMITER);
    patched.extend_from_slice(body);
    fs::write(&target.full, &patched).await?;

    let envelope = Envelope {
        original_size: Some(existing.len()),
        patched_size: Some(patched.len()),
        ..Envelope::success("Patch applied successfully", target)
    };
    Ok(build_json_response(ctx.version, StatusCode::OK, &envelope, ctx.server_name))
}

/// 404 envelope for a PATCH on a missing resource
pub fn patch_not_found(ctx: HandlerContext<'_>) -> Response {
    build_json_response(
        ctx.version,
        StatusCode::NOT_FOUND,
        &Envelope::error("Resource not found - cannot apply patch"),
        ctx.server_name,
    )
}

async fn exists(target: &ResolvedTarget) -> bool {
    fs::try_exists(&target.full).await.unwrap_or(false)
}
