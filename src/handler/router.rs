//! Request routing dispatch module
//!
//! Entry point for request processing: parse, validate version and method,
//! resolve the path, run the security gate, then dispatch to the method
//! handler. Every input that yields a request line yields exactly one
//! response.

use std::sync::Arc;
use std::time::Duration;

use hyper::StatusCode;

use super::write::{self, Envelope};
use super::{delete, misc, static_files, HandlerContext, HandlerError, SiteSettings};
use crate::backend::{BackendRunner, DEFAULT_TIMEOUT};
use crate::config::Config;
use crate::http::{
    build_html_response, build_json_response, build_text_response, escape_html, HttpVersion,
    Method, ParseError, Request, Response,
};
use crate::logger;
use crate::security::{self, Policy, ResolvedTarget};

const DEFAULT_MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

const ENCODING_HTML: &str = "<html><body><h1>400 Bad Request</h1><p>Invalid character encoding in request.</p></body></html>";
const INVALID_PATH_HTML: &str = "<html><body><h1>403 Forbidden - Invalid Path</h1></body></html>";
const BLACKLISTED_HTML: &str = "<html><body><h1>403 Forbidden - Access Denied</h1><p>This resource is blacklisted.</p></body></html>";
const FORBIDDEN_TYPE_HTML: &str = "<html><body><h1>403 Forbidden</h1><p>Access to this file type is not allowed for security reasons.</p></body></html>";
const FORBIDDEN_TYPE_MESSAGE: &str = "Access to this file type is not allowed for security reasons";

const POST_FAILURE: &str = "Failed to process POST request";
const PUT_FAILURE: &str = "Failed to process PUT request";
const PATCH_FAILURE: &str = "Failed to apply patch";

/// Dispatch outcome, with what the access log needs to know
#[derive(Debug, Clone)]
pub struct Reply {
    /// Method token, `-` when the request line was unusable
    pub method: String,
    /// Request path without query, `-` when unknown
    pub path: String,
    pub query: String,
    pub version: HttpVersion,
    pub response: Response,
}

impl Reply {
    fn unparsed(response: Response) -> Self {
        Self {
            method: "-".to_string(),
            path: "-".to_string(),
            query: String::new(),
            version: response.version(),
            response,
        }
    }
}

/// The request-handling engine shared by both transports
#[derive(Debug)]
pub struct Dispatcher {
    settings: SiteSettings,
    policy: Arc<Policy>,
    runner: BackendRunner,
    server_name: String,
    max_body_size: u64,
}

impl Dispatcher {
    pub fn new(settings: SiteSettings, policy: Policy, server_name: impl Into<String>) -> Self {
        let policy = Arc::new(policy);
        let runner = BackendRunner::new(
            settings.backend_enabled(),
            DEFAULT_TIMEOUT,
            Arc::clone(&policy),
        );
        Self {
            settings,
            policy,
            runner,
            server_name: server_name.into(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            SiteSettings::from_config(config),
            Policy::standard(),
            config.http.server_name.clone(),
        )
        .with_backend_timeout(Duration::from_secs(config.backend.timeout_secs))
        .with_max_body_size(config.http.max_body_size)
    }

    #[must_use]
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.runner = BackendRunner::new(
            self.settings.backend_enabled(),
            timeout,
            Arc::clone(&self.policy),
        );
        self
    }

    #[must_use]
    pub const fn with_max_body_size(mut self, limit: u64) -> Self {
        self.max_body_size = limit;
        self
    }

    pub const fn settings(&self) -> &SiteSettings {
        &self.settings
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Handle one raw message.
    ///
    /// `None` means the first line was empty and nothing must be sent.
    pub async fn handle(&self, raw: &[u8]) -> Option<Reply> {
        let request = match Request::parse(raw) {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(e) => return Some(self.reject(&e)),
        };

        let response = self.route(&request).await;

        Some(Reply {
            method: request.method.to_string(),
            path: request.path,
            query: request.query,
            version: request.version,
            response,
        })
    }

    /// Responses for messages that never became a [`Request`]
    fn reject(&self, error: &ParseError) -> Reply {
        match error {
            ParseError::Encoding => Reply::unparsed(build_html_response(
                HttpVersion::Http11,
                StatusCode::BAD_REQUEST,
                ENCODING_HTML,
                &self.server_name,
            )),
            ParseError::TokenCount(_) => Reply::unparsed(
                Response::new(HttpVersion::Http11, StatusCode::BAD_REQUEST)
                    .content_length()
                    .header("Connection", "close"),
            ),
            ParseError::BadVersion(_) => Reply::unparsed(build_text_response(
                StatusCode::BAD_REQUEST,
                error.to_string(),
            )),
            ParseError::UnsupportedVersion(_) => Reply::unparsed(build_text_response(
                StatusCode::HTTP_VERSION_NOT_SUPPORTED,
                error.to_string(),
            )),
            ParseError::UnknownMethod { token, version } => Reply {
                method: token.clone(),
                ..Reply::unparsed(self.method_not_allowed(*version))
            },
        }
    }

    fn method_not_allowed(&self, version: HttpVersion) -> Response {
        Response::new(version, StatusCode::METHOD_NOT_ALLOWED)
            .header("Allow", self.settings.allowed_methods())
            .content_length()
            .header("Connection", "close")
    }

    /// Answer a request whose body is over the limit, without the body.
    ///
    /// Only the request line of `head` is used; `size` is the declared or
    /// received body size. The path gates still run first.
    pub async fn handle_oversized(&self, head: &[u8], size: usize) -> Option<Reply> {
        let line_end = head.iter().position(|&b| b == b'\n').unwrap_or(head.len());
        let request = match Request::parse(&head[..line_end]) {
            Ok(Some(request)) => request,
            Ok(None) => return None,
            Err(e) => return Some(self.reject(&e)),
        };

        let ctx = HandlerContext {
            version: request.version,
            server_name: &self.server_name,
        };
        let response = match self.gate(ctx, &request) {
            Err(response) => response,
            Ok(target) => {
                let error = HandlerError::BodyTooLarge {
                    size,
                    limit: self.max_body_size,
                };
                let patch_missing = request.method == Method::Patch
                    && !tokio::fs::try_exists(&target.full).await.unwrap_or(false);
                match request.method {
                    Method::Patch if patch_missing => write::patch_not_found(ctx),
                    Method::Post => write::failure(ctx, POST_FAILURE, &error),
                    Method::Put => write::failure(ctx, PUT_FAILURE, &error),
                    Method::Patch => write::failure(ctx, PATCH_FAILURE, &error),
                    other => write::failure(
                        ctx,
                        &format!("Failed to process {other} request"),
                        &error,
                    ),
                }
            }
        };

        Some(Reply {
            method: request.method.to_string(),
            path: request.path,
            query: request.query,
            version: request.version,
            response,
        })
    }

    /// Method flag, path resolution, blacklist and file-type checks.
    ///
    /// OPTIONS, CONNECT and TRACE never touch the file, so the file-type
    /// check skips them.
    fn gate(&self, ctx: HandlerContext<'_>, request: &Request) -> Result<ResolvedTarget, Response> {
        if !self.settings.is_enabled(request.method) {
            logger::log_warning(&format!("Method not allowed: {}", request.method));
            return Err(self.method_not_allowed(ctx.version));
        }

        let target = match security::resolve(
            self.settings.root(),
            self.settings.main_file(),
            &request.path,
        ) {
            Ok(target) => target,
            Err(e) => {
                logger::log_warning(&e.to_string());
                return Err(self.forbidden_html(ctx, INVALID_PATH_HTML));
            }
        };

        if self.settings.is_blacklisted(&target.relative) {
            return Err(self.forbidden_html(ctx, BLACKLISTED_HTML));
        }

        let serves_file = !matches!(
            request.method,
            Method::Options | Method::Connect | Method::Trace
        );
        if serves_file && self.policy.is_forbidden(&target.full) {
            logger::log_warning(&format!(
                "Forbidden file type requested: {}",
                target.relative
            ));
            return Err(self.forbidden_type(ctx, request.method));
        }

        Ok(target)
    }

    async fn route(&self, request: &Request) -> Response {
        let ctx = HandlerContext {
            version: request.version,
            server_name: &self.server_name,
        };
        let target = match self.gate(ctx, request) {
            Ok(target) => target,
            Err(response) => return response,
        };

        let limit = self.max_body_size;
        match request.method {
            Method::Get | Method::Head => {
                let host = request.header("host").unwrap_or("localhost");
                static_files::serve(
                    ctx,
                    &target,
                    &request.query,
                    host,
                    &self.runner,
                    request.method == Method::Head,
                )
                .await
            }
            Method::Post => write::post(ctx, &target, &request.body, limit)
                .await
                .unwrap_or_else(|e| write::failure(ctx, POST_FAILURE, &e)),
            Method::Put => write::put(ctx, &target, &request.body, limit)
                .await
                .unwrap_or_else(|e| write::failure(ctx, PUT_FAILURE, &e)),
            Method::Patch => write::patch(ctx, &target, &request.body, limit)
                .await
                .unwrap_or_else(|e| write::failure(ctx, PATCH_FAILURE, &e)),
            Method::Delete => delete::delete(ctx, &target, self.settings.main_file()).await,
            Method::Options => misc::options(ctx),
            Method::Connect => misc::connect(ctx, &request.path),
            Method::Trace => misc::trace(ctx, &target, &request.raw).await,
        }
    }

    fn forbidden_html(&self, ctx: HandlerContext<'_>, html: &'static str) -> Response {
        build_html_response(ctx.version, StatusCode::FORBIDDEN, html, &self.server_name)
    }

    /// HTML for the read-style methods, JSON for the mutating ones
    fn forbidden_type(&self, ctx: HandlerContext<'_>, method: Method) -> Response {
        match method {
            Method::Delete => build_json_response(
                ctx.version,
                StatusCode::FORBIDDEN,
                &Envelope::error("Deletion of this resource is not allowed"),
                &self.server_name,
            ),
            m if m.is_mutating() => build_json_response(
                ctx.version,
                StatusCode::FORBIDDEN,
                &Envelope::error(FORBIDDEN_TYPE_MESSAGE),
                &self.server_name,
            ),
            Method::Head => self.forbidden_html(ctx, FORBIDDEN_TYPE_HTML).without_body(),
            _ => self.forbidden_html(ctx, FORBIDDEN_TYPE_HTML),
        }
    }
}

/// Last-resort 500, also used by the front-ends when a dispatch task panics
pub fn internal_error_response(server_name: &str, message: &str) -> Response {
    build_html_response(
        HttpVersion::Http11,
        StatusCode::INTERNAL_SERVER_ERROR,
        format!(
            "<html><body><h1>500 Internal Server Error</h1><p>An unexpected error occurred: {}</p></body></html>",
            escape_html(message)
        ),
        server_name,
    )
}
