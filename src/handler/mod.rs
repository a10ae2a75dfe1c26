//! Request handler module
//!
//! The request-handling engine shared by both transports: the dispatcher,
//! the site settings it owns, and one handler per HTTP method.

pub mod delete;
pub mod error;
pub mod misc;
pub mod router;
pub mod settings;
pub mod static_files;
pub mod write;

use crate::http::HttpVersion;

// Re-export main entry point
pub use error::HandlerError;
pub use router::{internal_error_response, Dispatcher, Reply};
pub use settings::SiteSettings;

/// Values every method handler needs to build its response
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub version: HttpVersion,
    pub server_name: &'a str,
}
