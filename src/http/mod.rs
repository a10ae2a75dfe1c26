//! HTTP protocol layer module
//!
//! Request-line parsing, response serialization and the static lookup tables
//! (MIME types, cache policies). Nothing here touches the filesystem.

pub mod cache;
pub mod mime;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::{HttpVersion, Method, ParseError, Request};
pub use response::{
    build_html_response, build_json_response, build_text_response, escape_html, http_date, Response,
};
