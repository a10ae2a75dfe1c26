//! HTTP request parsing module
//!
//! Parses the request line strictly (`METHOD SP target SP HTTP/x.y`) and keeps
//! the rest of the message available for handlers that need it.

use hyper::body::Bytes;
use std::collections::HashMap;
use std::fmt;

/// The nine methods the server knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// Canonical order, used when listing methods in an `Allow` header
    pub const ALL: [Self; 9] = [
        Self::Get,
        Self::Head,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Connect,
        Self::Options,
        Self::Trace,
        Self::Patch,
    ];

    /// Case-sensitive token lookup
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == token)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Patch => "PATCH",
        }
    }

    /// Methods whose body is extracted from the message
    pub const fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// Methods that answer with JSON envelopes rather than HTML
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Delete | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    Http10,
    #[default]
    Http11,
}

impl HttpVersion {
    /// Validate a version token.
    ///
    /// Anything not starting with `HTTP/` is malformed; a well-formed but
    /// unknown version (e.g. `HTTP/2.0`) is unsupported.
    pub fn parse(token: &str) -> Result<Self, ParseError> {
        if !token.starts_with("HTTP/") {
            return Err(ParseError::BadVersion(token.to_string()));
        }
        match token {
            "HTTP/1.0" => Ok(Self::Http10),
            "HTTP/1.1" => Ok(Self::Http11),
            other => Err(ParseError::UnsupportedVersion(other.to_string())),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
        }
    }

    /// Version number without the `HTTP/` prefix
    pub const fn number(self) -> &'static str {
        match self {
            Self::Http10 => "1.0",
            Self::Http11 => "1.1",
        }
    }
}

/// Why a message could not become a [`Request`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid character encoding in request")]
    Encoding,
    #[error("Malformed request line: expected 3 tokens, found {0}")]
    TokenCount(usize),
    #[error("Invalid HTTP version")]
    BadVersion(String),
    #[error("HTTP version {0} not supported")]
    UnsupportedVersion(String),
    #[error("Unknown method {token}")]
    UnknownMethod { token: String, version: HttpVersion },
}

/// A parsed request, immutable once built
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Target path before the first `?`, not percent-decoded
    pub path: String,
    /// Everything after the first `?`, empty when absent
    pub query: String,
    pub version: HttpVersion,
    /// Header names lowercased; repeated headers joined with `, `
    pub headers: HashMap<String, String>,
    /// Present only for POST/PUT/PATCH
    pub body: Bytes,
    /// Full decoded message, echoed by TRACE
    pub raw: String,
}

impl Request {
    /// Parse raw bytes.
    ///
    /// `Ok(None)` means the first line is empty and nothing should be sent.
    pub fn parse(raw: &[u8]) -> Result<Option<Self>, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::Encoding)?;
        Self::parse_text(text)
    }

    /// Parse an already-decoded message
    pub fn parse_text(text: &str) -> Result<Option<Self>, ParseError> {
        let Some(line) = text.lines().next().filter(|l| !l.is_empty()) else {
            return Ok(None);
        };

        let (method_token, target, version_token) = split_request_line(line)?;
        let (path, query) = split_target(target);
        let version = HttpVersion::parse(version_token)?;
        let method = Method::from_token(method_token).ok_or_else(|| ParseError::UnknownMethod {
            token: method_token.to_string(),
            version,
        })?;

        let body = if method.carries_body() {
            extract_body(text)
        } else {
            Bytes::new()
        };

        Ok(Some(Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            version,
            headers: parse_headers(text),
            body,
            raw: text.to_string(),
        }))
    }

    /// Header lookup by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Split a request line into exactly three whitespace-separated tokens
pub fn split_request_line(line: &str) -> Result<(&str, &str, &str), ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [method, target, version] => Ok((*method, *target, *version)),
        other => Err(ParseError::TokenCount(other.len())),
    }
}

/// Split a target on the first `?` into path and query
pub fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

/// Everything after the first blank line; empty when there is none
pub fn extract_body(text: &str) -> Bytes {
    text.split_once("\r\n\r\n")
        .map(|(_, body)| Bytes::copy_from_slice(body.as_bytes()))
        .unwrap_or_default()
}

fn parse_headers(text: &str) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for line in text.lines().skip(1).take_while(|l| !l.is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        headers
            .entry(name)
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    headers
}
