//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension.

use std::path::Path;

/// Get MIME Content-Type based on a lowercased file extension
///
/// # Examples
/// ```
/// use origin_httpd::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("html")), "text/html");
/// assert_eq!(get_content_type(Some("mp4")), "video/mp4");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    match extension {
        // Text
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("txt" | "log" | "conf" | "ini" | "toml" | "properties" | "env" | "lock") => {
            "text/plain"
        }
        Some("xml") => "text/xml",
        Some("csv") => "text/csv",
        Some("md") => "text/markdown",
        Some("rtf") => "text/rtf",
        Some("yaml" | "yml") => "text/yaml",

        // Source code
        Some("py") => "text/x-python",
        Some("java") => "text/x-java-source",
        Some("cpp") => "text/x-c++src",
        Some("c") => "text/x-csrc",
        Some("h") => "text/x-chdr",
        Some("php") => "text/x-php",
        Some("rb") => "text/x-ruby",
        Some("go") => "text/x-go",
        Some("rs") => "text/x-rust",
        Some("sh") => "text/x-shellscript",
        Some("sql") => "text/x-sql",

        // Images
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("ico") => "image/x-icon",
        Some("tiff" | "tif") => "image/tiff",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",

        // Video
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("flv") => "video/x-flv",
        Some("wmv") => "video/x-ms-wmv",
        Some("3gp") => "video/3gpp",
        Some("m4v") => "video/x-m4v",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("aac") => "audio/aac",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("wma") => "audio/x-ms-wma",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        // Documents and data
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("manifest" | "webmanifest") => "application/manifest+json",
        Some("rss") => "application/rss+xml",
        Some("atom") => "application/atom+xml",

        // Archives
        Some("zip") => "application/zip",
        Some("rar") => "application/vnd.rar",
        Some("7z") => "application/x-7z-compressed",
        Some("tar") => "application/x-tar",
        Some("gz") => "application/gzip",
        Some("xz") => "application/x-xz",

        // Packages and binaries
        Some("exe") => "application/x-msdownload",
        Some("msi") => "application/x-msi",
        Some("deb") => "application/vnd.debian.binary-package",
        Some("rpm") => "application/x-redhat-package-manager",
        Some("dmg") => "application/x-apple-diskimage",

        // Default
        _ => "application/octet-stream",
    }
}

/// Lowercased extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Content-Type for a path on disk
pub fn content_type_for(path: &Path) -> &'static str {
    get_content_type(extension_of(path).as_deref())
}
