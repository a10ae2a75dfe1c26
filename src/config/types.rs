// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub methods: MethodsConfig,
    pub backend: BackendConfig,
    pub http: HttpConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
    pub state: StateConfig,
    pub console: ConsoleConfig,
}

/// Listener configuration for both transports
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    pub enable_tcp: bool,
    pub enable_udp: bool,
    /// Tokio worker threads, CPU count when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

/// What gets served and from where
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SiteConfig {
    /// Directory every request path is confined to
    pub root: String,
    /// File served for `/`, never deletable
    pub main_file: String,
    /// Relative paths refused regardless of extension
    #[serde(default)]
    pub blacklist: Vec<String>,
}

/// Per-method enable flags
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct MethodsConfig {
    pub get: bool,
    pub head: bool,
    pub post: bool,
    pub put: bool,
    pub delete: bool,
    pub connect: bool,
    pub options: bool,
    pub trace: bool,
    pub patch: bool,
}

impl Default for MethodsConfig {
    fn default() -> Self {
        Self {
            get: true,
            head: true,
            post: true,
            put: true,
            delete: true,
            connect: true,
            options: true,
            trace: true,
            patch: true,
        }
    }
}

/// Backend script execution
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    /// Upper bound for POST/PUT/PATCH bodies
    pub max_body_size: u64,
}

/// Performance configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PerformanceConfig {
    pub read_timeout: u64,
    pub max_connections: Option<u64>,
    /// Largest TCP request (head + body) read before dispatch
    pub max_request_size: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (plain, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set).
    /// May contain strftime placeholders for one file per day.
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "plain".to_string()
}

/// Persisted request counter and public address
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StateConfig {
    pub path: String,
    pub save_interval_secs: u64,
    pub detect_ip: bool,
}

/// Startup banner and terminal title
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsoleConfig {
    pub banner: bool,
    pub title: bool,
}
