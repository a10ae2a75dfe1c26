// Configuration module entry point
// Loads layered configuration and owns the persisted request state

mod persist;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use persist::{detect_local_ip, PersistentState, StateStore};
pub use types::{
    BackendConfig, Config, ConsoleConfig, HttpConfig, LoggingConfig, MethodsConfig,
    PerformanceConfig, ServerConfig, SiteConfig, StateConfig,
};

impl Config {
    /// Load configuration from specified file path (extension optional).
    /// A missing file is not an error; defaults and `HTTPD_*` variables apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("HTTPD").separator("__"))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.tcp_port", 8080)?
            .set_default("server.udp_port", 8080)?
            .set_default("server.enable_tcp", true)?
            .set_default("server.enable_udp", true)?
            .set_default("site.root", "./")?
            .set_default("site.main_file", "index.html")?
            .set_default("backend.enabled", false)?
            .set_default("backend.timeout_secs", 30)?
            .set_default("http.server_name", "origin-httpd/0.1")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.max_request_size", 10_551_296)? // body limit + 64KB head
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "plain")?
            .set_default("state.path", "assets/state.json")?
            .set_default("state.save_interval_secs", 5)?
            .set_default("state.detect_ip", true)?
            .set_default("console.banner", true)?
            .set_default("console.title", false)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn tcp_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.tcp_port)
            .parse()
            .map_err(|e| format!("Invalid TCP address: {e}"))
    }

    pub fn udp_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.udp_port)
            .parse()
            .map_err(|e| format!("Invalid UDP address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let cfg = Config::load_from(missing.to_str().unwrap()).unwrap();

        assert_eq!(cfg.site.main_file, "index.html");
        assert_eq!(cfg.http.max_body_size, 10 * 1024 * 1024);
        assert_eq!(cfg.backend.timeout_secs, 30);
        assert!(!cfg.backend.enabled);
        assert!(cfg.site.blacklist.is_empty());
        assert_eq!(cfg.methods, MethodsConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
tcp_port = 9090

[site]
root = "/srv/www"
main_file = "home.html"
blacklist = ["private/notes.txt"]

[methods]
delete = false
trace = false
"#,
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.tcp_socket_addr().unwrap().port(), 9090);
        assert_eq!(cfg.udp_socket_addr().unwrap().port(), 8080);
        assert_eq!(cfg.site.root, "/srv/www");
        assert_eq!(cfg.site.main_file, "home.html");
        assert_eq!(cfg.site.blacklist, vec!["private/notes.txt".to_string()]);
        assert!(!cfg.methods.delete);
        assert!(!cfg.methods.trace);
        assert!(cfg.methods.get);
    }

    #[test]
    fn test_invalid_host_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::load_from(dir.path().join("x").to_str().unwrap()).unwrap();
        cfg.server.host = "not a host".to_string();
        assert!(cfg.tcp_socket_addr().is_err());
        assert!(cfg.udp_socket_addr().is_err());
    }
}
