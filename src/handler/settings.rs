//! Site settings owned by the dispatcher
//!
//! Built once from [`Config`] and adjusted only through the setters below,
//! before the server starts serving.

use std::path::{Path, PathBuf};

use crate::config::{Config, MethodsConfig};
use crate::http::Method;
use crate::security;

#[derive(Debug, Clone)]
pub struct SiteSettings {
    root: PathBuf,
    main_file: String,
    methods: MethodsConfig,
    backend_enabled: bool,
    /// Normalized relative paths, insertion order kept
    blacklist: Vec<String>,
}

impl SiteSettings {
    /// All methods enabled, backend off, empty blacklist
    pub fn new(root: impl Into<PathBuf>, main_file: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            main_file: main_file.into(),
            methods: MethodsConfig::default(),
            backend_enabled: false,
            blacklist: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut settings = Self::new(&config.site.root, &config.site.main_file);
        settings.methods = config.methods;
        settings.enable_backend(config.backend.enabled);
        for entry in &config.site.blacklist {
            settings.add_blacklist(entry);
        }
        settings
    }

    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
    }

    pub fn set_main_file(&mut self, main_file: impl Into<String>) {
        self.main_file = main_file.into();
    }

    pub fn allow_method(&mut self, method: Method) {
        *flag_mut(&mut self.methods, method) = true;
    }

    pub fn disable_method(&mut self, method: Method) {
        *flag_mut(&mut self.methods, method) = false;
    }

    pub fn enable_backend(&mut self, enabled: bool) {
        self.backend_enabled = enabled;
    }

    /// Add a path (relative to the root, leading `/` optional).
    /// Returns false if it was already listed.
    pub fn add_blacklist(&mut self, path: &str) -> bool {
        let entry = security::normalize(path.trim_start_matches('/'));
        if self.blacklist.contains(&entry) {
            return false;
        }
        self.blacklist.push(entry);
        true
    }

    /// Returns true if the path was listed
    pub fn remove_blacklist(&mut self, path: &str) -> bool {
        let entry = security::normalize(path.trim_start_matches('/'));
        let before = self.blacklist.len();
        self.blacklist.retain(|p| *p != entry);
        self.blacklist.len() != before
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    pub const fn backend_enabled(&self) -> bool {
        self.backend_enabled
    }

    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }

    /// `relative` must already be normalized
    pub fn is_blacklisted(&self, relative: &str) -> bool {
        self.blacklist.iter().any(|p| p == relative)
    }

    pub const fn is_enabled(&self, method: Method) -> bool {
        flag(&self.methods, method)
    }

    /// Enabled methods in canonical order, formatted for an `Allow` header
    pub fn allowed_methods(&self) -> String {
        Method::ALL
            .into_iter()
            .filter(|m| self.is_enabled(*m))
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

const fn flag(methods: &MethodsConfig, method: Method) -> bool {
    match method {
        Method::Get => methods.get,
        Method::Head => methods.head,
        Method::Post => methods.post,
        Method::Put => methods.put,
        Method::Delete => methods.delete,
        Method::Connect => methods.connect,
        Method::Options => methods.options,
        Method::Trace => methods.trace,
        Method::Patch => methods.patch,
    }
}

fn flag_mut(methods: &mut MethodsConfig, method: Method) -> &mut bool {
    match method {
        Method::Get => &mut methods.get,
        Method::Head => &mut methods.head,
        Method::Post => &mut methods.post,
        Method::Put => &mut methods.put,
        Method::Delete => &mut methods.delete,
        Method::Connect => &mut methods.connect,
        Method::Options => &mut methods.options,
        Method::Trace => &mut methods.trace,
        Method::Patch => &mut methods.patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_methods_follow_flags() {
        let mut settings = SiteSettings::new("./", "index.html");
        assert_eq!(
            settings.allowed_methods(),
            "GET, HEAD, POST, PUT, DELETE, CONNECT, OPTIONS, TRACE, PATCH"
        );

        settings.disable_method(Method::Delete);
        settings.disable_method(Method::Trace);
        assert!(!settings.is_enabled(Method::Delete));
        assert_eq!(
            settings.allowed_methods(),
            "GET, HEAD, POST, PUT, CONNECT, OPTIONS, PATCH"
        );

        settings.allow_method(Method::Delete);
        assert!(settings.is_enabled(Method::Delete));
    }

    #[test]
    fn test_blacklist_entries_are_normalized() {
        let mut settings = SiteSettings::new("./", "index.html");
        assert!(settings.add_blacklist("/private/./notes.txt"));
        assert!(!settings.add_blacklist("private/notes.txt"));
        assert!(settings.is_blacklisted("private/notes.txt"));

        assert!(settings.remove_blacklist("/private/notes.txt"));
        assert!(!settings.remove_blacklist("/private/notes.txt"));
        assert!(settings.blacklist().is_empty());
    }

    #[test]
    fn test_setters() {
        let mut settings = SiteSettings::new("./", "index.html");
        settings.set_root("/srv/www");
        settings.set_main_file("home.html");
        settings.enable_backend(true);
        assert_eq!(settings.root(), Path::new("/srv/www"));
        assert_eq!(settings.main_file(), "home.html");
        assert!(settings.backend_enabled());
    }
}
