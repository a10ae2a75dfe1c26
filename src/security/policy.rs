//! Policy tables
//!
//! Read-only lookup tables built once at startup and shared by every worker:
//! the forbidden-extension deny-list and the backend interpreter map.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::http::mime::extension_of;

/// Extensions that are never served or mutated, whatever the method
const FORBIDDEN_EXTENSIONS: &[&str] = &[
    // interpreted and compiled sources
    "py", "pyc", "pyo", "pyd", "pyw", "pyz",
    "java", "class", "jar",
    "cpp", "c", "h", "hpp", "cc", "cxx",
    "php", "php3", "php4", "php5", "phtml",
    "rb", "rbw",
    "go",
    "rs",
    "sh", "bash", "zsh", "fish",
    "bat", "cmd", "ps1",
    "sql",
    "pl", "pm",
    "lua",
    "r",
    "swift",
    "kt", "kts",
    "scala",
    "clj", "cljs",
    "hs",
    "ml", "mli",
    "fs", "fsi", "fsx",
    "vb", "vbs",
    "asp", "aspx", "ascx",
    "jsp", "jspx",
    // configuration and credentials
    "env", "environment",
    "config", "cfg", "conf",
    "ini",
    "yaml", "yml",
    "toml",
    "properties",
    "plist",
    "htaccess", "htpasswd",
    "gitignore", "gitconfig",
    "dockerignore", "dockerfile",
    "makefile", "cmake",
    "gradle",
    "npmrc", "yarnrc",
    // runtime leftovers
    "log", "logs",
    "tmp", "temp",
    "bak", "backup",
    "old", "orig",
    "swp", "swo",
    "pid",
    "sock",
    "lock",
    // binaries and packages
    "exe", "msi", "app", "deb", "rpm", "dmg", "pkg",
    "bin", "run", "out",
    "so", "dll", "dylib",
    // databases
    "db", "sqlite", "sqlite3",
    "mdb", "accdb",
    "dbf",
    // archives
    "rar", "7z", "tar", "gz", "bz2", "xz", "lz",
    // keys and certificates
    "key", "pem", "crt", "cer", "p12", "pfx", "jks",
    // build artefacts
    "pdb", "map", "debug",
    "deps", "packages",
    "node_modules",
    "vendor",
];

/// Extension to interpreter command; the script path is appended as last argument
const BACKEND_INTERPRETERS: &[(&str, &[&str])] = &[
    ("py", &["python"]),
    ("php", &["php"]),
    ("rb", &["ruby"]),
    ("js", &["node"]),
    ("go", &["go", "run"]),
    ("java", &["java"]),
    ("pl", &["perl"]),
    ("lua", &["lua"]),
    ("r", &["Rscript"]),
];

/// Immutable security and execution policy
#[derive(Debug, Clone)]
pub struct Policy {
    forbidden: HashSet<String>,
    interpreters: HashMap<String, Vec<String>>,
}

impl Policy {
    /// The built-in tables
    pub fn standard() -> Self {
        Self {
            forbidden: FORBIDDEN_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            interpreters: BACKEND_INTERPRETERS
                .iter()
                .map(|(ext, cmd)| {
                    (
                        (*ext).to_string(),
                        cmd.iter().map(|c| (*c).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Register or replace an interpreter
    #[must_use]
    pub fn with_interpreter(mut self, extension: &str, command: &[&str]) -> Self {
        self.interpreters.insert(
            extension.to_ascii_lowercase(),
            command.iter().map(|c| (*c).to_string()).collect(),
        );
        self
    }

    /// True iff the lowercased extension is on the deny-list
    pub fn is_forbidden(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.forbidden.contains(&ext))
    }

    /// Interpreter command for a path, if its extension is executable
    pub fn interpreter_for(&self, path: &Path) -> Option<&[String]> {
        extension_of(path)
            .and_then(|ext| self.interpreters.get(&ext))
            .map(Vec::as_slice)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_extensions() {
        let policy = Policy::standard();
        assert!(policy.is_forbidden(Path::new("secret.env")));
        assert!(policy.is_forbidden(Path::new("app.py")));
        assert!(policy.is_forbidden(Path::new("dir/KEY.PEM")));
        assert!(!policy.is_forbidden(Path::new("index.html")));
        assert!(!policy.is_forbidden(Path::new("Makefile")));
    }

    #[test]
    fn test_interpreters() {
        let policy = Policy::standard();
        assert_eq!(
            policy.interpreter_for(Path::new("main.go")),
            Some(&["go".to_string(), "run".to_string()][..])
        );
        assert!(policy.interpreter_for(Path::new("app.JS")).is_some());
        assert!(policy.interpreter_for(Path::new("page.html")).is_none());
    }

    #[test]
    fn test_only_js_escapes_the_deny_list() {
        let policy = Policy::standard();
        let runnable: Vec<&str> = BACKEND_INTERPRETERS
            .iter()
            .map(|(ext, _)| *ext)
            .filter(|ext| !policy.is_forbidden(Path::new(&format!("x.{ext}"))))
            .collect();
        assert_eq!(runnable, vec!["js"]);
    }

    #[test]
    fn test_custom_interpreter() {
        let policy = Policy::standard().with_interpreter("TXT", &["cat"]);
        assert_eq!(
            policy.interpreter_for(Path::new("a.txt")),
            Some(&["cat".to_string()][..])
        );
    }
}
