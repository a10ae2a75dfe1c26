//! Backend script runner
//!
//! Executes a script through the interpreter registered for its extension,
//! CGI style: request data goes in through the environment, the page comes
//! back on stdout. Output is buffered fully before the caller sees it.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::http::mime::extension_of;
use crate::security::Policy;

/// Default bound on a single script run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Backend execution is disabled")]
    Disabled,
    #[error("Unsupported backend language: {0}")]
    Unsupported(String),
    #[error("Script execution failed: {0}")]
    ScriptFailed(String),
    #[error("Script execution timeout")]
    Timeout,
    #[error("Interpreter not found for {0} files")]
    InterpreterNotFound(String),
    #[error("Execution error: {0}")]
    Spawn(io::Error),
}

/// Runs backend scripts as child processes
#[derive(Debug, Clone)]
pub struct BackendRunner {
    enabled: bool,
    timeout: Duration,
    policy: Arc<Policy>,
}

impl BackendRunner {
    pub const fn new(enabled: bool, timeout: Duration, policy: Arc<Policy>) -> Self {
        Self {
            enabled,
            timeout,
            policy,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True when the extension has a registered interpreter
    pub fn handles(&self, file: &Path) -> bool {
        self.policy.interpreter_for(file).is_some()
    }

    /// Run `file` and return its standard output.
    ///
    /// The child gets a cleared environment with the CGI variables, runs in
    /// the script's directory and is killed if it outlives the timeout.
    pub async fn execute(
        &self,
        file: &Path,
        query: &str,
        host: &str,
    ) -> Result<String, BackendError> {
        if !self.enabled {
            return Err(BackendError::Disabled);
        }

        let ext = extension_of(file).unwrap_or_default();
        let Some((program, args)) = self
            .policy
            .interpreter_for(file)
            .and_then(|command| command.split_first())
        else {
            return Err(BackendError::Unsupported(ext));
        };

        let dir = file.parent().filter(|p| !p.as_os_str().is_empty());
        let script = match dir {
            Some(_) => file.file_name().unwrap_or(file.as_os_str()),
            None => file.as_os_str(),
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .arg(script)
            .env_clear()
            .env("QUERY_STRING", query)
            .env("REQUEST_METHOD", "GET")
            .env("CONTENT_TYPE", "text/html")
            .env("HTTP_HOST", host)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(path) = std::env::var_os("PATH") {
            command.env("PATH", path);
        }
        if let Some(dir) = dir {
            command.current_dir(dir);
            if ext == "py" {
                command.env("PYTHONPATH", dir);
            }
        } else if ext == "py" {
            command.env("PYTHONPATH", OsStr::new("."));
        }

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackendError::InterpreterNotFound(ext));
            }
            Ok(Err(e)) => return Err(BackendError::Spawn(e)),
            Err(_) => return Err(BackendError::Timeout),
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(BackendError::ScriptFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn runner(policy: Policy, timeout: Duration) -> BackendRunner {
        BackendRunner::new(true, timeout, Arc::new(policy))
    }

    #[tokio::test]
    async fn test_disabled_fails_closed() {
        let runner = BackendRunner::new(false, DEFAULT_TIMEOUT, Arc::new(Policy::standard()));
        let err = runner.execute(Path::new("app.js"), "", "localhost").await.unwrap_err();
        assert!(matches!(err, BackendError::Disabled));
        assert_eq!(err.to_string(), "Backend execution is disabled");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let runner = runner(Policy::standard(), DEFAULT_TIMEOUT);
        let err = runner.execute(Path::new("page.html"), "", "localhost").await.unwrap_err();
        assert_eq!(err.to_string(), "Unsupported backend language: html");
    }

    #[tokio::test]
    async fn test_stdout_is_returned() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("hello.txt");
        fs::write(&script, "<p>hello</p>").unwrap();

        let runner = runner(
            Policy::standard().with_interpreter("txt", &["cat"]),
            DEFAULT_TIMEOUT,
        );
        let out = runner.execute(&script, "", "localhost").await.unwrap();
        assert_eq!(out, "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_cgi_environment() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("env.cgi");
        fs::write(
            &script,
            "printf '%s|%s|%s' \"$QUERY_STRING\" \"$REQUEST_METHOD\" \"$HTTP_HOST\"",
        )
        .unwrap();

        let runner = runner(
            Policy::standard().with_interpreter("cgi", &["sh"]),
            DEFAULT_TIMEOUT,
        );
        let out = runner.execute(&script, "a=1&b=2", "example.org").await.unwrap();
        assert_eq!(out, "a=1&b=2|GET|example.org");
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fail.cgi");
        fs::write(&script, "echo boom >&2; exit 3").unwrap();

        let runner = runner(
            Policy::standard().with_interpreter("cgi", &["sh"]),
            DEFAULT_TIMEOUT,
        );
        let err = runner.execute(&script, "", "localhost").await.unwrap_err();
        assert_eq!(err.to_string(), "Script execution failed: boom\n");
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("x.txt");
        fs::write(&script, "").unwrap();

        let runner = runner(
            Policy::standard().with_interpreter("txt", &["origin-httpd-no-such-interpreter"]),
            DEFAULT_TIMEOUT,
        );
        let err = runner.execute(&script, "", "localhost").await.unwrap_err();
        assert_eq!(err.to_string(), "Interpreter not found for txt files");
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("slow.cgi");
        fs::write(&script, "sleep 5").unwrap();

        let runner = runner(
            Policy::standard().with_interpreter("cgi", &["sh"]),
            Duration::from_millis(300),
        );
        let started = std::time::Instant::now();
        let err = runner.execute(&script, "", "localhost").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
