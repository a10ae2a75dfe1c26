//! Log writer module
//!
//! Provides thread-safe log writing to files or stdout/stderr.
//! A file path containing strftime placeholders is re-resolved on every
//! write, so `logs/%d-%m-%Y.log` yields one file per day.

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Global log writer instance
static LOG_WRITER: OnceLock<LogWriter> = OnceLock::new();

/// Log output target
enum LogTarget {
    /// Write to stdout
    Stdout,
    /// Write to stderr
    Stderr,
    /// Write to a fixed file
    File(Mutex<File>),
    /// Write to a file whose name depends on the current date
    Dated(Mutex<DatedFile>),
}

/// File target whose path is a strftime pattern
struct DatedFile {
    pattern: String,
    current_path: PathBuf,
    file: Option<File>,
}

impl DatedFile {
    fn new(pattern: &str) -> io::Result<Self> {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid date pattern in log path: {pattern}"),
            ));
        }
        Ok(Self {
            pattern: pattern.to_string(),
            current_path: PathBuf::new(),
            file: None,
        })
    }

    fn resolve(&self) -> PathBuf {
        PathBuf::from(Local::now().format(&self.pattern).to_string())
    }

    fn write_line(&mut self, message: &str) -> io::Result<()> {
        let path = self.resolve();
        if self.file.is_none() || path != self.current_path {
            self.file = Some(open_log_file(&path)?);
            self.current_path = path;
        }
        match self.file.as_mut() {
            Some(f) => writeln!(f, "{message}"),
            None => Ok(()),
        }
    }
}

/// Thread-safe log writer
pub struct LogWriter {
    /// Access log target
    access: LogTarget,
    /// Error log target
    error: LogTarget,
}

impl LogWriter {
    /// Create a new log writer with optional file paths
    fn new(access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<Self> {
        Ok(Self {
            access: open_target(access_log_file, LogTarget::Stdout)?,
            error: open_target(error_log_file, LogTarget::Stderr)?,
        })
    }

    /// Write to access log
    pub fn write_access(&self, message: &str) {
        write_to_target(&self.access, message);
    }

    /// Write to error log
    pub fn write_error(&self, message: &str) {
        write_to_target(&self.error, message);
    }

    /// Write info message (to access log target)
    pub fn write_info(&self, message: &str) {
        write_to_target(&self.access, message);
    }
}

fn open_target(path: Option<&str>, console: LogTarget) -> io::Result<LogTarget> {
    match path {
        Some(p) if p.contains('%') => Ok(LogTarget::Dated(Mutex::new(DatedFile::new(p)?))),
        Some(p) => Ok(LogTarget::File(Mutex::new(open_log_file(Path::new(p))?))),
        None => Ok(console),
    }
}

/// Open or create a log file for appending
fn open_log_file(path: &Path) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}

/// Write message to log target
fn write_to_target(target: &LogTarget, message: &str) {
    match target {
        LogTarget::Stdout => {
            println!("{message}");
        }
        LogTarget::Stderr => {
            eprintln!("{message}");
        }
        LogTarget::File(file) => {
            let mut f = file.lock().unwrap_or_else(PoisonError::into_inner);
            let _ = writeln!(f, "{message}");
        }
        LogTarget::Dated(dated) => {
            let mut d = dated.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = d.write_line(message) {
                eprintln!("[ERROR] Failed to write log file: {e}");
            }
        }
    }
}

/// Initialize the global log writer
///
/// This should be called once at application startup.
/// Returns error if log files cannot be opened.
pub fn init(access_log_file: Option<&str>, error_log_file: Option<&str>) -> io::Result<()> {
    let writer = LogWriter::new(access_log_file, error_log_file)?;
    LOG_WRITER.set(writer).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            "Log writer already initialized",
        )
    })
}

/// Get the global log writer, if `init()` has been called
pub fn get() -> Option<&'static LogWriter> {
    LOG_WRITER.get()
}
