// State persistence module
// Keeps the request counter and public address in a small JSON file

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::logger;

/// Persistent state - serialized to the state file
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PersistentState {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub request_count: u64,
}

/// Request counter shared by every worker, flushed to disk periodically
pub struct StateStore {
    path: PathBuf,
    ip: String,
    request_count: AtomicU64,
    /// Serializes writers of the state file
    save_lock: Mutex<()>,
}

impl StateStore {
    /// Open the store, loading any previous state.
    ///
    /// A freshly detected address replaces the stored one.
    pub fn open(path: impl Into<PathBuf>, detected_ip: Option<IpAddr>) -> Self {
        let path = path.into();
        let previous = Self::load_state(&path).unwrap_or_default();

        let ip = match detected_ip {
            Some(addr) => addr.to_string(),
            None if previous.ip.is_empty() => "127.0.0.1".to_string(),
            None => previous.ip,
        };

        Self {
            path,
            ip,
            request_count: AtomicU64::new(previous.request_count),
            save_lock: Mutex::new(()),
        }
    }

    fn load_state(path: &Path) -> Option<PersistentState> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => Some(state),
                Err(e) => {
                    logger::log_error(&format!(
                        "Failed to parse state file {}: {e}",
                        path.display()
                    ));
                    None
                }
            },
            Err(e) => {
                logger::log_error(&format!(
                    "Failed to read state file {}: {e}",
                    path.display()
                ));
                None
            }
        }
    }

    pub fn get_ip(&self) -> &str {
        &self.ip
    }

    /// Count one served request, returning the new total
    pub fn increment_request_count(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PersistentState {
        PersistentState {
            ip: self.ip.clone(),
            request_count: self.request_count(),
        }
    }

    /// Write the current state to disk
    pub fn save(&self) -> Result<(), String> {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let content = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| format!("Failed to serialize state: {e}"))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create state directory: {e}"))?;
            }
        }

        fs::write(&self.path, content).map_err(|e| format!("Failed to write state file: {e}"))
    }

    #[allow(clippy::missing_const_for_fn)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save in the background whenever the counter moved, until `shutdown` fires
    pub fn spawn_autosave(
        self: &Arc<Self>,
        every: Duration,
        shutdown: Arc<Notify>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let mut last_saved = store.request_count();
            let shutdown = shutdown.notified();
            tokio::pin!(shutdown);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let current = store.request_count();
                        if current != last_saved {
                            if let Err(e) = store.save() {
                                logger::log_error(&e);
                            }
                            last_saved = current;
                        }
                    }
                    () = &mut shutdown => break,
                }
            }
        })
    }
}

/// Address of the interface used for outbound traffic.
///
/// Connecting a UDP socket only selects a route; nothing is sent.
pub fn detect_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}
