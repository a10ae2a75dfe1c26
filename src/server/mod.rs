// 服务器模块入口
// Transport front-ends (TCP and UDP) feeding the shared dispatcher

pub mod connection;
pub mod datagram;
pub mod listener;
pub mod signal;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinError;

use crate::config::{Config, StateStore};
use crate::console;
use crate::handler::{internal_error_response, Dispatcher, Reply};
use crate::logger::{self, AccessLogEntry};

// 重新导出常用类型
pub use connection::start_tcp_loop;
pub use datagram::start_udp_loop;
pub use listener::{create_tcp_listener, create_udp_socket};

/// Transport a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        })
    }
}

/// Limits applied by the front-ends before dispatch
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub read_timeout: Duration,
    pub max_request_size: usize,
    /// Declared bodies above this are answered without being read
    pub max_body_size: u64,
    pub max_connections: Option<usize>,
}

impl Limits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            read_timeout: Duration::from_secs(config.performance.read_timeout),
            max_request_size: usize::try_from(config.performance.max_request_size)
                .unwrap_or(usize::MAX),
            max_body_size: config.http.max_body_size,
            max_connections: config
                .performance
                .max_connections
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

/// State shared by every worker task of both front-ends
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: Arc<StateStore>,
    pub limits: Limits,
    pub access_log: bool,
    pub access_log_format: String,
    pub console_title: bool,
    in_flight: AtomicUsize,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, store: Arc<StateStore>, config: &Config) -> Self {
        Self {
            dispatcher,
            store,
            limits: Limits::from_config(config),
            access_log: config.logging.access_log,
            access_log_format: config.logging.access_log_format.clone(),
            console_title: config.console.title,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Requests currently being served
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Reserve a worker slot, or `None` when the limit is reached
    pub fn admit(self: &Arc<Self>) -> Option<InFlight> {
        // Increment counter first, then check limit (prevents race condition)
        let prev_count = self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Some(max) = self.limits.max_connections {
            if prev_count >= max {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                logger::log_warning(&format!(
                    "Max connections reached: {prev_count}/{max}. Request rejected."
                ));
                return None;
            }
        }
        Some(InFlight {
            state: Arc::clone(self),
        })
    }

    /// Dispatch one raw request
    pub async fn dispatch(self: &Arc<Self>, raw: Vec<u8>) -> Option<Reply> {
        let state = Arc::clone(self);
        self.guarded(async move { state.dispatcher.handle(&raw).await })
            .await
    }

    /// Dispatch a request whose body was too large to read
    pub async fn dispatch_oversized(
        self: &Arc<Self>,
        head: Vec<u8>,
        size: usize,
    ) -> Option<Reply> {
        let state = Arc::clone(self);
        self.guarded(async move { state.dispatcher.handle_oversized(&head, size).await })
            .await
    }

    /// Run `work` in its own task so a panic still yields a 500
    async fn guarded<F>(&self, work: F) -> Option<Reply>
    where
        F: Future<Output = Option<Reply>> + Send + 'static,
    {
        match tokio::spawn(work).await {
            Ok(reply) => reply,
            Err(e) => {
                let message = panic_message(e);
                logger::log_error(&format!("Request handler crashed: {message}"));
                Some(Reply {
                    method: "-".to_string(),
                    path: "-".to_string(),
                    query: String::new(),
                    version: crate::http::HttpVersion::Http11,
                    response: internal_error_response(self.dispatcher.server_name(), &message),
                })
            }
        }
    }

    /// Bookkeeping after a response went out
    pub fn finish(&self, peer: SocketAddr, transport: Transport, reply: &Reply, started: Instant) {
        let count = self.store.increment_request_count();

        if self.access_log {
            let mut entry = AccessLogEntry::new(
                peer.to_string(),
                reply.method.clone(),
                reply.path.clone(),
                transport,
            );
            entry.query = Some(reply.query.clone()).filter(|q| !q.is_empty());
            entry.http_version = reply.version.number().to_string();
            entry.status = reply.response.status().as_u16();
            entry.body_bytes = reply.response.body_bytes().len();
            entry.request_time_us =
                u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            logger::log_access(&entry, &self.access_log_format);
        }

        if self.console_title {
            console::set_title(self.store.get_ip(), count);
        }
    }
}

/// Text of a panic payload, or the join error itself
fn panic_message(error: JoinError) -> String {
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "request handler panicked".to_string()),
        Err(error) => error.to_string(),
    }
}

/// Worker slot; released on drop
pub struct InFlight {
    state: Arc<AppState>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::handler::SiteSettings;
    use crate::security::Policy;
    use std::path::Path;

    /// Test config with every side channel switched off
    pub fn quiet_config() -> Config {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::load_from(dir.path().join("absent").to_str().unwrap()).unwrap();
        config.logging.access_log = false;
        config.console.title = false;
        config
    }

    pub fn test_state(root: &Path, store_dir: &Path, config: &Config) -> Arc<AppState> {
        let dispatcher = Dispatcher::new(
            SiteSettings::new(root, "index.html"),
            Policy::standard(),
            "test",
        )
        .with_max_body_size(config.http.max_body_size);
        let store = Arc::new(StateStore::open(store_dir.join("state.json"), None));
        Arc::new(AppState::new(dispatcher, store, config))
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(Transport::Tcp.to_string(), "TCP");
        assert_eq!(Transport::Udp.to_string(), "UDP");
    }

    #[test]
    fn test_admission_limit() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = quiet_config();
        config.performance.max_connections = Some(2);
        let state = test_state(dir.path(), dir.path(), &config);

        let a = state.admit().unwrap();
        let b = state.admit().unwrap();
        assert!(state.admit().is_none());
        assert_eq!(state.in_flight(), 2);

        drop(a);
        assert_eq!(state.in_flight(), 1);
        let _c = state.admit().unwrap();
        drop(b);
        assert_eq!(state.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_finish_counts_requests() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = test_state(dir.path(), dir.path(), &quiet_config());

        let reply = state.dispatch(b"OPTIONS / HTTP/1.1\r\n\r\n".to_vec()).await.unwrap();
        state.finish("127.0.0.1:9".parse().unwrap(), Transport::Tcp, &reply, Instant::now());
        assert_eq!(state.store.request_count(), 1);
    }

    async fn exploding_handler() -> Option<Reply> {
        panic!("disk on fire")
    }

    #[tokio::test]
    async fn test_panicking_handler_is_answered_with_500() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = test_state(dir.path(), dir.path(), &quiet_config());

        let reply = state.guarded(exploding_handler()).await.unwrap();
        assert_eq!(reply.method, "-");
        assert_eq!(reply.response.status().as_u16(), 500);
        let body = String::from_utf8_lossy(reply.response.body_bytes()).into_owned();
        assert!(body.contains("An unexpected error occurred: disk on fire"));

        // the state keeps serving afterwards
        let reply = state.dispatch(b"OPTIONS / HTTP/1.1\r\n\r\n".to_vec()).await.unwrap();
        assert_eq!(reply.response.status().as_u16(), 204);
        assert_eq!(state.in_flight(), 0);
    }
}
