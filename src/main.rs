use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;

use origin_httpd::config::{detect_local_ip, Config, StateStore};
use origin_httpd::handler::Dispatcher;
use origin_httpd::server::{
    create_tcp_listener, create_udp_socket, signal, start_tcp_loop, start_udp_loop, AppState,
};
use origin_httpd::{console, logger};

/// Minimal HTTP origin server answering over TCP and UDP
#[derive(Debug, Parser)]
#[command(name = "origin-httpd", version, about)]
struct Cli {
    /// Configuration file, extension optional
    #[arg(short, long, default_value = "config")]
    config: String,

    /// Directory served as the site root
    #[arg(long)]
    root: Option<PathBuf>,

    /// File served for `/`
    #[arg(long)]
    main_file: Option<String>,

    #[arg(long)]
    tcp_port: Option<u16>,

    #[arg(long)]
    udp_port: Option<u16>,

    /// Do not start the TCP front-end
    #[arg(long)]
    no_tcp: bool,

    /// Do not start the UDP front-end
    #[arg(long)]
    no_udp: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut Config) {
        if let Some(root) = &self.root {
            cfg.site.root = root.display().to_string();
        }
        if let Some(main_file) = &self.main_file {
            cfg.site.main_file.clone_from(main_file);
        }
        if let Some(port) = self.tcp_port {
            cfg.server.tcp_port = port;
        }
        if let Some(port) = self.udp_port {
            cfg.server.udp_port = port;
        }
        if self.no_tcp {
            cfg.server.enable_tcp = false;
        }
        if self.no_udp {
            cfg.server.enable_udp = false;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut cfg = Config::load_from(&cli.config)?;
    cli.apply(&mut cfg);

    if cli.print_config {
        print!("{}", toml::to_string_pretty(&cfg)?);
        return Ok(());
    }

    if !cfg.server.enable_tcp && !cfg.server.enable_udp {
        return Err("both TCP and UDP are disabled, nothing to serve".into());
    }

    logger::init(&cfg)?;

    // 创建 Tokio 运行时，根据 workers 配置设置线程数
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("Using {workers} worker threads"));
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let detected = if cfg.state.detect_ip {
        detect_local_ip()
    } else {
        None
    };
    let store = Arc::new(StateStore::open(&cfg.state.path, detected));

    let shutdown = Arc::new(Notify::new());
    let autosave = store.spawn_autosave(
        Duration::from_secs(cfg.state.save_interval_secs.max(1)),
        Arc::clone(&shutdown),
    );

    let dispatcher = Dispatcher::from_config(&cfg);
    let state = Arc::new(AppState::new(dispatcher, Arc::clone(&store), &cfg));

    // 先绑定全部端口，任何一个失败都直接退出
    let tcp_listener = if cfg.server.enable_tcp {
        Some(create_tcp_listener(cfg.tcp_socket_addr()?)?)
    } else {
        None
    };
    let udp_socket = if cfg.server.enable_udp {
        Some(create_udp_socket(cfg.udp_socket_addr()?)?)
    } else {
        None
    };

    let tcp_addr: Option<SocketAddr> = tcp_listener
        .as_ref()
        .map(tokio::net::TcpListener::local_addr)
        .transpose()?;
    let udp_addr: Option<SocketAddr> = udp_socket
        .as_ref()
        .map(tokio::net::UdpSocket::local_addr)
        .transpose()?;

    if cfg.console.banner {
        console::print_banner(&cfg, tcp_addr.as_ref(), udp_addr.as_ref(), store.get_ip());
    }
    logger::log_server_start(tcp_addr.as_ref(), udp_addr.as_ref(), &cfg);

    let mut loops = Vec::new();
    if let Some(listener) = tcp_listener {
        loops.push(tokio::spawn(start_tcp_loop(
            listener,
            Arc::clone(&state),
            Arc::clone(&shutdown),
        )));
    }
    if let Some(socket) = udp_socket {
        loops.push(tokio::spawn(start_udp_loop(
            socket,
            Arc::clone(&state),
            Arc::clone(&shutdown),
        )));
    }

    let reason = signal::wait_for_shutdown().await?;
    logger::log_info(&format!("{reason} received, shutting down"));
    shutdown.notify_waiters();

    for handle in loops {
        if let Err(e) = handle.await {
            logger::log_error(&format!("Front-end task failed: {e}"));
        }
    }
    if let Err(e) = autosave.await {
        logger::log_error(&format!("Autosave task failed: {e}"));
    }

    // 等待正在处理的请求结束，最多等一个读超时
    let deadline = tokio::time::Instant::now() + Duration::from_secs(cfg.performance.read_timeout);
    while state.in_flight() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    if let Err(e) = store.save() {
        logger::log_error(&e);
    }
    logger::log_shutdown(store.request_count());
    Ok(())
}
