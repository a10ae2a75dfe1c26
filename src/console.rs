//! Console output: startup banner and terminal title
//!
//! Both are cosmetic and only written when stdout is a terminal.

use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;

use crate::config::Config;

const BANNER: &str = r"
   ___       _       _         _   _ _____ _____ ____
  / _ \ _ __(_) __ _(_)_ __   | | | |_   _|_   _|  _ \
 | | | | '__| |/ _` | | '_ \  | |_| | | |   | | | |_) |
 | |_| | |  | | (_| | | | | | |  _  | | |   | | |  __/
  \___/|_|  |_|\__, |_|_| |_| |_| |_| |_|   |_| |_|
               |___/
";

/// Banner plus listening endpoints, root and public address
pub fn print_banner(
    config: &Config,
    tcp: Option<&SocketAddr>,
    udp: Option<&SocketAddr>,
    ip: &str,
) {
    let stdout = io::stdout();
    if !stdout.is_terminal() {
        return;
    }
    let mut out = stdout.lock();
    let _ = write!(out, "{}", banner_text(config, tcp, udp, ip));
    let _ = out.flush();
}

fn banner_text(
    config: &Config,
    tcp: Option<&SocketAddr>,
    udp: Option<&SocketAddr>,
    ip: &str,
) -> String {
    let mut text = String::from(BANNER);
    text.push('\n');
    if let Some(addr) = tcp {
        text.push_str(&format!("  TCP   {addr}\n"));
    }
    if let Some(addr) = udp {
        text.push_str(&format!("  UDP   {addr}\n"));
    }
    text.push_str(&format!("  Root  {}\n", config.site.root));
    text.push_str(&format!("  IP    {ip}\n\n"));
    text
}

/// OSC 0 sequence setting the window title
pub fn title_sequence(ip: &str, count: u64) -> String {
    format!("\x1b]0;[{ip}] HTTP Server - Connection: {count}\x07")
}

/// Show the request count in the terminal title
pub fn set_title(ip: &str, count: u64) {
    let stdout = io::stdout();
    if !stdout.is_terminal() {
        return;
    }
    let mut out = stdout.lock();
    let _ = out.write_all(title_sequence(ip, count).as_bytes());
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_sequence() {
        assert_eq!(
            title_sequence("10.0.0.1", 42),
            "\x1b]0;[10.0.0.1] HTTP Server - Connection: 42\x07"
        );
    }

    #[test]
    fn test_banner_lists_endpoints() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_from(dir.path().join("absent").to_str().unwrap()).unwrap();
        let tcp: SocketAddr = "0.0.0.0:8080".parse().unwrap();

        let text = banner_text(&config, Some(&tcp), None, "192.168.1.5");
        assert!(text.contains("TCP   0.0.0.0:8080"));
        assert!(!text.contains("UDP"));
        assert!(text.contains("IP    192.168.1.5"));
    }
}
