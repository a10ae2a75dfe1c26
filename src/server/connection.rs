// 连接处理模块
// TCP front-end: accept loop, request read, one task per connection

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use super::listener::configure_stream;
use super::{AppState, Transport};
use crate::logger;

/// Accept connections until `shutdown` is notified
pub async fn start_tcp_loop(listener: TcpListener, state: Arc<AppState>, shutdown: Arc<Notify>) {
    let shutdown = shutdown.notified();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state),
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            () = &mut shutdown => break,
        }
    }
}

/// Admit a connection and serve it in a spawned task
fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) {
    let Some(slot) = state.admit() else {
        drop(stream);
        return;
    };

    if let Err(e) = configure_stream(&stream) {
        logger::log_warning(&format!("Failed to set keep-alive for {peer_addr}: {e}"));
    }

    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, peer_addr, &state).await {
            logger::log_warning(&format!("Connection {peer_addr}: {e}"));
        }
        drop(slot);
    });
}

/// Read one request, answer it, close the socket
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
) -> io::Result<()> {
    let started = Instant::now();
    let limits = state.limits;

    let mut buf = Vec::with_capacity(8192);
    let read = tokio::time::timeout(
        limits.read_timeout,
        read_request(
            &mut stream,
            &mut buf,
            limits.max_request_size,
            limits.max_body_size,
        ),
    )
    .await;

    let mut oversized = false;
    let reply = match read {
        Ok(Ok(ReadOutcome::Complete)) if buf.is_empty() => return Ok(()),
        Ok(Ok(ReadOutcome::Complete)) => state.dispatch(buf).await,
        Ok(Ok(ReadOutcome::TooLarge { size })) => {
            logger::log_warning(&format!(
                "Request from {peer_addr} too large ({size} bytes), body not read"
            ));
            oversized = true;
            state.dispatch_oversized(buf, size).await
        }
        Ok(Err(e)) => return Err(e),
        // 超时：只处理已经完整到达的请求
        Err(_) if request_complete(&buf) => state.dispatch(buf).await,
        Err(_) => {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "request incomplete at read timeout",
            ))
        }
    };

    let Some(reply) = reply else {
        return stream.shutdown().await;
    };

    stream.write_all(&reply.response.to_bytes()).await?;
    stream.shutdown().await?;
    if oversized {
        discard_unread(&mut stream).await;
    }

    state.finish(peer_addr, Transport::Tcp, &reply, started);
    Ok(())
}

/// How reading a request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The head and any declared body arrived, or the peer stopped sending
    Complete,
    /// Over `max_body` or `max_request`; reading stopped early. `size` is the
    /// declared body length, or the bytes received so far.
    TooLarge { size: usize },
}

/// Read until the header block is complete and, when `Content-Length` is
/// present, until the whole body arrived.
///
/// A declared body above `max_body`, or more than `max_request` bytes in
/// total, stops the read with [`ReadOutcome::TooLarge`].
pub async fn read_request<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_request: usize,
    max_body: u64,
) -> io::Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(ReadOutcome::Complete);
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some((head_end, sep_len)) = find_head_end(buf) {
            match content_length(&buf[..head_end]) {
                Some(len) if u64::try_from(len).unwrap_or(u64::MAX) > max_body => {
                    return Ok(ReadOutcome::TooLarge { size: len });
                }
                Some(len) if buf.len() < (head_end + sep_len).saturating_add(len) => {}
                _ => return Ok(ReadOutcome::Complete),
            }
        }

        if buf.len() > max_request {
            let size = find_head_end(buf).map_or(buf.len(), |(end, sep)| buf.len() - end - sep);
            return Ok(ReadOutcome::TooLarge { size });
        }
    }
}

/// Drain what the client is still sending so closing does not reset the
/// connection before the response is read. Bounded to one second.
async fn discard_unread(stream: &mut TcpStream) {
    let mut sink = [0u8; 8192];
    let _ = tokio::time::timeout(Duration::from_secs(1), async {
        while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {}
    })
    .await;
}

/// True once the head terminator and the declared body have arrived
pub fn request_complete(buf: &[u8]) -> bool {
    let Some((head_end, sep_len)) = find_head_end(buf) else {
        return false;
    };
    let body_start = head_end + sep_len;
    content_length(&buf[..head_end]).is_none_or(|len| buf.len() >= body_start.saturating_add(len))
}

/// Position and length of the blank line ending the head
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, 4));
    }
    buf.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2))
}

fn content_length(head: &[u8]) -> Option<usize> {
    let head = std::str::from_utf8(head).ok()?;
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
