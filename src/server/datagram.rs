// Datagram handling module
// UDP front-end: one task per datagram, responses split into fixed-size
// datagrams with no sequencing or retransmission

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::Notify;

use super::listener::UDP_RECV_BUFFER;
use super::{AppState, Transport};
use crate::logger;

/// Size of each response datagram
pub const CHUNK_SIZE: usize = 8192;

/// Receive datagrams until `shutdown` is notified. Receive errors are
/// ignored and the loop keeps going.
pub async fn start_udp_loop(socket: UdpSocket, state: Arc<AppState>, shutdown: Arc<Notify>) {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; UDP_RECV_BUFFER];

    let shutdown = shutdown.notified();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let Ok((len, peer_addr)) = received else {
                    continue;
                };
                let Some(slot) = state.admit() else {
                    continue;
                };

                let datagram = buf[..len].to_vec();
                let socket = Arc::clone(&socket);
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_datagram(&socket, datagram, peer_addr, &state).await;
                    drop(slot);
                });
            }
            () = &mut shutdown => break,
        }
    }
}

async fn handle_datagram(
    socket: &UdpSocket,
    datagram: Vec<u8>,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
) {
    let started = Instant::now();
    let Some(reply) = state.dispatch(datagram).await else {
        return;
    };

    let bytes = reply.response.to_bytes();
    for chunk in bytes.chunks(CHUNK_SIZE) {
        if let Err(e) = socket.send_to(chunk, peer_addr).await {
            logger::log_warning(&format!("UDP send to {peer_addr} failed: {e}"));
            return;
        }
    }

    state.finish(peer_addr, Transport::Udp, &reply, started);
}
