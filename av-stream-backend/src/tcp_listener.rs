//! TCP listener for the connection gateways.
//!
//! Binds a named service address and accepts connections on a dedicated
//! thread. Each accepted connection is wrapped in a `TcpByteSink` and
//! handed to the gateway's connection callback.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use av_stream_core::models::error::StreamError;
use av_stream_core::traits::stream_listener::{ConnectionCallback, StreamListener};

use crate::tcp_sink::{TcpByteSink, DEFAULT_QUEUE_DEPTH};

/// How often the accept thread checks for shutdown.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Resolve a service address.
///
/// A bare port (`"50001"`) binds every IPv4 interface; anything else is
/// resolved as `host:port` and the first address wins.
pub fn resolve_service_address(address: &str) -> Result<SocketAddr, StreamError> {
    let address = address.trim();
    if let Ok(port) = address.parse::<u16>() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }

    let bind_failed = |reason: String| StreamError::BindFailed {
        address: address.to_string(),
        reason,
    };
    address
        .to_socket_addrs()
        .map_err(|e| bind_failed(e.to_string()))?
        .next()
        .ok_or_else(|| bind_failed("address resolved to nothing".into()))
}

/// `StreamListener` over `std::net::TcpListener`.
pub struct TcpStreamListener {
    queue_depth: usize,
    running: Arc<AtomicBool>,
    accept_handle: Option<thread::JoinHandle<()>>,
}

impl TcpStreamListener {
    pub fn new() -> Self {
        Self::with_queue_depth(DEFAULT_QUEUE_DEPTH)
    }

    /// Set how many messages each connection may buffer.
    pub fn with_queue_depth(queue_depth: usize) -> Self {
        Self {
            queue_depth,
            running: Arc::new(AtomicBool::new(false)),
            accept_handle: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for TcpStreamListener {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamListener for TcpStreamListener {
    fn listen(&mut self, address: &str, on_connection: ConnectionCallback) -> Result<String, StreamError> {
        if self.is_listening() {
            return Err(StreamError::InvalidState("listener already running".into()));
        }

        let bind_failed = |reason: String| StreamError::BindFailed {
            address: address.to_string(),
            reason,
        };
        let socket_address = resolve_service_address(address)?;
        let listener = TcpListener::bind(socket_address).map_err(|e| bind_failed(e.to_string()))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| bind_failed(e.to_string()))?;
        let local = listener
            .local_addr()
            .map_err(|e| bind_failed(e.to_string()))?
            .to_string();

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let queue_depth = self.queue_depth;

        let handle = thread::Builder::new()
            .name(format!("av-stream-accept-{}", local))
            .spawn(move || accept_loop(listener, running, on_connection, queue_depth))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                bind_failed(format!("failed to spawn accept thread: {}", e))
            })?;

        self.accept_handle = Some(handle);
        Ok(local)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.accept_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TcpStreamListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(listener: TcpListener, running: Arc<AtomicBool>, on_connection: ConnectionCallback, queue_depth: usize) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                // Accepted sockets inherit non-blocking mode on some platforms.
                if let Err(e) = stream.set_nonblocking(false) {
                    log::warn!("Dropping connection from {}: {}", peer, e);
                    continue;
                }
                match TcpByteSink::spawn(stream, queue_depth) {
                    Ok(sink) => on_connection(Box::new(sink)),
                    Err(e) => log::warn!("Dropping connection from {}: {}", peer, e),
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) => {
                log::warn!("Accept failed: {}", e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}
