use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::StreamError;
use crate::models::media::MediaKind;
use crate::models::state::GatewayState;
use crate::processing::frame_codec::WireMessage;
use crate::traits::byte_sink::ByteSink;
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::stream_listener::{ConnectionCallback, StreamListener};

/// Result of handing a message to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Queued on the attached sink; carries the message length.
    Sent(usize),
    /// No consumer attached. The message was dropped.
    NoConsumer,
    /// The consumer is falling behind. The message was dropped and the sink
    /// stays attached.
    Dropped,
    /// The sink failed and was detached. The message was dropped.
    Faulted,
}

struct EndpointInner {
    state: GatewayState,
    sink: Option<Box<dyn ByteSink>>,
}

/// Connection state shared between a listener's accept path and the
/// frame-arrived path.
///
/// State and sink live behind one lock so a send never observes a sink the
/// state machine has already released.
pub struct StreamEndpoint {
    kind: MediaKind,
    inner: Mutex<EndpointInner>,
    delegate: Mutex<Option<Arc<dyn SessionDelegate>>>,
}

impl StreamEndpoint {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            inner: Mutex::new(EndpointInner {
                state: GatewayState::Unbound,
                sink: None,
            }),
            delegate: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> GatewayState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().state.is_connected()
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        *self.delegate.lock() = Some(delegate);
    }

    /// Attach a newly accepted connection.
    ///
    /// A connection that arrives while another is attached replaces it; the
    /// displaced sink is flushed and closed. Connections arriving before
    /// the endpoint listens or after it closed are closed immediately.
    pub fn attach(&self, mut sink: Box<dyn ByteSink>) {
        let peer = sink.peer();
        let displaced = {
            let mut inner = self.inner.lock();
            let state = inner.state;
            match state {
                GatewayState::Listening | GatewayState::Connected => {
                    inner.state = GatewayState::Connected;
                    inner.sink.replace(sink)
                }
                GatewayState::Unbound | GatewayState::Closed => {
                    drop(inner);
                    log::info!("Rejecting {} connection from {}: endpoint not listening", self.kind, peer);
                    sink.close();
                    return;
                }
            }
        };

        if let Some(mut old) = displaced {
            log::info!("{} consumer {} replaced by {}", self.kind, old.peer(), peer);
            let _ = old.flush();
            old.close();
        } else {
            log::info!("{} consumer connected: {}", self.kind, peer);
        }
        self.notify(GatewayState::Connected);
    }

    /// Hand `message` to the attached sink, if any.
    ///
    /// Never blocks on delivery and never returns an error: a failed write
    /// detaches the sink and reverts the endpoint to listening.
    pub fn send(&self, message: WireMessage) -> SendOutcome {
        let len = message.len();
        let failed = {
            let mut inner = self.inner.lock();
            let Some(sink) = inner.sink.as_mut() else {
                return SendOutcome::NoConsumer;
            };
            match sink.write(message) {
                Ok(()) => return SendOutcome::Sent(len),
                Err(StreamError::QueueFull) => {
                    log::trace!("{} consumer {} behind, message dropped", self.kind, sink.peer());
                    return SendOutcome::Dropped;
                }
                Err(e) => {
                    inner.state = GatewayState::Listening;
                    inner.sink.take().map(|sink| (sink, e))
                }
            }
        };

        if let Some((mut sink, error)) = failed {
            log::warn!("{} consumer {} faulted: {}", self.kind, sink.peer(), error);
            sink.close();
            if let Some(delegate) = self.delegate.lock().clone() {
                delegate.on_error(&error);
            }
            self.notify(GatewayState::Listening);
        }
        SendOutcome::Faulted
    }

    fn mark_listening(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state != GatewayState::Unbound {
                return;
            }
            inner.state = GatewayState::Listening;
        }
        self.notify(GatewayState::Listening);
    }

    /// Undo `mark_listening` after the listener failed to bind, releasing
    /// anything that connected in between.
    fn revert_to_unbound(&self) {
        let sink = {
            let mut inner = self.inner.lock();
            if inner.state == GatewayState::Closed {
                return;
            }
            inner.state = GatewayState::Unbound;
            inner.sink.take()
        };
        if let Some(mut sink) = sink {
            sink.close();
        }
        self.notify(GatewayState::Unbound);
    }

    /// Flush and release the sink. Idempotent.
    fn close(&self) {
        let (was, sink) = {
            let mut inner = self.inner.lock();
            let was = inner.state;
            inner.state = GatewayState::Closed;
            (was, inner.sink.take())
        };

        if let Some(mut sink) = sink {
            if let Err(e) = sink.flush() {
                log::debug!("{} flush on close failed: {}", self.kind, e);
            }
            sink.close();
        }
        if was != GatewayState::Closed {
            self.notify(GatewayState::Closed);
        }
    }

    fn notify(&self, state: GatewayState) {
        if let Some(delegate) = self.delegate.lock().clone() {
            delegate.on_gateway_changed(self.kind, state);
        }
    }
}

/// Listens on one named service address and tracks the consumer for one
/// media stream.
pub struct ConnectionGateway<L: StreamListener> {
    listener: L,
    endpoint: Arc<StreamEndpoint>,
    local_address: Option<String>,
}

impl<L: StreamListener> ConnectionGateway<L> {
    pub fn new(kind: MediaKind, listener: L) -> Self {
        Self {
            listener,
            endpoint: Arc::new(StreamEndpoint::new(kind)),
            local_address: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.endpoint.kind()
    }

    pub fn state(&self) -> GatewayState {
        self.endpoint.state()
    }

    /// Shared handle for the frame-arrived path.
    pub fn endpoint(&self) -> Arc<StreamEndpoint> {
        Arc::clone(&self.endpoint)
    }

    /// Address the listener actually bound, once listening.
    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    pub fn set_delegate(&self, delegate: Arc<dyn SessionDelegate>) {
        self.endpoint.set_delegate(delegate);
    }

    /// Bind `address`. Transitions: unbound → listening.
    pub fn bind(&mut self, address: &str) -> Result<String, StreamError> {
        let state = self.endpoint.state();
        if state != GatewayState::Unbound {
            return Err(StreamError::InvalidState(format!(
                "{} gateway cannot bind while {}",
                self.kind(),
                state.label()
            )));
        }

        let endpoint = Arc::clone(&self.endpoint);
        let on_connection: ConnectionCallback = Arc::new(move |sink: Box<dyn ByteSink>| endpoint.attach(sink));

        // The listener may accept before `listen` returns.
        self.endpoint.mark_listening();
        let local = match self.listener.listen(address, on_connection) {
            Ok(local) => local,
            Err(e) => {
                self.endpoint.revert_to_unbound();
                return Err(match e {
                    StreamError::BindFailed { .. } => e,
                    other => StreamError::BindFailed {
                        address: address.to_string(),
                        reason: other.to_string(),
                    },
                });
            }
        };

        log::info!("{} gateway listening on {}", self.kind(), local);
        self.local_address = Some(local.clone());
        Ok(local)
    }

    /// Stop listening, flush and release the consumer. Idempotent.
    pub fn close(&mut self) {
        self.listener.stop();
        self.endpoint.close();
    }
}
