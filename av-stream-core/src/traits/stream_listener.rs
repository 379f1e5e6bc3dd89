use std::sync::Arc;

use crate::models::error::StreamError;
use crate::traits::byte_sink::ByteSink;

/// Callback invoked for every accepted inbound connection.
pub type ConnectionCallback = Arc<dyn Fn(Box<dyn ByteSink>) + Send + Sync + 'static>;

/// Transport-specific listener bound to a named service address.
pub trait StreamListener: Send {
    /// Bind `address` and deliver accepted connections to `on_connection`.
    ///
    /// Returns the resolved local address.
    fn listen(&mut self, address: &str, on_connection: ConnectionCallback) -> Result<String, StreamError>;

    /// Stop accepting connections. Safe to call more than once.
    fn stop(&mut self);
}
