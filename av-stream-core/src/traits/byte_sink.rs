use crate::models::error::StreamError;
use crate::processing::frame_codec::WireMessage;

/// Writable end of an accepted downstream connection.
pub trait ByteSink: Send {
    /// Queue `message` for delivery.
    ///
    /// Fire-and-forget: must not wait for the bytes to reach the peer.
    /// Messages are delivered in call order. `QueueFull` means this message
    /// was dropped but the connection is still usable; any other `Err`
    /// means the sink should be discarded.
    fn write(&mut self, message: WireMessage) -> Result<(), StreamError>;

    /// Best-effort push of queued bytes to the transport.
    fn flush(&mut self) -> Result<(), StreamError>;

    /// Flush and release the connection. Safe to call more than once.
    fn close(&mut self);

    /// Human-readable peer identity for logs.
    fn peer(&self) -> String {
        "unknown peer".into()
    }
}
