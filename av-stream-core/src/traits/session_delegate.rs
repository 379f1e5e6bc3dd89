use crate::models::error::StreamError;
use crate::models::media::MediaKind;
use crate::models::state::{GatewayState, SessionState};

/// Event delegate for streaming session notifications.
///
/// Called from whichever thread caused the event: the caller of
/// `start`/`stop`, a listener's accept thread, or a reader's delivery thread.
pub trait SessionDelegate: Send + Sync {
    fn on_state_changed(&self, state: &SessionState);

    fn on_gateway_changed(&self, kind: MediaKind, state: GatewayState);

    /// Non-fatal problems: reader-start failures, sink faults.
    fn on_error(&self, error: &StreamError);
}
