use super::error::StreamError;

/// Capture session state machine.
///
/// ```text
/// idle → initializing → streaming → stopped
///            │                         ▲
///            └──── startup failure ────┘
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Initializing,
    Streaming,
    /// `reason` is `None` for a regular teardown.
    Stopped { reason: Option<StreamError> },
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    /// The startup or runtime failure that stopped the session, if any.
    pub fn failure(&self) -> Option<&StreamError> {
        match self {
            Self::Stopped { reason } => reason.as_ref(),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Streaming => "streaming",
            Self::Stopped { reason: None } => "stopped",
            Self::Stopped { reason: Some(_) } => "failed",
        }
    }
}

/// Per-stream endpoint state.
///
/// ```text
/// unbound → listening ⇄ connected
///               ↓           ↓
///             closed ←──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Unbound,
    Listening,
    Connected,
    Closed,
}

impl GatewayState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Listening => "listening",
            Self::Connected => "connected",
            Self::Closed => "closed",
        }
    }
}
