use thiserror::Error;

/// Errors that can occur while setting up or running a streaming session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("failed to bind {address}: {reason}")]
    BindFailed { address: String, reason: String },

    #[error("no source group available")]
    NoSourceGroup,

    #[error("no format matches {0}")]
    NoMatchingFormat(String),

    #[error("no audio source found")]
    NoAudioSource,

    #[error("no video source found")]
    NoVideoSource,

    #[error("device initialization failed: {0}")]
    DeviceInitFailed(String),

    #[error("{kind} reader failed to start: {reason}")]
    ReaderStartFailed { kind: String, reason: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("sink closed")]
    SinkClosed,

    #[error("sink queue full")]
    QueueFull,

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
