//! # av-stream-core
//!
//! Platform-agnostic capture-to-socket streaming core.
//!
//! Provides format selection, fixed-layout frame encoding, connection
//! gateways and session orchestration. Platform backends implement the
//! `FrameSource` and `StreamListener` traits and plug into the generic
//! `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! av-stream-core (this crate)
//! ├── traits/       ← FrameSource, FrameReader, StreamListener, ByteSink, SessionDelegate
//! ├── models/       ← StreamError, SessionState, StreamConfiguration, media descriptors, SessionReport
//! ├── processing/   ← format selection, frame codec, NV12 normalization, LatestFrame
//! └── session/      ← ConnectionGateway, CaptureSession (generic orchestrator)
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::{FormatSelection, StreamConfiguration};
pub use models::error::StreamError;
pub use models::media::{
    AudioFrameView, CapturedFrame, DeviceRequest, FormatLayout, FrameRate, FrameSourceInfo, FrameView, MediaKind,
    PixelFormat, SourceGroup, SourceKind, StreamFormatDescriptor, StreamingMode, VideoFrameView, VideoProfile,
};
pub use models::report::{SessionReport, StreamCounters, StreamStatistics};
pub use models::state::{GatewayState, SessionState};
pub use processing::frame_codec::{AudioHeader, VideoHeader, WireMessage};
pub use processing::latest_frame::{LatestFrame, LatestFrameReader};
pub use session::capture::CaptureSession;
pub use session::gateway::{ConnectionGateway, SendOutcome, StreamEndpoint};
pub use traits::byte_sink::ByteSink;
pub use traits::frame_source::{FrameArrivedCallback, FrameReader, FrameSource};
pub use traits::session_delegate::SessionDelegate;
pub use traits::stream_listener::{ConnectionCallback, StreamListener};
