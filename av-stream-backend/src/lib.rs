//! # av-stream-backend
//!
//! TCP transport and a software capture device for av-stream.
//!
//! Provides:
//! - `TcpStreamListener`: binds a service address and accepts consumers on a dedicated thread
//! - `TcpByteSink`: per-connection writer thread fed by a bounded queue
//! - `SyntheticFrameSource`: test-pattern video and sine-tone audio on timer threads
//!
//! ## Usage
//! ```no_run
//! use av_stream_backend::{SyntheticFrameSource, TcpStreamListener};
//! use av_stream_core::{CaptureSession, StreamConfiguration};
//!
//! let mut session = CaptureSession::new(
//!     SyntheticFrameSource::new(),
//!     TcpStreamListener::new(),
//!     TcpStreamListener::new(),
//!     StreamConfiguration::default(),
//! );
//! session.start()?;
//! # Ok::<(), av_stream_core::StreamError>(())
//! ```

pub mod synthetic;
pub mod tcp_listener;
pub mod tcp_sink;

pub use synthetic::SyntheticFrameSource;
pub use tcp_listener::{resolve_service_address, TcpStreamListener};
pub use tcp_sink::TcpByteSink;
