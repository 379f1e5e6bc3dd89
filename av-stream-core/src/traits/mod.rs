pub mod byte_sink;
pub mod frame_source;
pub mod session_delegate;
pub mod stream_listener;
