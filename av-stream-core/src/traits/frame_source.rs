use std::sync::Arc;

use crate::models::error::StreamError;
use crate::models::media::{DeviceRequest, FrameView, MediaKind, SourceGroup};

/// Callback invoked by a reader whenever a new frame has arrived.
///
/// The reader passes itself so the handler can pull the latest frame
/// without the callback holding a reference back to the reader.
/// Fires on the backend's delivery thread; keep processing minimal.
pub type FrameArrivedCallback = Arc<dyn Fn(&dyn FrameReader) + Send + Sync + 'static>;

/// Per-media frame reader opened on an initialized device.
pub trait FrameReader: Send + Sync {
    fn kind(&self) -> MediaKind;

    /// Start delivering arrival notifications to `on_arrived`.
    fn start(&self, on_arrived: FrameArrivedCallback) -> Result<(), StreamError>;

    /// Stop delivery and detach the callback. Safe to call more than once.
    fn stop(&self);

    /// Acquire the most recent frame, discarding any older ones.
    ///
    /// Runs `visit` with a view that is only valid for the call and returns
    /// `false` when no frame is pending. Never blocks.
    fn acquire_latest(&self, visit: &mut dyn FnMut(FrameView<'_>)) -> bool;
}

/// Interface for platform-specific capture devices.
pub trait FrameSource: Send {
    /// Enumerate the physical source groups available on this host.
    fn source_groups(&self) -> Result<Vec<SourceGroup>, StreamError>;

    /// Initialize the device with the selected group, profile and format.
    fn initialize(&mut self, request: &DeviceRequest) -> Result<(), StreamError>;

    /// Open a reader for one media kind on the initialized device.
    ///
    /// Fails with `NoAudioSource`/`NoVideoSource` when the group lacks one.
    fn open_reader(&mut self, kind: MediaKind) -> Result<Arc<dyn FrameReader>, StreamError>;

    /// Release the device and any readers it still owns.
    fn release(&mut self);
}
