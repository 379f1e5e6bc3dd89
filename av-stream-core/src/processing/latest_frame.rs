use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::models::error::StreamError;
use crate::models::media::{CapturedFrame, FrameView, MediaKind};
use crate::traits::frame_source::{FrameArrivedCallback, FrameReader};

/// Single-slot mailbox with last-frame-wins semantics.
///
/// A producer publishes frames as they arrive; a consumer takes whatever is
/// newest. Publishing over an unconsumed frame discards the older one, so
/// memory stays bounded no matter how far the consumer falls behind.
#[derive(Debug)]
pub struct LatestFrame<T> {
    slot: Mutex<Option<T>>,
    discarded: AtomicU64,
}

impl<T> LatestFrame<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            discarded: AtomicU64::new(0),
        }
    }

    /// Store `frame`, replacing any frame not yet taken.
    ///
    /// Returns `true` if an older frame was discarded.
    pub fn publish(&self, frame: T) -> bool {
        let replaced = self.slot.lock().replace(frame).is_some();
        if replaced {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
        replaced
    }

    /// Take the newest frame, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Number of frames overwritten before anyone took them.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Drop any pending frame.
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

impl<T> Default for LatestFrame<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// `FrameReader` backed by a `LatestFrame` slot.
///
/// Backends call `deliver` from their capture thread; the registered
/// handler then pulls the newest frame through `acquire_latest`.
pub struct LatestFrameReader {
    kind: MediaKind,
    slot: LatestFrame<CapturedFrame>,
    on_arrived: Mutex<Option<FrameArrivedCallback>>,
    running: AtomicBool,
}

impl LatestFrameReader {
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            slot: LatestFrame::new(),
            on_arrived: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Publish a captured frame and notify the handler. Ignored while stopped.
    pub fn deliver(&self, frame: CapturedFrame) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if frame.kind() != self.kind {
            log::warn!("{} reader ignoring {} frame", self.kind, frame.kind());
            return;
        }
        self.slot.publish(frame);

        // Clone out so the handler runs without the lock held.
        let callback = self.on_arrived.lock().clone();
        if let Some(callback) = callback {
            callback(self);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Frames overwritten before the handler got to them.
    pub fn discarded(&self) -> u64 {
        self.slot.discarded()
    }
}

impl FrameReader for LatestFrameReader {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn start(&self, on_arrived: FrameArrivedCallback) -> Result<(), StreamError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(StreamError::ReaderStartFailed {
                kind: self.kind.to_string(),
                reason: "already running".into(),
            });
        }
        *self.on_arrived.lock() = Some(on_arrived);
        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.on_arrived.lock().take();
        self.slot.clear();
    }

    fn acquire_latest(&self, visit: &mut dyn FnMut(FrameView<'_>)) -> bool {
        match self.slot.take() {
            Some(frame) => {
                visit(frame.view());
                true
            }
            None => false,
        }
    }
}
