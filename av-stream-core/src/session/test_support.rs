//! Test doubles for the capture and transport boundaries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::StreamError;
use crate::models::media::{
    CapturedFrame, DeviceRequest, FrameRate, FrameSourceInfo, FrameView, MediaKind, PixelFormat, SourceGroup,
    SourceKind, StreamFormatDescriptor, VideoProfile,
};
use crate::models::state::{GatewayState, SessionState};
use crate::processing::frame_codec::WireMessage;
use crate::processing::latest_frame::LatestFrameReader;
use crate::traits::byte_sink::ByteSink;
use crate::traits::frame_source::{FrameArrivedCallback, FrameReader, FrameSource};
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::stream_listener::{ConnectionCallback, StreamListener};

pub fn message(kind: MediaKind, bytes: &[u8]) -> WireMessage {
    WireMessage::new(kind, bytes.to_vec())
}

#[derive(Default)]
struct MemoryState {
    bytes: Vec<u8>,
    flushes: usize,
    closed: bool,
}

/// Sink that appends everything to a shared buffer.
#[derive(Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    write_error: Option<StreamError>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            write_error: None,
        }
    }

    /// Every write fails as if the peer went away.
    pub fn failing() -> Self {
        Self {
            write_error: Some(StreamError::SinkClosed),
            ..Self::new()
        }
    }

    /// Every write is refused because the queue is full.
    pub fn backlogged() -> Self {
        Self {
            write_error: Some(StreamError::QueueFull),
            ..Self::new()
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.state.lock().bytes.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flushes
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl ByteSink for MemorySink {
    fn write(&mut self, message: WireMessage) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(StreamError::SinkClosed);
        }
        if let Some(error) = &self.write_error {
            return Err(error.clone());
        }
        state.bytes.extend_from_slice(message.as_bytes());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.state.lock().flushes += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().closed = true;
    }

    fn peer(&self) -> String {
        "memory".into()
    }
}

struct ListenerState {
    callback: Mutex<Option<ConnectionCallback>>,
    on_listen: Mutex<Option<Box<dyn ByteSink>>>,
    stopped: AtomicBool,
    fail_bind: bool,
}

/// Listener whose "connections" are injected by the test.
#[derive(Clone)]
pub struct MockListener {
    state: Arc<ListenerState>,
}

impl MockListener {
    pub fn new() -> Self {
        Self::with_failure(false)
    }

    pub fn failing() -> Self {
        Self::with_failure(true)
    }

    fn with_failure(fail_bind: bool) -> Self {
        Self {
            state: Arc::new(ListenerState {
                callback: Mutex::new(None),
                on_listen: Mutex::new(None),
                stopped: AtomicBool::new(false),
                fail_bind,
            }),
        }
    }

    /// Deliver `sink` from inside the next `listen` call, before it returns.
    pub fn connecting_on_listen(self, sink: Box<dyn ByteSink>) -> Self {
        *self.state.on_listen.lock() = Some(sink);
        self
    }

    /// Simulate an inbound connection.
    pub fn connect(&self, mut sink: Box<dyn ByteSink>) {
        let callback = self.state.callback.lock().clone();
        match callback {
            Some(callback) => callback(sink),
            None => sink.close(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }
}

impl StreamListener for MockListener {
    fn listen(&mut self, address: &str, on_connection: ConnectionCallback) -> Result<String, StreamError> {
        let early = self.state.on_listen.lock().take();
        if let Some(sink) = early {
            on_connection(sink);
        }
        if self.state.fail_bind {
            return Err(StreamError::Io("address in use".into()));
        }
        *self.state.callback.lock() = Some(on_connection);
        Ok(format!("mock:{}", address))
    }

    fn stop(&mut self) {
        self.state.stopped.store(true, Ordering::SeqCst);
    }
}

/// Delegate that records every notification.
#[derive(Default)]
pub struct RecordingDelegate {
    states: Mutex<Vec<SessionState>>,
    gateways: Mutex<Vec<(MediaKind, GatewayState)>>,
    errors: Mutex<Vec<StreamError>>,
}

impl RecordingDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().clone()
    }

    pub fn gateway_events(&self) -> Vec<(MediaKind, GatewayState)> {
        self.gateways.lock().clone()
    }

    pub fn errors(&self) -> Vec<StreamError> {
        self.errors.lock().clone()
    }
}

impl SessionDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: &SessionState) {
        self.states.lock().push(state.clone());
    }

    fn on_gateway_changed(&self, kind: MediaKind, state: GatewayState) {
        self.gateways.lock().push((kind, state));
    }

    fn on_error(&self, error: &StreamError) {
        self.errors.lock().push(error.clone());
    }
}

/// Reader whose start always fails.
struct FailingReader {
    kind: MediaKind,
}

impl FrameReader for FailingReader {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn start(&self, _on_arrived: FrameArrivedCallback) -> Result<(), StreamError> {
        Err(StreamError::ReaderStartFailed {
            kind: self.kind.to_string(),
            reason: "device busy".into(),
        })
    }

    fn stop(&self) {}

    fn acquire_latest(&self, _visit: &mut dyn FnMut(FrameView<'_>)) -> bool {
        false
    }
}

/// Device double with one group and injectable failures.
pub struct MockSource {
    pub groups: Vec<SourceGroup>,
    pub audio: Arc<LatestFrameReader>,
    pub video: Arc<LatestFrameReader>,
    pub has_audio: bool,
    pub has_video: bool,
    pub init_error: Option<StreamError>,
    pub failing_starts: HashSet<MediaKind>,
    pub released: Arc<AtomicUsize>,
    pub request: Arc<Mutex<Option<DeviceRequest>>>,
}

impl MockSource {
    /// One group offering 960x540 and 1280x720 at 15 fps, plus 11-channel audio.
    pub fn standard() -> Self {
        let formats = vec![
            StreamFormatDescriptor::video(960, 540, FrameRate::from_int(15), PixelFormat::Nv12),
            StreamFormatDescriptor::video(1280, 720, FrameRate::from_int(15), PixelFormat::Nv12),
        ];
        let group = SourceGroup {
            id: "mock-group".into(),
            display_name: "Mock Camera".into(),
            profiles: vec![VideoProfile {
                id: "mock-profile".into(),
                formats: formats.clone(),
            }],
            sources: vec![
                FrameSourceInfo {
                    id: "mock-color".into(),
                    kind: SourceKind::Color,
                    formats,
                },
                FrameSourceInfo {
                    id: "mock-mic".into(),
                    kind: SourceKind::Audio,
                    formats: vec![StreamFormatDescriptor::audio(11, 48000)],
                },
            ],
        };

        Self {
            groups: vec![group],
            audio: Arc::new(LatestFrameReader::new(MediaKind::Audio)),
            video: Arc::new(LatestFrameReader::new(MediaKind::Video)),
            has_audio: true,
            has_video: true,
            init_error: None,
            failing_starts: HashSet::new(),
            released: Arc::new(AtomicUsize::new(0)),
            request: Arc::new(Mutex::new(None)),
        }
    }
}

impl FrameSource for MockSource {
    fn source_groups(&self) -> Result<Vec<SourceGroup>, StreamError> {
        Ok(self.groups.clone())
    }

    fn initialize(&mut self, request: &DeviceRequest) -> Result<(), StreamError> {
        if let Some(err) = self.init_error.clone() {
            return Err(err);
        }
        *self.request.lock() = Some(request.clone());
        Ok(())
    }

    fn open_reader(&mut self, kind: MediaKind) -> Result<Arc<dyn FrameReader>, StreamError> {
        if self.failing_starts.contains(&kind) {
            return Ok(Arc::new(FailingReader { kind }));
        }
        match kind {
            MediaKind::Audio if self.has_audio => Ok(self.audio.clone()),
            MediaKind::Video if self.has_video => Ok(self.video.clone()),
            MediaKind::Audio => Err(StreamError::NoAudioSource),
            MediaKind::Video => Err(StreamError::NoVideoSource),
        }
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// 11-channel frame whose samples encode `frame * 100 + channel`.
pub fn native_audio_frame(sample_rate: u32, duration: Duration) -> CapturedFrame {
    let frames = (duration.as_nanos() * sample_rate as u128 / 1_000_000_000) as usize;
    let samples = (0..frames)
        .flat_map(|f| (0..11).map(move |c| (f * 100 + c) as f32))
        .collect();
    CapturedFrame::Audio {
        samples,
        channels: 11,
        sample_rate,
        duration,
    }
}

/// NV12 frame with a deterministic byte ramp.
pub fn nv12_frame(width: u32, height: u32) -> CapturedFrame {
    let data = (0..PixelFormat::Nv12.buffer_len(width, height))
        .map(|i| (i % 251) as u8)
        .collect();
    CapturedFrame::Video {
        data,
        format: PixelFormat::Nv12,
        width,
        height,
        focal_x: 1100.5,
        focal_y: 1101.25,
    }
}
