use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::StreamConfiguration;
use crate::models::error::StreamError;
use crate::models::media::{FrameView, MediaKind, PixelFormat, StreamFormatDescriptor, VideoFrameView};
use crate::models::report::{SessionReport, StreamCounters};
use crate::models::state::{GatewayState, SessionState};
use crate::processing::format_selector::select_device;
use crate::processing::frame_codec::{encode_audio, encode_video, WireMessage};
use crate::processing::pixel_convert::normalize_to_nv12;
use crate::session::gateway::{ConnectionGateway, SendOutcome, StreamEndpoint};
use crate::traits::frame_source::{FrameArrivedCallback, FrameReader, FrameSource};
use crate::traits::session_delegate::SessionDelegate;
use crate::traits::stream_listener::StreamListener;

/// Mutable session status, protected by `parking_lot::Mutex`.
struct SessionStatus {
    state: SessionState,
    source_group: Option<String>,
    video_format: Option<StreamFormatDescriptor>,
}

/// Capture-to-socket session orchestrator.
///
/// Generic over the capture device and the transport listener. Data flow:
/// ```text
/// [FrameSource] → [audio reader] → encode_audio ──→ [audio gateway] → consumer
///               → [video reader] → NV12 → encode_video → [video gateway] → consumer
/// ```
///
/// Frame handlers run on the backend's delivery threads. Each one takes
/// only the newest frame, encodes it, and hands it to the gateway; frames
/// arriving while no consumer is attached are counted and dropped.
pub struct CaptureSession<S: FrameSource, L: StreamListener> {
    id: Uuid,
    created_at: DateTime<Utc>,
    source: S,
    config: StreamConfiguration,
    audio_gateway: ConnectionGateway<L>,
    video_gateway: ConnectionGateway<L>,
    readers: Vec<Arc<dyn FrameReader>>,
    status: Mutex<SessionStatus>,
    audio_counters: Arc<StreamCounters>,
    video_counters: Arc<StreamCounters>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    device_initialized: bool,
}

impl<S: FrameSource, L: StreamListener> CaptureSession<S, L> {
    pub fn new(source: S, audio_listener: L, video_listener: L, config: StreamConfiguration) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source,
            config,
            audio_gateway: ConnectionGateway::new(MediaKind::Audio, audio_listener),
            video_gateway: ConnectionGateway::new(MediaKind::Video, video_listener),
            readers: Vec::new(),
            status: Mutex::new(SessionStatus {
                state: SessionState::Idle,
                source_group: None,
                video_format: None,
            }),
            audio_counters: Arc::new(StreamCounters::default()),
            video_counters: Arc::new(StreamCounters::default()),
            delegate: None,
            device_initialized: false,
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.audio_gateway.set_delegate(Arc::clone(&delegate));
        self.video_gateway.set_delegate(Arc::clone(&delegate));
        self.delegate = Some(delegate);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &StreamConfiguration {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.status.lock().state.clone()
    }

    pub fn gateway_state(&self, kind: MediaKind) -> GatewayState {
        self.gateway(kind).state()
    }

    /// Address a gateway actually bound, once listening.
    pub fn local_address(&self, kind: MediaKind) -> Option<&str> {
        self.gateway(kind).local_address()
    }

    /// Start streaming. Transitions: idle → initializing → streaming.
    ///
    /// Any failure before the readers start tears down what was set up,
    /// leaves the session stopped with the failure as its reason, and
    /// returns the error.
    pub fn start(&mut self) -> Result<(), StreamError> {
        {
            let state = &self.status.lock().state;
            if !state.is_idle() {
                return Err(StreamError::InvalidState(format!(
                    "session can only start from idle, not {}",
                    state.label()
                )));
            }
        }

        self.set_state(SessionState::Initializing);

        if let Err(e) = self.initialize() {
            return Err(self.fail_startup(e));
        }
        if let Err(e) = self.start_readers() {
            return Err(self.fail_startup(e));
        }

        log::info!("Session {} streaming", self.id);
        self.set_state(SessionState::Streaming);
        Ok(())
    }

    /// Stop readers, close both gateways, release the device.
    ///
    /// Idempotent and valid from any state. A session stopped by a startup
    /// failure keeps that failure as its reason.
    pub fn stop(&mut self) {
        self.teardown();

        let already_stopped = self.status.lock().state.is_stopped();
        if !already_stopped {
            log::info!("Session {} stopped", self.id);
            self.set_state(SessionState::Stopped { reason: None });
        }
    }

    pub fn report(&self) -> SessionReport {
        let status = self.status.lock();
        SessionReport {
            session_id: self.id,
            created_at: self.created_at,
            state: status.state.label().to_string(),
            failure: status.state.failure().map(|e| e.to_string()),
            source_group: status.source_group.clone(),
            video_format: status.video_format,
            audio_gateway: self.audio_gateway.state().label().to_string(),
            video_gateway: self.video_gateway.state().label().to_string(),
            audio: self.audio_counters.snapshot(),
            video: self.video_counters.snapshot(),
        }
    }

    // --- Internal helpers ---

    fn initialize(&mut self) -> Result<(), StreamError> {
        self.config.validate().map_err(StreamError::ConfigurationFailed)?;

        self.audio_gateway.bind(&self.config.audio_address)?;
        self.video_gateway.bind(&self.config.video_address)?;

        let groups = self.source.source_groups()?;
        let request = select_device(&groups, &self.config)?;
        log::info!("Selected {} on source group {}", request.video_format, request.group_id);
        {
            let mut status = self.status.lock();
            status.source_group = Some(request.group_id.clone());
            status.video_format = Some(request.video_format);
        }

        self.source.initialize(&request).map_err(|e| match e {
            StreamError::DeviceInitFailed(_) => e,
            other => StreamError::DeviceInitFailed(other.to_string()),
        })?;
        self.device_initialized = true;

        for kind in [MediaKind::Audio, MediaKind::Video] {
            let reader = self.source.open_reader(kind)?;
            self.readers.push(reader);
        }
        Ok(())
    }

    /// Start each reader independently. Fails only if none started.
    fn start_readers(&self) -> Result<(), StreamError> {
        let mut started = 0;
        let mut last_error = None;

        for reader in &self.readers {
            let kind = reader.kind();
            match reader.start(self.frame_handler(kind)) {
                Ok(()) => {
                    log::info!("{} reader started", kind);
                    started += 1;
                }
                Err(e) => {
                    log::warn!("{} reader failed to start: {}", kind, e);
                    if let Some(ref delegate) = self.delegate {
                        delegate.on_error(&e);
                    }
                    last_error = Some(e);
                }
            }
        }

        if started == 0 {
            return Err(last_error.unwrap_or_else(|| StreamError::InvalidState("no readers were opened".into())));
        }
        Ok(())
    }

    fn frame_handler(&self, kind: MediaKind) -> FrameArrivedCallback {
        let endpoint = self.gateway(kind).endpoint();
        let counters = Arc::clone(self.counters(kind));

        Arc::new(move |reader: &dyn FrameReader| {
            reader.acquire_latest(&mut |frame: FrameView<'_>| forward_frame(frame, &endpoint, &counters));
        })
    }

    fn fail_startup(&mut self, error: StreamError) -> StreamError {
        log::error!("Session {} failed to start: {}", self.id, error);
        self.teardown();
        self.set_state(SessionState::Stopped {
            reason: Some(error.clone()),
        });
        error
    }

    /// Readers first so no handler races the gateways closing.
    fn teardown(&mut self) {
        for reader in self.readers.drain(..) {
            reader.stop();
        }
        self.audio_gateway.close();
        self.video_gateway.close();
        if self.device_initialized {
            self.source.release();
            self.device_initialized = false;
        }
    }

    fn gateway(&self, kind: MediaKind) -> &ConnectionGateway<L> {
        match kind {
            MediaKind::Audio => &self.audio_gateway,
            MediaKind::Video => &self.video_gateway,
        }
    }

    fn counters(&self, kind: MediaKind) -> &Arc<StreamCounters> {
        match kind {
            MediaKind::Audio => &self.audio_counters,
            MediaKind::Video => &self.video_counters,
        }
    }

    fn set_state(&self, new_state: SessionState) {
        self.status.lock().state = new_state.clone();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

impl<S: FrameSource, L: StreamListener> Drop for CaptureSession<S, L> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Encode a frame view, normalizing video to NV12 first.
pub fn encode_frame(frame: &FrameView<'_>) -> Result<WireMessage, StreamError> {
    match frame {
        FrameView::Audio(audio) => encode_audio(audio),
        FrameView::Video(video) => {
            let pixels = normalize_to_nv12(video)?;
            encode_video(&VideoFrameView {
                data: &pixels,
                format: PixelFormat::Nv12,
                ..*video
            })
        }
    }
}

fn forward_frame(frame: FrameView<'_>, endpoint: &StreamEndpoint, counters: &StreamCounters) {
    counters.record_arrival();

    if !endpoint.is_connected() {
        log::trace!("{} frame dropped: no consumer", frame.kind());
        counters.record_dropped();
        return;
    }

    let message = match encode_frame(&frame) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("{} frame rejected: {}", frame.kind(), e);
            counters.record_rejected();
            return;
        }
    };

    match endpoint.send(message) {
        SendOutcome::Sent(bytes) => counters.record_sent(bytes),
        SendOutcome::NoConsumer | SendOutcome::Dropped | SendOutcome::Faulted => counters.record_dropped(),
    }
}
