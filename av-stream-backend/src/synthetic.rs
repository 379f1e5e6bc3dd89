//! Software capture device.
//!
//! Exposes one source group shaped like a depth camera with a microphone
//! array: an NV12 color source, a depth source, and an 11-channel 48 kHz
//! audio source. Producer threads generate a moving test pattern and a sine
//! tone and publish them into last-frame-wins readers.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use av_stream_core::models::error::StreamError;
use av_stream_core::models::media::{
    CapturedFrame, DeviceRequest, FormatLayout, FrameRate, FrameSourceInfo, MediaKind, PixelFormat, SourceGroup,
    SourceKind, StreamFormatDescriptor, VideoProfile,
};
use av_stream_core::processing::frame_codec::audio_sample_count;
use av_stream_core::processing::latest_frame::LatestFrameReader;
use av_stream_core::traits::frame_source::{FrameReader, FrameSource};

pub const SYNTHETIC_GROUP_ID: &str = "synthetic-0";

pub const AUDIO_CHANNELS: u32 = 11;

pub const AUDIO_SAMPLE_RATE: u32 = 48000;

const TONE_HZ: f64 = 440.0;

/// Sine frame starting at absolute sample index `start`.
///
/// Channel `c` carries the tone scaled by `1 - c / (2 * channels)`, so
/// channels stay distinguishable after remapping.
pub fn sine_frame(
    start: u64,
    channels: u32,
    sample_rate: u32,
    duration: Duration,
) -> Result<CapturedFrame, StreamError> {
    let frames = audio_sample_count(duration, sample_rate)? as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = (start + i as u64) as f64 / sample_rate as f64;
        let value = (TAU * TONE_HZ * t).sin() as f32;
        for c in 0..channels {
            samples.push(value * channel_gain(c, channels));
        }
    }
    Ok(CapturedFrame::Audio {
        samples,
        channels,
        sample_rate,
        duration,
    })
}

pub fn channel_gain(channel: u32, channels: u32) -> f32 {
    1.0 - channel as f32 / (2.0 * channels as f32)
}

/// NV12 test pattern: a diagonal luma ramp that shifts with `tick`, chroma
/// varying across the frame.
pub fn test_pattern(width: u32, height: u32, tick: u64, focal_x: f32, focal_y: f32) -> CapturedFrame {
    let (w, h) = (width as usize, height as usize);
    let mut data = Vec::with_capacity(PixelFormat::Nv12.buffer_len(width, height));

    for y in 0..h {
        data.extend((0..w).map(|x| ((x + y) as u64 + tick) as u8));
    }
    for y in 0..h / 2 {
        for x in 0..w / 2 {
            data.push((x * 255 / (w / 2).max(1)) as u8);
            data.push((y * 255 / (h / 2).max(1)) as u8);
        }
    }

    CapturedFrame::Video {
        data,
        format: PixelFormat::Nv12,
        width,
        height,
        focal_x,
        focal_y,
    }
}

/// `FrameSource` backed by generator threads.
pub struct SyntheticFrameSource {
    groups: Vec<SourceGroup>,
    audio: Arc<LatestFrameReader>,
    video: Arc<LatestFrameReader>,
    audio_period: Duration,
    focal_length: Option<(f32, f32)>,
    running: Arc<AtomicBool>,
    producers: Vec<thread::JoinHandle<()>>,
    request: Option<DeviceRequest>,
}

impl SyntheticFrameSource {
    pub fn new() -> Self {
        Self {
            groups: vec![default_group()],
            audio: Arc::new(LatestFrameReader::new(MediaKind::Audio)),
            video: Arc::new(LatestFrameReader::new(MediaKind::Video)),
            audio_period: Duration::from_millis(20),
            focal_length: None,
            running: Arc::new(AtomicBool::new(false)),
            producers: Vec::new(),
            request: None,
        }
    }

    /// Duration of each generated audio frame (default: 20 ms).
    pub fn with_audio_period(mut self, period: Duration) -> Self {
        self.audio_period = period;
        self
    }

    /// Fixed focal lengths in pixels. Defaults to 0.9 × width.
    pub fn with_focal_length(mut self, focal_x: f32, focal_y: f32) -> Self {
        self.focal_length = Some((focal_x, focal_y));
        self
    }

    /// The request the device was initialized with.
    pub fn request(&self) -> Option<&DeviceRequest> {
        self.request.as_ref()
    }

    fn start_producers(&mut self, format: StreamFormatDescriptor) -> Result<(), StreamError> {
        self.running.store(true, Ordering::SeqCst);

        let audio = Arc::clone(&self.audio);
        let period = self.audio_period;
        let samples_per_frame = u64::from(audio_sample_count(period, AUDIO_SAMPLE_RATE)?);
        let handle = spawn_producer("av-stream-synthetic-audio", period, Arc::clone(&self.running), move |tick| {
            match sine_frame(tick * samples_per_frame, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE, period) {
                Ok(frame) => audio.deliver(frame),
                Err(e) => log::warn!("Synthetic audio frame skipped: {}", e),
            }
        })?;
        self.producers.push(handle);

        let video = Arc::clone(&self.video);
        let (width, height) = (format.width, format.height);
        let (focal_x, focal_y) = self
            .focal_length
            .unwrap_or((width as f32 * 0.9, width as f32 * 0.9));
        let fps = format.frame_rate.as_f64();
        let period = if fps > 0.0 {
            Duration::from_secs_f64(1.0 / fps)
        } else {
            Duration::from_millis(66)
        };
        let handle = spawn_producer("av-stream-synthetic-video", period, Arc::clone(&self.running), move |tick| {
            video.deliver(test_pattern(width, height, tick, focal_x, focal_y));
        })?;
        self.producers.push(handle);

        Ok(())
    }
}

impl Default for SyntheticFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SyntheticFrameSource {
    fn source_groups(&self) -> Result<Vec<SourceGroup>, StreamError> {
        Ok(self.groups.clone())
    }

    fn initialize(&mut self, request: &DeviceRequest) -> Result<(), StreamError> {
        if self.request.is_some() {
            return Err(StreamError::InvalidState("device already initialized".into()));
        }
        if !self.groups.iter().any(|g| g.id == request.group_id) {
            return Err(StreamError::DeviceInitFailed(format!(
                "unknown source group {}",
                request.group_id
            )));
        }
        match request.video_format.layout {
            FormatLayout::Pixel {
                format: PixelFormat::Nv12,
            } => {}
            _ => {
                return Err(StreamError::DeviceInitFailed(format!(
                    "color source cannot produce {}",
                    request.video_format
                )))
            }
        }

        log::info!("Synthetic device producing {}", request.video_format);
        if let Err(e) = self.start_producers(request.video_format) {
            self.release();
            return Err(e);
        }
        self.request = Some(request.clone());
        Ok(())
    }

    fn open_reader(&mut self, kind: MediaKind) -> Result<Arc<dyn FrameReader>, StreamError> {
        if self.request.is_none() {
            return Err(StreamError::InvalidState(format!(
                "{} reader requested before initialization",
                kind
            )));
        }
        let reader: Arc<dyn FrameReader> = match kind {
            MediaKind::Audio => self.audio.clone(),
            MediaKind::Video => self.video.clone(),
        };
        Ok(reader)
    }

    fn release(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.producers.drain(..) {
            let _ = handle.join();
        }
        self.request = None;
    }
}

impl Drop for SyntheticFrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

fn default_group() -> SourceGroup {
    let nv12 = |w, h, fps| StreamFormatDescriptor::video(w, h, FrameRate::from_int(fps), PixelFormat::Nv12);
    let color_formats = vec![
        nv12(960, 540, 15),
        nv12(960, 540, 30),
        nv12(1280, 720, 15),
        nv12(1280, 720, 30),
        nv12(1920, 1080, 30),
    ];

    SourceGroup {
        id: SYNTHETIC_GROUP_ID.into(),
        display_name: "Synthetic Camera".into(),
        profiles: vec![
            VideoProfile {
                id: "synthetic-profile-sd".into(),
                formats: vec![nv12(960, 540, 15), nv12(960, 540, 30)],
            },
            VideoProfile {
                id: "synthetic-profile-hd".into(),
                formats: vec![nv12(1280, 720, 15), nv12(1280, 720, 30), nv12(1920, 1080, 30)],
            },
        ],
        sources: vec![
            FrameSourceInfo {
                id: "synthetic-color".into(),
                kind: SourceKind::Color,
                formats: color_formats,
            },
            FrameSourceInfo {
                id: "synthetic-depth".into(),
                kind: SourceKind::Depth,
                formats: vec![StreamFormatDescriptor::video(
                    640,
                    576,
                    FrameRate::from_int(30),
                    PixelFormat::Gray8,
                )],
            },
            FrameSourceInfo {
                id: "synthetic-mic-array".into(),
                kind: SourceKind::Audio,
                formats: vec![StreamFormatDescriptor::audio(AUDIO_CHANNELS, AUDIO_SAMPLE_RATE)],
            },
        ],
    }
}

/// Run `produce` every `period` until `running` clears.
fn spawn_producer<F>(
    name: &str,
    period: Duration,
    running: Arc<AtomicBool>,
    mut produce: F,
) -> Result<thread::JoinHandle<()>, StreamError>
where
    F: FnMut(u64) + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut tick = 0u64;
            let mut next = Instant::now();
            while running.load(Ordering::SeqCst) {
                produce(tick);
                tick += 1;
                next += period;
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    thread::sleep(wait);
                }
            }
        })
        .map_err(|e| StreamError::DeviceInitFailed(format!("failed to spawn {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use av_stream_core::models::config::StreamConfiguration;
    use av_stream_core::models::media::FrameView;
    use av_stream_core::processing::format_selector::select_device;
    use av_stream_core::traits::frame_source::FrameArrivedCallback;

    use super::*;

    #[test]
    fn sine_frame_has_native_layout() {
        let CapturedFrame::Audio { samples, channels, .. } =
            sine_frame(0, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE, Duration::from_millis(20)).unwrap()
        else {
            panic!("expected audio");
        };
        assert_eq!(channels, 11);
        assert_eq!(samples.len(), 960 * 11);

        // Frame 12 sits well away from a zero crossing.
        let frame = &samples[12 * 11..13 * 11];
        for c in 1..11 {
            assert_relative_eq!(frame[c], frame[0] * channel_gain(c as u32, 11), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pattern_is_nv12_sized() {
        let CapturedFrame::Video { data, format, .. } = test_pattern(960, 540, 3, 1.0, 1.0) else {
            panic!("expected video");
        };
        assert_eq!(format, PixelFormat::Nv12);
        assert_eq!(data.len(), 960 * 540 * 3 / 2);
        assert_eq!(data[0], 3);
    }

    #[test]
    fn default_configuration_selects_synthetic_color_source() {
        let source = SyntheticFrameSource::new();
        let groups = source.source_groups().unwrap();
        let request = select_device(&groups, &StreamConfiguration::default()).unwrap();
        assert_eq!(request.group_id, SYNTHETIC_GROUP_ID);
        assert_eq!(request.video_source_id.as_deref(), Some("synthetic-color"));
    }

    #[test]
    fn readers_require_initialization() {
        let mut source = SyntheticFrameSource::new();
        assert!(matches!(
            source.open_reader(MediaKind::Audio),
            Err(StreamError::InvalidState(_))
        ));
    }

    #[test]
    fn initialized_device_delivers_frames() {
        let mut source = SyntheticFrameSource::new().with_focal_length(500.0, 501.0);
        let groups = source.source_groups().unwrap();
        let request = select_device(&groups, &StreamConfiguration::default()).unwrap();
        source.initialize(&request).unwrap();

        let (sender, receiver) = crossbeam_channel::unbounded();
        let reader = source.open_reader(MediaKind::Video).unwrap();
        let callback: FrameArrivedCallback = Arc::new(move |reader: &dyn FrameReader| {
            reader.acquire_latest(&mut |frame: FrameView<'_>| {
                if let FrameView::Video(v) = frame {
                    let _ = sender.send((v.width, v.height, v.focal_x, v.data.len()));
                }
            });
        });
        reader.start(callback).unwrap();

        let (width, height, focal_x, len) = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!((width, height), (960, 540));
        assert_relative_eq!(focal_x, 500.0);
        assert_eq!(len, 960 * 540 * 3 / 2);

        reader.stop();
        source.release();
        assert!(source.request().is_none());
    }

    #[test]
    fn non_nv12_request_is_refused() {
        let mut source = SyntheticFrameSource::new();
        let groups = source.source_groups().unwrap();
        let mut request = select_device(&groups, &StreamConfiguration::default()).unwrap();
        request.video_format = StreamFormatDescriptor::video(640, 576, FrameRate::from_int(30), PixelFormat::Gray8);
        assert!(matches!(
            source.initialize(&request),
            Err(StreamError::DeviceInitFailed(_))
        ));
    }
}
