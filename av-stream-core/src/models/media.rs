use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The two media streams a session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Frame rate as an exact rational, e.g. 30000/1001 for 29.97 fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator: if denominator == 0 { 1 } else { denominator },
        }
    }

    pub fn from_int(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// True when this rational is exactly `target / 1`.
    pub fn is_integral(&self, target: f64) -> bool {
        self.denominator == 1 && self.numerator as f64 == target
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{:.2}", self.as_f64())
        }
    }
}

/// Pixel layouts a capture backend may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Semi-planar 4:2:0, Y plane followed by interleaved UV. The wire format.
    Nv12,
    /// Semi-planar 4:2:0 with VU order.
    Nv21,
    /// Planar 4:2:0, separate Y, U and V planes.
    I420,
    /// Packed 4:2:2, Y0 U Y1 V.
    Yuyv,
    /// 8-bit luma only.
    Gray8,
}

impl PixelFormat {
    /// Bytes needed for a tightly packed `width` x `height` image.
    pub fn buffer_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Nv12 | Self::Nv21 | Self::I420 => pixels * 3 / 2,
            Self::Yuyv => pixels * 2,
            Self::Gray8 => pixels,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nv12 => "NV12",
            Self::Nv21 => "NV21",
            Self::I420 => "I420",
            Self::Yuyv => "YUYV",
            Self::Gray8 => "GRAY8",
        };
        f.write_str(name)
    }
}

/// Pixel or sample layout of a stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormatLayout {
    Pixel { format: PixelFormat },
    Float { channels: u32, sample_rate: u32 },
}

/// One capture format a source or profile supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormatDescriptor {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub layout: FormatLayout,
}

impl StreamFormatDescriptor {
    pub fn video(width: u32, height: u32, frame_rate: FrameRate, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            frame_rate,
            layout: FormatLayout::Pixel { format },
        }
    }

    pub fn audio(channels: u32, sample_rate: u32) -> Self {
        Self {
            width: 0,
            height: 0,
            frame_rate: FrameRate::from_int(0),
            layout: FormatLayout::Float { channels, sample_rate },
        }
    }
}

impl fmt::Display for StreamFormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout {
            FormatLayout::Pixel { format } => {
                write!(f, "{}x{} @ {}fps {}", self.width, self.height, self.frame_rate, format)
            }
            FormatLayout::Float { channels, sample_rate } => {
                write!(f, "{}ch @ {}Hz f32", channels, sample_rate)
            }
        }
    }
}

/// Kind of a frame source inside a source group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Color,
    Depth,
    Infrared,
    Audio,
}

/// A single frame source (camera sensor, microphone array) in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSourceInfo {
    pub id: String,
    pub kind: SourceKind,
    pub formats: Vec<StreamFormatDescriptor>,
}

/// A named capture profile with the formats it allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoProfile {
    pub id: String,
    pub formats: Vec<StreamFormatDescriptor>,
}

/// A physical device exposing correlated audio and video sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup {
    pub id: String,
    pub display_name: String,
    pub profiles: Vec<VideoProfile>,
    pub sources: Vec<FrameSourceInfo>,
}

impl SourceGroup {
    pub fn sources_of(&self, kind: SourceKind) -> impl Iterator<Item = &FrameSourceInfo> {
        self.sources.iter().filter(move |s| s.kind == kind)
    }
}

/// Which media the device should be initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingMode {
    Audio,
    Video,
    AudioAndVideo,
}

/// Everything a backend needs to initialize the capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub group_id: String,
    /// Set when a profile was selected; `None` on the color-source path.
    pub profile_id: Option<String>,
    /// Color source the format applies to, on the color-source path.
    pub video_source_id: Option<String>,
    pub video_format: StreamFormatDescriptor,
    pub mode: StreamingMode,
}

/// Borrowed view over one arriving audio frame.
///
/// Only valid for the duration of the frame-arrived callback.
#[derive(Debug, Clone, Copy)]
pub struct AudioFrameView<'a> {
    /// Interleaved samples, `channels` per audio frame.
    pub samples: &'a [f32],
    pub channels: u32,
    pub sample_rate: u32,
    pub duration: Duration,
}

/// Borrowed view over one arriving video frame.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrameView<'a> {
    pub data: &'a [u8],
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub focal_x: f32,
    pub focal_y: f32,
}

#[derive(Debug, Clone, Copy)]
pub enum FrameView<'a> {
    Audio(AudioFrameView<'a>),
    Video(VideoFrameView<'a>),
}

impl FrameView<'_> {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Audio(_) => MediaKind::Audio,
            Self::Video(_) => MediaKind::Video,
        }
    }
}

/// Owned frame as held by a backend until a reader hands out a view.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedFrame {
    Audio {
        samples: Vec<f32>,
        channels: u32,
        sample_rate: u32,
        duration: Duration,
    },
    Video {
        data: Vec<u8>,
        format: PixelFormat,
        width: u32,
        height: u32,
        focal_x: f32,
        focal_y: f32,
    },
}

impl CapturedFrame {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Audio { .. } => MediaKind::Audio,
            Self::Video { .. } => MediaKind::Video,
        }
    }

    pub fn view(&self) -> FrameView<'_> {
        match self {
            Self::Audio {
                samples,
                channels,
                sample_rate,
                duration,
            } => FrameView::Audio(AudioFrameView {
                samples,
                channels: *channels,
                sample_rate: *sample_rate,
                duration: *duration,
            }),
            Self::Video {
                data,
                format,
                width,
                height,
                focal_x,
                focal_y,
            } => FrameView::Video(VideoFrameView {
                data,
                format: *format,
                width: *width,
                height: *height,
                focal_x: *focal_x,
                focal_y: *focal_y,
            }),
        }
    }
}
