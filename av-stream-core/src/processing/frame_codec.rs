//! Fixed-layout wire encoding for captured frames.
//!
//! Audio message:
//! ```text
//! [0-3]    channel count (always 5)
//! [4-7]    sample count per channel
//! [8-11]   sample rate
//! [12-..]  5 * sample_count f32 samples, interleaved per audio frame
//! ```
//!
//! Video message:
//! ```text
//! [0-3]    focal length x (f32)
//! [4-7]    focal length y (f32)
//! [8-11]   width
//! [12-15]  height
//! [16-..]  NV12 buffer: width*height luma bytes, width*height/2 chroma bytes
//! ```
//!
//! All fields are little-endian with no padding and no length prefix.

use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::models::error::StreamError;
use crate::models::media::{AudioFrameView, MediaKind, PixelFormat, VideoFrameView};

/// Channels kept from every native audio frame.
pub const AUDIO_WIRE_CHANNELS: u32 = 5;

pub const AUDIO_HEADER_SIZE: usize = 12;

pub const VIDEO_HEADER_SIZE: usize = 16;

/// An encoded frame ready for a sink. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    kind: MediaKind,
    bytes: Bytes,
}

impl WireMessage {
    /// Wrap already-encoded bytes, e.g. when relaying or testing sinks.
    pub fn new(kind: MediaKind, bytes: impl Into<Bytes>) -> Self {
        Self {
            kind,
            bytes: bytes.into(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for WireMessage {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// `floor(duration_ms * sample_rate / 1000)`, computed on integer nanoseconds.
///
/// Fails when the count does not fit the wire header's `u32`.
pub fn audio_sample_count(duration: Duration, sample_rate: u32) -> Result<u32, StreamError> {
    let count = duration.as_nanos() * u128::from(sample_rate) / 1_000_000_000;
    u32::try_from(count).map_err(|_| {
        StreamError::MalformedFrame(format!(
            "{:?} at {} Hz is {} samples, more than a frame can carry",
            duration, sample_rate, count
        ))
    })
}

/// Exact size of an encoded audio message.
pub fn audio_message_len(sample_count: usize) -> usize {
    4 * (AUDIO_WIRE_CHANNELS as usize * sample_count + 3)
}

/// Exact size of an encoded video message.
pub fn video_message_len(width: u32, height: u32) -> usize {
    VIDEO_HEADER_SIZE + PixelFormat::Nv12.buffer_len(width, height)
}

/// Encode one audio frame, keeping the first five channels of each sample frame.
pub fn encode_audio(frame: &AudioFrameView<'_>) -> Result<WireMessage, StreamError> {
    if frame.channels < AUDIO_WIRE_CHANNELS {
        return Err(StreamError::MalformedFrame(format!(
            "audio frame has {} channels, need at least {}",
            frame.channels, AUDIO_WIRE_CHANNELS
        )));
    }

    let sample_count = audio_sample_count(frame.duration, frame.sample_rate)?;

    let native = frame.channels as usize;
    let frames = sample_count as usize;
    let needed = frames * native;
    if frame.samples.len() < needed {
        return Err(StreamError::MalformedFrame(format!(
            "audio buffer holds {} samples, {} needed for {} frames of {} channels",
            frame.samples.len(),
            needed,
            frames,
            native
        )));
    }

    let out_channels = AUDIO_WIRE_CHANNELS as usize;
    let mut buf = BytesMut::with_capacity(audio_message_len(frames));
    buf.put_u32_le(AUDIO_WIRE_CHANNELS);
    buf.put_u32_le(sample_count);
    buf.put_u32_le(frame.sample_rate);

    for i in 0..out_channels * frames {
        let frame_idx = i / out_channels;
        let channel_idx = i % out_channels;
        buf.put_f32_le(frame.samples[frame_idx * native + channel_idx]);
    }

    Ok(WireMessage {
        kind: MediaKind::Audio,
        bytes: buf.freeze(),
    })
}

/// Encode one NV12 video frame with its focal lengths.
///
/// Other pixel formats must be normalized first; see `pixel_convert`.
pub fn encode_video(frame: &VideoFrameView<'_>) -> Result<WireMessage, StreamError> {
    if frame.format != PixelFormat::Nv12 {
        return Err(StreamError::UnsupportedPixelFormat(format!(
            "{} must be normalized to NV12 before encoding",
            frame.format
        )));
    }

    let payload_len = PixelFormat::Nv12.buffer_len(frame.width, frame.height);
    if frame.data.len() < payload_len {
        return Err(StreamError::MalformedFrame(format!(
            "{}x{} NV12 frame needs {} bytes, got {}",
            frame.width,
            frame.height,
            payload_len,
            frame.data.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(VIDEO_HEADER_SIZE + payload_len);
    buf.put_f32_le(frame.focal_x);
    buf.put_f32_le(frame.focal_y);
    buf.put_u32_le(frame.width);
    buf.put_u32_le(frame.height);
    buf.put_slice(&frame.data[..payload_len]);

    Ok(WireMessage {
        kind: MediaKind::Video,
        bytes: buf.freeze(),
    })
}

/// Parsed audio message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioHeader {
    pub channels: u32,
    pub sample_count: u32,
    pub sample_rate: u32,
}

impl AudioHeader {
    /// Bytes of sample data following the header.
    pub fn payload_len(&self) -> usize {
        self.channels as usize * self.sample_count as usize * 4
    }
}

/// Parsed video message header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoHeader {
    pub focal_x: f32,
    pub focal_y: f32,
    pub width: u32,
    pub height: u32,
}

impl VideoHeader {
    pub fn payload_len(&self) -> usize {
        PixelFormat::Nv12.buffer_len(self.width, self.height)
    }
}

/// Read an audio header from the front of `buf`, as a receiver would.
pub fn decode_audio_header(mut buf: &[u8]) -> Option<AudioHeader> {
    if buf.len() < AUDIO_HEADER_SIZE {
        return None;
    }
    Some(AudioHeader {
        channels: buf.get_u32_le(),
        sample_count: buf.get_u32_le(),
        sample_rate: buf.get_u32_le(),
    })
}

pub fn decode_video_header(mut buf: &[u8]) -> Option<VideoHeader> {
    if buf.len() < VIDEO_HEADER_SIZE {
        return None;
    }
    Some(VideoHeader {
        focal_x: buf.get_f32_le(),
        focal_y: buf.get_f32_le(),
        width: buf.get_u32_le(),
        height: buf.get_u32_le(),
    })
}
