//! Pixel format normalization to NV12.
//!
//! Backends may deliver NV21, I420, YUYV or GRAY8; the wire carries NV12
//! only. NV12 input is passed through without copying.

use std::borrow::Cow;

use crate::models::error::StreamError;
use crate::models::media::{PixelFormat, VideoFrameView};

/// Return the frame's pixels as a tightly packed NV12 buffer.
pub fn normalize_to_nv12<'a>(frame: &VideoFrameView<'a>) -> Result<Cow<'a, [u8]>, StreamError> {
    let (width, height) = (frame.width as usize, frame.height as usize);
    let needed = frame.format.buffer_len(frame.width, frame.height);
    if frame.data.len() < needed {
        return Err(StreamError::MalformedFrame(format!(
            "{}x{} {} frame needs {} bytes, got {}",
            width,
            height,
            frame.format,
            needed,
            frame.data.len()
        )));
    }
    let data = &frame.data[..needed];

    let subsampled = frame.format != PixelFormat::Nv12;
    if subsampled && (width % 2 != 0 || height % 2 != 0) {
        return Err(StreamError::UnsupportedPixelFormat(format!(
            "{} at odd size {}x{} cannot be subsampled to 4:2:0",
            frame.format, width, height
        )));
    }

    let converted = match frame.format {
        PixelFormat::Nv12 => return Ok(Cow::Borrowed(data)),
        PixelFormat::Nv21 => nv21_to_nv12(data, width, height),
        PixelFormat::I420 => i420_to_nv12(data, width, height),
        PixelFormat::Yuyv => yuyv_to_nv12(data, width, height),
        PixelFormat::Gray8 => gray8_to_nv12(data, width, height),
    };
    Ok(Cow::Owned(converted))
}

/// Swap the V/U byte order of the chroma plane.
pub fn nv21_to_nv12(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let luma = width * height;
    let mut out = data.to_vec();
    for pair in out[luma..].chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    out
}

/// Interleave the separate U and V planes.
pub fn i420_to_nv12(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let luma = width * height;
    let quarter = luma / 4;
    let (y, chroma) = data.split_at(luma);
    let (u, v) = chroma.split_at(quarter);

    let mut out = Vec::with_capacity(luma + quarter * 2);
    out.extend_from_slice(y);
    for (&cb, &cr) in u.iter().zip(&v[..quarter]) {
        out.push(cb);
        out.push(cr);
    }
    out
}

/// Pull luma out of packed 4:2:2 and average chroma over each row pair.
///
/// YUYV format: Y0 U Y1 V, each 4-byte group encodes 2 pixels.
pub fn yuyv_to_nv12(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let stride = width * 2;
    let mut out = Vec::with_capacity(width * height * 3 / 2);

    for row in data.chunks_exact(stride).take(height) {
        out.extend(row.iter().step_by(2));
    }

    for pair in 0..height / 2 {
        let top = &data[pair * 2 * stride..(pair * 2 + 1) * stride];
        let bottom = &data[(pair * 2 + 1) * stride..(pair * 2 + 2) * stride];
        for (t, b) in top.chunks_exact(4).zip(bottom.chunks_exact(4)) {
            out.push(((t[1] as u16 + b[1] as u16 + 1) / 2) as u8);
            out.push(((t[3] as u16 + b[3] as u16 + 1) / 2) as u8);
        }
    }
    out
}

/// Luma as-is with neutral chroma.
pub fn gray8_to_nv12(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let luma = width * height;
    let mut out = Vec::with_capacity(luma * 3 / 2);
    out.extend_from_slice(&data[..luma]);
    out.resize(luma * 3 / 2, 128);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(data: &[u8], format: PixelFormat, width: u32, height: u32) -> VideoFrameView<'_> {
        VideoFrameView {
            data,
            format,
            width,
            height,
            focal_x: 0.0,
            focal_y: 0.0,
        }
    }

    #[test]
    fn nv12_is_borrowed() {
        let data = vec![1u8; 12];
        let out = normalize_to_nv12(&view(&data, PixelFormat::Nv12, 4, 2)).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn nv21_swaps_chroma() {
        // 4x2: 8 luma bytes, 2 VU pairs
        let data = [0, 1, 2, 3, 4, 5, 6, 7, 20, 10, 21, 11];
        let out = normalize_to_nv12(&view(&data, PixelFormat::Nv21, 4, 2)).unwrap();
        assert_eq!(&out[..8], &data[..8]);
        assert_eq!(&out[8..], &[10, 20, 11, 21]);
    }

    #[test]
    fn i420_interleaves_planes() {
        let data = [0, 1, 2, 3, 4, 5, 6, 7, 10, 11, 20, 21];
        let out = normalize_to_nv12(&view(&data, PixelFormat::I420, 4, 2)).unwrap();
        assert_eq!(&out[8..], &[10, 20, 11, 21]);
    }

    #[test]
    fn yuyv_extracts_luma_and_averages_chroma() {
        // 2x2: two rows of Y0 U Y1 V
        let data = [10, 100, 11, 200, 12, 102, 13, 202];
        let out = normalize_to_nv12(&view(&data, PixelFormat::Yuyv, 2, 2)).unwrap();
        assert_eq!(out.as_ref(), &[10, 11, 12, 13, 101, 201]);
    }

    #[test]
    fn gray8_gets_neutral_chroma() {
        let data = [50u8; 8];
        let out = normalize_to_nv12(&view(&data, PixelFormat::Gray8, 4, 2)).unwrap();
        assert_eq!(out.len(), 12);
        assert!(out[8..].iter().all(|b| *b == 128));
    }

    #[test]
    fn output_size_is_nv12_size() {
        for format in [PixelFormat::Nv21, PixelFormat::I420, PixelFormat::Yuyv, PixelFormat::Gray8] {
            let data = vec![0u8; format.buffer_len(16, 8)];
            let out = normalize_to_nv12(&view(&data, format, 16, 8)).unwrap();
            assert_eq!(out.len(), 16 * 8 * 3 / 2, "{}", format);
        }
    }

    #[test]
    fn short_buffer_is_rejected() {
        let data = [0u8; 4];
        assert!(matches!(
            normalize_to_nv12(&view(&data, PixelFormat::Yuyv, 4, 2)),
            Err(StreamError::MalformedFrame(_))
        ));
    }

    #[test]
    fn odd_size_cannot_be_subsampled() {
        let data = vec![0u8; PixelFormat::Gray8.buffer_len(3, 3)];
        assert!(matches!(
            normalize_to_nv12(&view(&data, PixelFormat::Gray8, 3, 3)),
            Err(StreamError::UnsupportedPixelFormat(_))
        ));
    }
}
