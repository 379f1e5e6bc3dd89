//! End-to-end streaming over loopback TCP.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use approx::assert_relative_eq;

use av_stream_backend::synthetic::channel_gain;
use av_stream_backend::{SyntheticFrameSource, TcpStreamListener};
use av_stream_core::processing::frame_codec::{
    decode_audio_header, decode_video_header, AUDIO_HEADER_SIZE, VIDEO_HEADER_SIZE,
};
use av_stream_core::{CaptureSession, GatewayState, MediaKind, StreamConfiguration, StreamError};

fn loopback_config() -> StreamConfiguration {
    StreamConfiguration {
        audio_address: "127.0.0.1:0".into(),
        video_address: "127.0.0.1:0".into(),
        ..Default::default()
    }
}

fn connect(address: &str) -> TcpStream {
    let stream = TcpStream::connect(address).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

#[test]
fn streams_audio_and_video_to_consumers() {
    let source = SyntheticFrameSource::new().with_focal_length(864.0, 865.5);
    let mut session = CaptureSession::new(source, TcpStreamListener::new(), TcpStreamListener::new(), loopback_config());
    session.start().unwrap();

    let mut audio = connect(session.local_address(MediaKind::Audio).unwrap());
    let mut video = connect(session.local_address(MediaKind::Video).unwrap());

    // Audio: 20 ms frames at 48 kHz carry 960 samples on 5 channels.
    let mut header = [0u8; AUDIO_HEADER_SIZE];
    audio.read_exact(&mut header).unwrap();
    let audio_header = decode_audio_header(&header).unwrap();
    assert_eq!(audio_header.channels, 5);
    assert_eq!(audio_header.sample_count, 960);
    assert_eq!(audio_header.sample_rate, 48000);

    let mut payload = vec![0u8; audio_header.payload_len()];
    audio.read_exact(&mut payload).unwrap();
    let samples: Vec<f32> = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    for frame in samples.chunks_exact(5) {
        for (channel, value) in frame.iter().enumerate() {
            assert_relative_eq!(*value, frame[0] * channel_gain(channel as u32, 11), epsilon = 1e-6);
        }
    }

    // Video: the selected 960x540 NV12 format with the configured intrinsics.
    let mut header = [0u8; VIDEO_HEADER_SIZE];
    video.read_exact(&mut header).unwrap();
    let video_header = decode_video_header(&header).unwrap();
    assert_eq!((video_header.width, video_header.height), (960, 540));
    assert_relative_eq!(video_header.focal_x, 864.0);
    assert_relative_eq!(video_header.focal_y, 865.5);

    let mut pixels = vec![0u8; video_header.payload_len()];
    video.read_exact(&mut pixels).unwrap();
    assert_eq!(pixels.len(), 960 * 540 * 3 / 2);

    session.stop();

    // Teardown flushes what was queued and closes both connections.
    let mut rest = Vec::new();
    audio.read_to_end(&mut rest).unwrap();
    video.read_to_end(&mut rest).unwrap();

    let report = session.report();
    assert_eq!(report.state, "stopped");
    assert!(report.audio.frames_sent >= 1);
    assert!(report.video.frames_sent >= 1);
    assert_eq!(session.gateway_state(MediaKind::Audio), GatewayState::Closed);
    assert_eq!(session.gateway_state(MediaKind::Video), GatewayState::Closed);
}

#[test]
fn frames_are_dropped_until_a_consumer_connects() {
    let mut session = CaptureSession::new(
        SyntheticFrameSource::new(),
        TcpStreamListener::new(),
        TcpStreamListener::new(),
        loopback_config(),
    );
    session.start().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    session.stop();

    let report = session.report();
    assert!(report.audio.frames_dropped >= 1);
    assert_eq!(report.audio.frames_sent, 0);
    assert_eq!(report.video.bytes_sent, 0);
}

#[test]
fn occupied_port_fails_start() {
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let config = StreamConfiguration {
        video_address: taken.local_addr().unwrap().to_string(),
        ..loopback_config()
    };

    let mut session = CaptureSession::new(SyntheticFrameSource::new(), TcpStreamListener::new(), TcpStreamListener::new(), config);
    let err = session.start().unwrap_err();

    assert!(matches!(err, StreamError::BindFailed { .. }));
    assert_eq!(session.report().state, "failed");
    assert_eq!(session.gateway_state(MediaKind::Audio), GatewayState::Closed);
}

#[test]
fn unmatched_frame_rate_fails_start() {
    let config = StreamConfiguration {
        frame_rate: 25.0,
        ..loopback_config()
    };
    let mut session = CaptureSession::new(SyntheticFrameSource::new(), TcpStreamListener::new(), TcpStreamListener::new(), config);

    assert!(matches!(session.start(), Err(StreamError::NoMatchingFormat(_))));
    assert!(session.state().is_stopped());
}
