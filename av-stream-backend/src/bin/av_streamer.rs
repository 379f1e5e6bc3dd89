//! Streams the synthetic device to TCP consumers until Ctrl-C.
//!
//! ```text
//! av-streamer --config av-stream.toml
//! av-streamer --audio-address 127.0.0.1:50001 --video-address 127.0.0.1:50002 --duration 10
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use av_stream_backend::{SyntheticFrameSource, TcpStreamListener};
use av_stream_core::{
    CaptureSession, FormatSelection, GatewayState, MediaKind, SessionDelegate, SessionState, StreamConfiguration,
    StreamError,
};

#[derive(Parser, Debug)]
#[command(name = "av-streamer", version, about = "Stream captured audio and video frames over TCP")]
struct Args {
    /// TOML configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "av-stream.toml")]
    config: PathBuf,

    /// Override the audio service address (port or host:port)
    #[arg(long)]
    audio_address: Option<String>,

    /// Override the video service address (port or host:port)
    #[arg(long)]
    video_address: Option<String>,

    /// Match formats against device profiles instead of color sources
    #[arg(long)]
    profile: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration: Option<u64>,
}

/// Logs session events.
struct LoggingDelegate;

impl SessionDelegate for LoggingDelegate {
    fn on_state_changed(&self, state: &SessionState) {
        log::info!("Session {}", state.label());
    }

    fn on_gateway_changed(&self, kind: MediaKind, state: GatewayState) {
        log::info!("{} gateway {}", kind, state.label());
    }

    fn on_error(&self, error: &StreamError) {
        log::warn!("{}", error);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), StreamError> {
    let mut config = StreamConfiguration::load_from_file(&args.config)?;
    if let Some(address) = args.audio_address {
        config.audio_address = address;
    }
    if let Some(address) = args.video_address {
        config.video_address = address;
    }
    if args.profile {
        config.format_selection = FormatSelection::Profile;
    }

    let mut session = CaptureSession::new(
        SyntheticFrameSource::new(),
        TcpStreamListener::new(),
        TcpStreamListener::new(),
        config,
    );
    session.set_delegate(Arc::new(LoggingDelegate));

    if let Err(e) = session.start() {
        println!("{}", session.report().to_json()?);
        return Err(e);
    }
    log::info!(
        "Audio on {}, video on {}",
        session.local_address(MediaKind::Audio).unwrap_or("?"),
        session.local_address(MediaKind::Video).unwrap_or("?")
    );

    let (interrupt_sender, interrupt_receiver) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = interrupt_sender.try_send(());
    })
    .map_err(|e| StreamError::Io(format!("failed to install Ctrl-C handler: {}", e)))?;

    match args.duration {
        Some(secs) => {
            let _ = interrupt_receiver.recv_timeout(Duration::from_secs(secs));
        }
        None => {
            let _ = interrupt_receiver.recv();
        }
    }

    session.stop();
    println!("{}", session.report().to_json()?);
    Ok(())
}
