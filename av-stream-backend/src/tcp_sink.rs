//! TCP byte sink with a dedicated writer thread.
//!
//! Messages are queued on a bounded `crossbeam-channel` and written in
//! order by the writer thread, so the frame path never blocks on the
//! socket. When the queue is full the newest message is dropped whole and
//! the write reports `QueueFull`.

use std::io::{BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};

use av_stream_core::models::error::StreamError;
use av_stream_core::processing::frame_codec::WireMessage;
use av_stream_core::traits::byte_sink::ByteSink;

/// Messages buffered per connection before new ones are dropped.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// A blocked socket write fails after this long and faults the sink.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

enum SinkCommand {
    Write(Bytes),
    Flush(Sender<()>),
}

/// `ByteSink` over an accepted TCP connection.
pub struct TcpByteSink {
    peer: String,
    commands: Option<Sender<SinkCommand>>,
    faulted: Arc<AtomicBool>,
    stream: TcpStream,
    writer_handle: Option<thread::JoinHandle<()>>,
}

impl TcpByteSink {
    /// Take ownership of `stream` and start its writer thread.
    pub fn spawn(stream: TcpStream, queue_depth: usize) -> Result<Self, StreamError> {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown peer".into());

        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
        let writer_stream = stream.try_clone()?;

        let (sender, receiver) = crossbeam_channel::bounded(queue_depth.max(1));
        let faulted = Arc::new(AtomicBool::new(false));
        let writer_faulted = Arc::clone(&faulted);
        let writer_peer = peer.clone();

        let handle = thread::Builder::new()
            .name(format!("av-stream-writer-{}", peer))
            .spawn(move || writer_loop(writer_stream, receiver, writer_faulted, writer_peer))
            .map_err(|e| StreamError::Io(format!("failed to spawn writer thread: {}", e)))?;

        Ok(Self {
            peer,
            commands: Some(sender),
            faulted,
            stream,
            writer_handle: Some(handle),
        })
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }
}

impl ByteSink for TcpByteSink {
    fn write(&mut self, message: WireMessage) -> Result<(), StreamError> {
        if self.is_faulted() {
            return Err(StreamError::SinkClosed);
        }
        let Some(commands) = &self.commands else {
            return Err(StreamError::SinkClosed);
        };

        let kind = message.kind();
        match commands.try_send(SinkCommand::Write(message.into_bytes())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                log::debug!("{} queue full, dropping {} message", self.peer, kind);
                Err(StreamError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(StreamError::SinkClosed),
        }
    }

    /// Wait until everything queued so far has reached the socket.
    fn flush(&mut self) -> Result<(), StreamError> {
        let Some(commands) = &self.commands else {
            return Err(StreamError::SinkClosed);
        };

        let (ack_sender, ack_receiver) = crossbeam_channel::bounded(1);
        commands
            .send_timeout(SinkCommand::Flush(ack_sender), FLUSH_TIMEOUT)
            .map_err(|_| StreamError::SinkClosed)?;
        ack_receiver
            .recv_timeout(FLUSH_TIMEOUT)
            .map_err(|_| StreamError::Io(format!("flush to {} did not complete", self.peer)))
    }

    fn close(&mut self) {
        // Dropping the sender lets the writer drain the queue and exit.
        self.commands.take();
        if let Some(handle) = self.writer_handle.take() {
            let _ = handle.join();
            let _ = self.stream.shutdown(Shutdown::Both);
            log::debug!("Closed connection to {}", self.peer);
        }
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

impl Drop for TcpByteSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn writer_loop(stream: TcpStream, commands: Receiver<SinkCommand>, faulted: Arc<AtomicBool>, peer: String) {
    let mut writer = BufWriter::new(stream);

    for command in commands.iter() {
        let result = match command {
            SinkCommand::Write(bytes) => {
                let written = writer.write_all(&bytes);
                // Push to the socket once the backlog is drained.
                if written.is_ok() && commands.is_empty() {
                    writer.flush()
                } else {
                    written
                }
            }
            SinkCommand::Flush(ack) => {
                let flushed = writer.flush();
                let _ = ack.send(());
                flushed
            }
        };

        if let Err(e) = result {
            log::warn!("Write to {} failed: {}", peer, e);
            faulted.store(true, Ordering::SeqCst);
            return;
        }
    }

    let _ = writer.flush();
}
