use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StreamError;
use super::media::StreamFormatDescriptor;

/// Live per-stream counters, updated from the frame-arrived handler.
#[derive(Debug, Default)]
pub struct StreamCounters {
    frames_arrived: AtomicU64,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    frames_rejected: AtomicU64,
    bytes_sent: AtomicU64,
}

impl StreamCounters {
    pub fn record_arrival(&self) {
        self.frames_arrived.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Frame dropped because no consumer was attached (or the sink faulted).
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame the codec refused to encode.
    pub fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStatistics {
        StreamStatistics {
            frames_arrived: self.frames_arrived.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatistics {
    pub frames_arrived: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub frames_rejected: u64,
    pub bytes_sent: u64,
}

/// Status snapshot of a capture session.
///
/// Serializable for JSON export by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: String,
    pub failure: Option<String>,
    pub source_group: Option<String>,
    pub video_format: Option<StreamFormatDescriptor>,
    pub audio_gateway: String,
    pub video_gateway: String,
    pub audio: StreamStatistics,
    pub video: StreamStatistics,
}

impl SessionReport {
    pub fn to_json(&self) -> Result<String, StreamError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StreamError::Io(format!("failed to serialize report: {}", e)))
    }
}
