use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::StreamError;
use super::media::MediaKind;

/// How the video format is chosen at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormatSelection {
    /// Match against the formats of the device's video profiles.
    Profile,
    /// Match against the raw formats of each color frame source.
    ColorSource,
}

/// Configuration for a streaming session.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    /// Target video width in pixels (default: 960).
    pub width: u32,

    /// Target video height in pixels (default: 540).
    pub height: u32,

    /// Target frame rate, compared exactly against format descriptors (default: 15).
    pub frame_rate: f64,

    /// Service address the audio consumer connects to (default: "50001").
    pub audio_address: String,

    /// Service address the video consumer connects to (default: "50002").
    pub video_address: String,

    pub format_selection: FormatSelection,

    /// Restrict selection to one source group, or None for the first match.
    pub source_group_id: Option<String>,
}

impl StreamConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("invalid resolution: {}x{}", self.width, self.height));
        }
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(format!("invalid frame rate: {}", self.frame_rate));
        }
        if self.audio_address.trim().is_empty() || self.video_address.trim().is_empty() {
            return Err("service addresses must not be empty".into());
        }
        if self.audio_address == self.video_address && !is_ephemeral(&self.audio_address) {
            return Err(format!(
                "audio and video share the service address {}",
                self.audio_address
            ));
        }
        Ok(())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, StreamError> {
        toml::from_str(contents)
            .map_err(|e| StreamError::ConfigurationFailed(format!("failed to parse config: {}", e)))
    }

    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StreamError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            StreamError::ConfigurationFailed(format!("failed to read config file: {}", e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn address_for(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Audio => &self.audio_address,
            MediaKind::Video => &self.video_address,
        }
    }
}

/// Port 0 asks the OS for a free port, so two such addresses never collide.
fn is_ephemeral(address: &str) -> bool {
    address == "0" || address.ends_with(":0")
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            frame_rate: 15.0,
            audio_address: "50001".into(),
            video_address: "50002".into(),
            format_selection: FormatSelection::ColorSource,
            source_group_id: None,
        }
    }
}
