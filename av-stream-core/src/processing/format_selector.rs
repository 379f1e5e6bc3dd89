//! Exact-match video format selection.
//!
//! Both paths return the first match in enumeration order: groups, then
//! profiles or color sources, then formats. There is no tolerance and no
//! nearest-match fallback.

use std::fmt;

use crate::models::config::{FormatSelection, StreamConfiguration};
use crate::models::error::StreamError;
use crate::models::media::{
    DeviceRequest, FrameSourceInfo, SourceGroup, SourceKind, StreamFormatDescriptor, StreamingMode,
    VideoProfile,
};

/// Requested video geometry and rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatTarget {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

impl FormatTarget {
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }

    fn matches_size(&self, format: &StreamFormatDescriptor) -> bool {
        format.width == self.width && format.height == self.height
    }
}

impl From<&StreamConfiguration> for FormatTarget {
    fn from(config: &StreamConfiguration) -> Self {
        Self::new(config.width, config.height, config.frame_rate)
    }
}

impl fmt::Display for FormatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} @ {}fps", self.width, self.height, self.frame_rate)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileMatch<'a> {
    pub group: &'a SourceGroup,
    pub profile: &'a VideoProfile,
    pub format: &'a StreamFormatDescriptor,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorSourceMatch<'a> {
    pub group: &'a SourceGroup,
    pub source: &'a FrameSourceInfo,
    pub format: &'a StreamFormatDescriptor,
}

/// First profile format whose width, height and frame rate equal the target.
pub fn select_profile<'a>(
    groups: &'a [SourceGroup],
    target: &FormatTarget,
) -> Result<ProfileMatch<'a>, StreamError> {
    if groups.is_empty() {
        return Err(StreamError::NoSourceGroup);
    }

    groups
        .iter()
        .flat_map(|group| group.profiles.iter().map(move |profile| (group, profile)))
        .flat_map(|(group, profile)| profile.formats.iter().map(move |format| (group, profile, format)))
        .find(|(_, _, format)| target.matches_size(format) && format.frame_rate.as_f64() == target.frame_rate)
        .map(|(group, profile, format)| ProfileMatch {
            group,
            profile,
            format,
        })
        .ok_or_else(|| StreamError::NoMatchingFormat(target.to_string()))
}

/// First color-source format of the target size at exactly `frame_rate / 1`.
pub fn select_color_format<'a>(
    groups: &'a [SourceGroup],
    target: &FormatTarget,
) -> Result<ColorSourceMatch<'a>, StreamError> {
    if groups.is_empty() {
        return Err(StreamError::NoSourceGroup);
    }

    groups
        .iter()
        .flat_map(|group| group.sources_of(SourceKind::Color).map(move |source| (group, source)))
        .flat_map(|(group, source)| source.formats.iter().map(move |format| (group, source, format)))
        .find(|(_, _, format)| target.matches_size(format) && format.frame_rate.is_integral(target.frame_rate))
        .map(|(group, source, format)| ColorSourceMatch {
            group,
            source,
            format,
        })
        .ok_or_else(|| StreamError::NoMatchingFormat(target.to_string()))
}

/// Run the configured selection path and build the device request.
///
/// Groups are filtered to `config.source_group_id` when one is set.
pub fn select_device(groups: &[SourceGroup], config: &StreamConfiguration) -> Result<DeviceRequest, StreamError> {
    let candidates: Vec<SourceGroup> = match &config.source_group_id {
        Some(id) => groups.iter().filter(|g| &g.id == id).cloned().collect(),
        None => groups.to_vec(),
    };
    let target = FormatTarget::from(config);

    let request = match config.format_selection {
        FormatSelection::Profile => {
            let m = select_profile(&candidates, &target)?;
            DeviceRequest {
                group_id: m.group.id.clone(),
                profile_id: Some(m.profile.id.clone()),
                video_source_id: None,
                video_format: *m.format,
                mode: StreamingMode::AudioAndVideo,
            }
        }
        FormatSelection::ColorSource => {
            let m = select_color_format(&candidates, &target)?;
            DeviceRequest {
                group_id: m.group.id.clone(),
                profile_id: None,
                video_source_id: Some(m.source.id.clone()),
                video_format: *m.format,
                mode: StreamingMode::AudioAndVideo,
            }
        }
    };
    Ok(request)
}
