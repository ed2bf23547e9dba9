//! Engine and recording configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Mode;

/// Configuration for a capture engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Opaque identifier of the device to open.
    pub device_id: String,

    /// Still or video configuration of the Bind stage.
    pub mode: Mode,

    /// Whether a frame-processing output is bound.
    pub has_frame_processors: bool,

    /// Upper bound for either side of the frame-processing output.
    pub frame_processing_max_side: u32,

    /// Metering behavior.
    pub metering: MeteringConfig,

    /// When the preview template is restored after a recording.
    pub template_restore: TemplateRestorePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_id: "0".to_string(),
            mode: Mode::Picture,
            has_frame_processors: false,
            frame_processing_max_side: 700,
            metering: MeteringConfig::default(),
            template_restore: TemplateRestorePolicy::default(),
        }
    }
}

/// Metering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteringConfig {
    /// Number of stream results a sub-meter may observe before timing out.
    pub timeout_frames: u32,

    /// Side of the primary metering region, as a fraction of the shorter
    /// sensor side.
    pub region_fraction: f32,

    /// Scale of the secondary, lower-weight region around the primary one.
    pub blur_factor: f32,
}

impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            timeout_frames: 60,
            region_fraction: 0.05,
            blur_factor: 1.5,
        }
    }
}

/// Ordering of the preview-template restore relative to the recorder stop.
///
/// Some hardware crashes when frames keep flowing into an abandoned recorder
/// surface, so the restore can be moved ahead of the recorder stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateRestorePolicy {
    /// Restore once the recorder has delivered its result.
    #[default]
    AfterResult,

    /// Restore as soon as the recording ends, before the recorder is stopped.
    BeforeRecorderStop,
}

/// A request to record a video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRequest {
    /// Output container path.
    pub output: PathBuf,

    /// Maximum duration in milliseconds (0 for no limit).
    pub max_duration_ms: u64,

    /// Maximum size in bytes (0 for no limit).
    pub max_size_bytes: u64,

    /// Video bitrate in bits per second.
    pub video_bitrate_bps: u64,

    /// Audio bitrate in bits per second.
    pub audio_bitrate_bps: u64,

    /// Whether an audio track is recorded.
    pub audio: bool,
}

impl Default for VideoRequest {
    fn default() -> Self {
        Self {
            output: PathBuf::from("video.shv"),
            max_duration_ms: 0,
            max_size_bytes: 0,
            video_bitrate_bps: 6_000_000,
            audio_bitrate_bps: 128_000,
            audio: false,
        }
    }
}
