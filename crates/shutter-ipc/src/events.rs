//! Events sent from the engine to its listener.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::state::{Stage, StageState, StopReason};
use crate::types::{DeviceOptions, Location, MeteringTrigger, ParameterValue, PointF, Size};

/// Events that the engine can send to its listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The device finished opening.
    DeviceOpened {
        /// What the device supports.
        options: DeviceOptions,
    },

    /// The device was released.
    DeviceClosed,

    /// A stage changed status.
    StageChanged {
        stage: Stage,
        previous: StageState,
        current: StageState,
    },

    /// A parameter was applied to the live stream.
    ParameterChanged(ParameterValue),

    /// Metering started at a point.
    FocusStart {
        trigger: MeteringTrigger,
        point: PointF,
    },

    /// Metering finished.
    FocusEnd {
        trigger: MeteringTrigger,
        point: PointF,
        success: bool,
    },

    /// A still capture finished.
    PictureResult { result: Result<PictureOutcome, String> },

    /// The recorder began receiving frames.
    VideoRecordingStart,

    /// The recorder stopped receiving frames; the result follows.
    VideoRecordingEnd,

    /// A recording finished.
    VideoResult { result: Result<VideoOutcome, String> },

    /// The encoder pipeline finalized its container.
    EncoderStopped {
        reason: StopReason,

        /// Finalization error, if any.
        error: Option<String>,
    },

    /// Error occurred.
    Error {
        /// Whether the engine can keep running.
        recoverable: bool,

        /// Error message.
        message: String,
    },
}

/// A finished still capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureOutcome {
    /// Output size.
    pub size: Size,

    /// Encoded image bytes.
    pub data: Vec<u8>,

    /// Location tag, if one was set.
    pub location: Option<Location>,
}

/// A finished recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoOutcome {
    /// Container path.
    pub output: PathBuf,

    /// Why the recording ended.
    pub reason: StopReason,
}
