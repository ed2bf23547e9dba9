//! Capture requests, their settings and the results they produce.

use shutter_ipc::{Location, Rect, WhiteBalance};

use crate::surface::SurfaceHandle;

/// Request template. Also used as the tag of a built request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Preview,
    Record,
    StillCapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Off,
    Auto,
}

/// Auto-focus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMode {
    Off,
    Auto,
    Macro,
    ContinuousVideo,
    ContinuousPicture,
    Edof,
}

impl AfMode {
    /// Whether an AF trigger has any effect in this mode.
    pub fn supports_trigger(self) -> bool {
        !matches!(self, Self::Off | Self::Edof)
    }
}

/// Auto-exposure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeMode {
    Off,
    On,
    OnAutoFlash,
    OnAlwaysFlash,
}

impl AeMode {
    /// Whether the AE routine is running.
    pub fn is_on(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// Low-level flash unit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashMode {
    Off,
    Single,
    Torch,
}

/// Auto-white-balance mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwbMode {
    Off,
    Auto,
    Incandescent,
    Fluorescent,
    Daylight,
    CloudyDaylight,
}

impl From<WhiteBalance> for AwbMode {
    fn from(value: WhiteBalance) -> Self {
        match value {
            WhiteBalance::Auto => Self::Auto,
            WhiteBalance::Incandescent => Self::Incandescent,
            WhiteBalance::Fluorescent => Self::Fluorescent,
            WhiteBalance::Daylight => Self::Daylight,
            WhiteBalance::Cloudy => Self::CloudyDaylight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMode {
    Disabled,
    Hdr,
}

/// A one-frame trigger carried by a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trigger {
    #[default]
    Idle,
    Start,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfState {
    Inactive,
    PassiveScan,
    PassiveFocused,
    PassiveUnfocused,
    ActiveScan,
    FocusedLocked,
    NotFocusedLocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeState {
    Inactive,
    Searching,
    Converged,
    Locked,
    FlashRequired,
    Precapture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwbState {
    Inactive,
    Searching,
    Converged,
    Locked,
}

/// A weighted region of interest in sensor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeteringRegion {
    pub rect: Rect,

    /// 0 means ignored, 1000 is the maximum.
    pub weight: u32,
}

impl MeteringRegion {
    pub const MAX_WEIGHT: u32 = 1000;

    pub fn new(rect: Rect, weight: u32) -> Self {
        Self {
            rect,
            weight: weight.min(Self::MAX_WEIGHT),
        }
    }
}

/// Every setting a request carries.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub control_mode: ControlMode,
    pub af_mode: AfMode,
    pub focus_distance: Option<f32>,
    pub ae_mode: AeMode,
    pub flash_mode: FlashMode,
    pub awb_mode: AwbMode,
    pub scene_mode: SceneMode,
    pub crop_region: Option<Rect>,
    pub exposure_compensation: i32,
    pub af_trigger: Trigger,
    pub ae_precapture_trigger: Trigger,
    pub af_regions: Vec<MeteringRegion>,
    pub ae_regions: Vec<MeteringRegion>,
    pub awb_regions: Vec<MeteringRegion>,
    pub location: Option<Location>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            control_mode: ControlMode::Auto,
            af_mode: AfMode::Off,
            focus_distance: None,
            ae_mode: AeMode::On,
            flash_mode: FlashMode::Off,
            awb_mode: AwbMode::Auto,
            scene_mode: SceneMode::Disabled,
            crop_region: None,
            exposure_compensation: 0,
            af_trigger: Trigger::Idle,
            ae_precapture_trigger: Trigger::Idle,
            af_regions: Vec::new(),
            ae_regions: Vec::new(),
            awb_regions: Vec::new(),
            location: None,
        }
    }
}

/// Mutable request under construction.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    template: Template,
    targets: Vec<SurfaceHandle>,
    settings: CaptureSettings,
}

impl RequestBuilder {
    /// Create a builder for the given template with default settings.
    pub fn new(template: Template) -> Self {
        Self {
            template,
            targets: Vec::new(),
            settings: CaptureSettings::default(),
        }
    }

    pub fn template(&self) -> Template {
        self.template
    }

    /// Add an output target. Adding the same target twice is a no-op.
    pub fn add_target(&mut self, surface: SurfaceHandle) {
        if !self.targets.contains(&surface) {
            self.targets.push(surface);
        }
    }

    pub fn remove_target(&mut self, surface: SurfaceHandle) {
        self.targets.retain(|t| *t != surface);
    }

    pub fn clear_targets(&mut self) {
        self.targets.clear();
    }

    pub fn targets(&self) -> &[SurfaceHandle] {
        &self.targets
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut CaptureSettings {
        &mut self.settings
    }

    /// Snapshot the builder into an immutable request tagged with its
    /// template.
    pub fn build(&self) -> CaptureRequest {
        CaptureRequest {
            tag: self.template,
            targets: self.targets.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// An immutable capture request.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub tag: Template,
    pub targets: Vec<SurfaceHandle>,
    pub settings: CaptureSettings,
}

/// Metadata the device reports for a captured frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureResult {
    pub frame_number: u64,
    pub af_state: Option<AfState>,
    pub ae_state: Option<AeState>,
    pub awb_state: Option<AwbState>,
}

impl CaptureResult {
    /// A result with only a frame number.
    pub fn new(frame_number: u64) -> Self {
        Self {
            frame_number,
            ..Default::default()
        }
    }

    pub fn with_af(mut self, state: AfState) -> Self {
        self.af_state = Some(state);
        self
    }

    pub fn with_ae(mut self, state: AeState) -> Self {
        self.ae_state = Some(state);
        self
    }

    pub fn with_awb(mut self, state: AwbState) -> Self {
        self.awb_state = Some(state);
        self
    }
}
