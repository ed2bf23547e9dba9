//! The device backend capability interface.

use std::sync::Arc;

use bytes::Bytes;
use shutter_ipc::{DeviceOptions, Flash, Hdr, Size, WhiteBalance};

use crate::error::{DeviceError, DeviceErrorCode};
use crate::frame::FrameListener;
use crate::request::{AeMode, AfMode, AwbMode, CaptureRequest, CaptureResult, SceneMode};
use crate::surface::SurfaceHandle;
use crate::DeviceResult;

/// Static capabilities of an opened device.
#[derive(Debug, Clone)]
pub struct DeviceCharacteristics {
    pub af_modes: Vec<AfMode>,
    pub ae_modes: Vec<AeMode>,
    pub awb_modes: Vec<AwbMode>,
    pub scene_modes: Vec<SceneMode>,
    pub flash_available: bool,

    /// Maximum digital zoom ratio; 1.0 means no zoom.
    pub max_digital_zoom: f32,

    /// Sensor active array.
    pub active_array: Size,

    /// Inclusive exposure compensation range, in steps.
    pub exposure_compensation_range: (i32, i32),

    /// EV per compensation step.
    pub exposure_compensation_step: f32,

    pub max_regions_af: usize,
    pub max_regions_ae: usize,
    pub max_regions_awb: usize,

    /// Legacy hardware cannot run precapture sequences reliably.
    pub legacy_hardware: bool,

    pub preview_sizes: Vec<Size>,
    pub picture_sizes: Vec<Size>,
    pub processing_sizes: Vec<Size>,
}

impl Default for DeviceCharacteristics {
    fn default() -> Self {
        Self {
            af_modes: vec![
                AfMode::Off,
                AfMode::Auto,
                AfMode::ContinuousVideo,
                AfMode::ContinuousPicture,
            ],
            ae_modes: vec![AeMode::Off, AeMode::On, AeMode::OnAutoFlash, AeMode::OnAlwaysFlash],
            awb_modes: vec![
                AwbMode::Auto,
                AwbMode::Incandescent,
                AwbMode::Fluorescent,
                AwbMode::Daylight,
                AwbMode::CloudyDaylight,
            ],
            scene_modes: vec![SceneMode::Disabled, SceneMode::Hdr],
            flash_available: true,
            max_digital_zoom: 4.0,
            active_array: Size::new(4000, 3000),
            exposure_compensation_range: (-12, 12),
            exposure_compensation_step: 1.0 / 6.0,
            max_regions_af: 1,
            max_regions_ae: 1,
            max_regions_awb: 1,
            legacy_hardware: false,
            preview_sizes: vec![Size::new(1920, 1080), Size::new(1280, 720), Size::new(640, 480)],
            picture_sizes: vec![Size::new(4000, 3000), Size::new(1920, 1080)],
            processing_sizes: vec![Size::new(1280, 720), Size::new(640, 480), Size::new(320, 240)],
        }
    }
}

impl DeviceCharacteristics {
    pub fn supports_flash(&self, flash: Flash) -> bool {
        match flash {
            Flash::Off => true,
            _ => self.flash_available,
        }
    }

    pub fn supports_white_balance(&self, white_balance: WhiteBalance) -> bool {
        self.awb_modes.contains(&AwbMode::from(white_balance))
    }

    pub fn supports_hdr(&self, hdr: Hdr) -> bool {
        match hdr {
            Hdr::Off => true,
            Hdr::On => self.scene_modes.contains(&SceneMode::Hdr),
        }
    }

    pub fn zoom_supported(&self) -> bool {
        self.max_digital_zoom > 1.0
    }

    pub fn exposure_correction_supported(&self) -> bool {
        self.exposure_compensation_range != (0, 0)
    }

    /// Exposure correction bounds in EV.
    pub fn exposure_correction_bounds(&self) -> (f32, f32) {
        let (min, max) = self.exposure_compensation_range;
        (
            min as f32 * self.exposure_compensation_step,
            max as f32 * self.exposure_compensation_step,
        )
    }

    /// Whether any 3A routine can be driven by metering.
    pub fn metering_supported(&self) -> bool {
        self.af_modes.iter().any(|m| m.supports_trigger())
            || self.max_regions_ae > 0
            || self.max_regions_awb > 0
    }

    /// What listeners are told the device supports.
    pub fn options(&self) -> DeviceOptions {
        let flash = [Flash::Off, Flash::On, Flash::Auto, Flash::Torch]
            .into_iter()
            .filter(|f| self.supports_flash(*f))
            .collect();
        let white_balance = [
            WhiteBalance::Auto,
            WhiteBalance::Incandescent,
            WhiteBalance::Fluorescent,
            WhiteBalance::Daylight,
            WhiteBalance::Cloudy,
        ]
        .into_iter()
        .filter(|w| self.supports_white_balance(*w))
        .collect();
        let hdr = [Hdr::Off, Hdr::On]
            .into_iter()
            .filter(|h| self.supports_hdr(*h))
            .collect();

        DeviceOptions {
            flash,
            white_balance,
            hdr,
            zoom_supported: self.zoom_supported(),
            exposure_correction_supported: self.exposure_correction_supported(),
            exposure_correction_range: self.exposure_correction_bounds(),
            metering_supported: self.metering_supported(),
        }
    }
}

/// Device lifecycle notifications. `on_disconnected` and `on_error` may
/// arrive before or after `on_opened`.
pub trait DeviceStateCallback: Send + Sync {
    fn on_opened(&self, characteristics: DeviceCharacteristics);
    fn on_disconnected(&self);
    fn on_error(&self, code: DeviceErrorCode);
}

/// Receives per-frame notifications for submitted requests.
pub trait StreamListener: Send + Sync {
    fn on_capture_started(&self, request: &CaptureRequest, frame_number: u64);
    fn on_capture_progressed(&self, request: &CaptureRequest, partial: &CaptureResult);
    fn on_capture_completed(&self, request: &CaptureRequest, result: &CaptureResult);
}

/// Resolves once a session is configured or rejected.
pub type SessionCallback = Box<dyn FnOnce(DeviceResult<()>) + Send>;

/// Resolves with the encoded still image.
pub type StillCallback = Box<dyn FnOnce(DeviceResult<Bytes>) + Send>;

/// Outputs of a capture session.
#[derive(Clone)]
pub struct SessionConfig {
    pub surfaces: Vec<SurfaceHandle>,

    /// Receives frames rendered into the frame-processing surface.
    pub frame_listener: Option<(SurfaceHandle, Arc<dyn FrameListener>)>,
}

/// Hardware primitives the engine is built on. Callbacks may be invoked from
/// any thread.
pub trait DeviceBackend: Send + 'static {
    /// Open a device by identifier.
    fn open(&mut self, device_id: &str, callback: Arc<dyn DeviceStateCallback>);

    /// Create a capture session over the given outputs.
    fn create_session(&mut self, config: SessionConfig, callback: SessionCallback);

    /// Replace the repeating request.
    fn submit_repeating(
        &mut self,
        request: CaptureRequest,
        listener: Arc<dyn StreamListener>,
    ) -> DeviceResult<()>;

    /// Stop the repeating request.
    fn stop_repeating(&mut self) -> DeviceResult<()>;

    /// Submit a request once, e.g. to fire a trigger.
    fn capture(
        &mut self,
        request: CaptureRequest,
        listener: Arc<dyn StreamListener>,
    ) -> DeviceResult<()>;

    /// Capture a still image.
    fn capture_still(&mut self, request: CaptureRequest, callback: StillCallback);

    /// Close the current session.
    fn close_session(&mut self);

    /// Close the device.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_reflect_characteristics() {
        let characteristics = DeviceCharacteristics {
            flash_available: false,
            scene_modes: vec![SceneMode::Disabled],
            max_digital_zoom: 1.0,
            ..Default::default()
        };
        let options = characteristics.options();
        assert_eq!(options.flash, vec![Flash::Off]);
        assert_eq!(options.hdr, vec![Hdr::Off]);
        assert!(!options.zoom_supported);
        assert!(options.exposure_correction_supported);
    }

    #[test]
    fn test_exposure_bounds() {
        let characteristics = DeviceCharacteristics {
            exposure_compensation_range: (-6, 6),
            exposure_compensation_step: 0.5,
            ..Default::default()
        };
        assert_eq!(characteristics.exposure_correction_bounds(), (-3.0, 3.0));
    }
}
