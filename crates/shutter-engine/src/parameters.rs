//! Live stream parameters and how they map onto request settings.

use shutter_capture::{AeMode, AfMode, AwbMode, CaptureSettings, DeviceCharacteristics, FlashMode, SceneMode};
use shutter_ipc::{Flash, Hdr, Location, Mode, ParameterKind, ParameterValue, Rect, WhiteBalance};

/// Parameters as the caller last set them.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub flash: Flash,
    pub white_balance: WhiteBalance,
    pub hdr: Hdr,

    /// 0.0 is no zoom, 1.0 is the device maximum.
    pub zoom: f32,

    /// In EV.
    pub exposure_correction: f32,

    pub location: Option<Location>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            flash: Flash::Off,
            white_balance: WhiteBalance::Auto,
            hdr: Hdr::Off,
            zoom: 0.0,
            exposure_correction: 0.0,
            location: None,
        }
    }
}

impl Parameters {
    pub fn value(&self, kind: ParameterKind) -> ParameterValue {
        match kind {
            ParameterKind::Flash => ParameterValue::Flash(self.flash),
            ParameterKind::WhiteBalance => ParameterValue::WhiteBalance(self.white_balance),
            ParameterKind::Hdr => ParameterValue::Hdr(self.hdr),
            ParameterKind::Zoom => ParameterValue::Zoom(self.zoom),
            ParameterKind::ExposureCorrection => {
                ParameterValue::ExposureCorrection(self.exposure_correction)
            }
            ParameterKind::Location => ParameterValue::Location(self.location),
        }
    }

    /// Store `value`, returning the value it replaced.
    pub fn set(&mut self, value: ParameterValue) -> ParameterValue {
        let old = self.value(value.kind());
        match value {
            ParameterValue::Flash(v) => self.flash = v,
            ParameterValue::WhiteBalance(v) => self.white_balance = v,
            ParameterValue::Hdr(v) => self.hdr = v,
            ParameterValue::Zoom(v) => self.zoom = v,
            ParameterValue::ExposureCorrection(v) => self.exposure_correction = v,
            ParameterValue::Location(v) => self.location = v,
        }
        old
    }
}

/// Write `value` into `settings`. Returns false, leaving `settings`
/// untouched, if the device cannot honor it.
pub fn apply(
    settings: &mut CaptureSettings,
    characteristics: &DeviceCharacteristics,
    value: &ParameterValue,
) -> bool {
    match *value {
        ParameterValue::Flash(flash) => apply_flash(settings, characteristics, flash),
        ParameterValue::WhiteBalance(wb) => apply_white_balance(settings, characteristics, wb),
        ParameterValue::Hdr(hdr) => apply_hdr(settings, characteristics, hdr),
        ParameterValue::Zoom(zoom) => apply_zoom(settings, characteristics, zoom),
        ParameterValue::ExposureCorrection(ev) => apply_exposure(settings, characteristics, ev),
        ParameterValue::Location(location) => {
            settings.location = location;
            true
        }
    }
}

/// Apply every parameter to a fresh builder. Values the device rejects are
/// replaced by their defaults; the effective parameters are returned.
pub fn apply_all(
    settings: &mut CaptureSettings,
    characteristics: &DeviceCharacteristics,
    parameters: &Parameters,
) -> Parameters {
    let defaults = Parameters::default();
    let mut effective = parameters.clone();
    for kind in [
        ParameterKind::Flash,
        ParameterKind::WhiteBalance,
        ParameterKind::Hdr,
        ParameterKind::Zoom,
        ParameterKind::ExposureCorrection,
        ParameterKind::Location,
    ] {
        let value = parameters.value(kind);
        if !apply(settings, characteristics, &value) {
            let fallback = defaults.value(kind);
            apply(settings, characteristics, &fallback);
            effective.set(fallback);
        }
    }
    effective
}

/// Candidate `(ae, flash)` pairs for a flash setting, best first.
fn flash_candidates(flash: Flash) -> &'static [(AeMode, FlashMode)] {
    match flash {
        Flash::Off => &[(AeMode::On, FlashMode::Off), (AeMode::Off, FlashMode::Off)],
        Flash::Torch => &[(AeMode::On, FlashMode::Torch), (AeMode::Off, FlashMode::Torch)],
        Flash::Auto => &[(AeMode::OnAutoFlash, FlashMode::Off)],
        Flash::On => &[(AeMode::OnAlwaysFlash, FlashMode::Off)],
    }
}

fn apply_flash(settings: &mut CaptureSettings, characteristics: &DeviceCharacteristics, flash: Flash) -> bool {
    if !characteristics.supports_flash(flash) {
        return false;
    }
    let Some((ae_mode, flash_mode)) = flash_candidates(flash)
        .iter()
        .find(|(ae, _)| characteristics.ae_modes.contains(ae))
    else {
        return false;
    };
    settings.ae_mode = *ae_mode;
    settings.flash_mode = *flash_mode;
    true
}

fn apply_white_balance(
    settings: &mut CaptureSettings,
    characteristics: &DeviceCharacteristics,
    white_balance: WhiteBalance,
) -> bool {
    if !characteristics.supports_white_balance(white_balance) {
        return false;
    }
    settings.awb_mode = AwbMode::from(white_balance);
    true
}

fn apply_hdr(settings: &mut CaptureSettings, characteristics: &DeviceCharacteristics, hdr: Hdr) -> bool {
    if !characteristics.supports_hdr(hdr) {
        return false;
    }
    settings.scene_mode = match hdr {
        Hdr::On => SceneMode::Hdr,
        Hdr::Off => SceneMode::Disabled,
    };
    true
}

/// Centered crop of the active array for a zoom in `[0, 1]`.
pub fn zoom_crop(characteristics: &DeviceCharacteristics, zoom: f32) -> Rect {
    let array = characteristics.active_array;
    let ratio = 1.0 + zoom * (characteristics.max_digital_zoom - 1.0);
    let width = (array.width as f32 / ratio).round() as i32;
    let height = (array.height as f32 / ratio).round() as i32;
    let left = (array.width as i32 - width) / 2;
    let top = (array.height as i32 - height) / 2;
    Rect::new(left, top, left + width, top + height)
}

fn apply_zoom(settings: &mut CaptureSettings, characteristics: &DeviceCharacteristics, zoom: f32) -> bool {
    if !(0.0..=1.0).contains(&zoom) {
        return false;
    }
    if !characteristics.zoom_supported() {
        // Nothing to crop; only "no zoom" is honored.
        return zoom == 0.0;
    }
    settings.crop_region = Some(zoom_crop(characteristics, zoom));
    true
}

fn apply_exposure(settings: &mut CaptureSettings, characteristics: &DeviceCharacteristics, ev: f32) -> bool {
    if !characteristics.exposure_correction_supported() {
        return ev == 0.0;
    }
    let step = characteristics.exposure_compensation_step;
    if !ev.is_finite() || step <= 0.0 {
        return false;
    }
    let steps = (ev / step).round() as i32;
    let (min, max) = characteristics.exposure_compensation_range;
    if steps < min || steps > max {
        return false;
    }
    settings.exposure_compensation = steps;
    true
}

/// Pick the repeating focus mode: continuous modes first, then auto, then a
/// fixed focus at infinity.
pub fn apply_default_focus(settings: &mut CaptureSettings, characteristics: &DeviceCharacteristics, mode: Mode) {
    let mut candidates = Vec::with_capacity(4);
    if mode == Mode::Video {
        candidates.push(AfMode::ContinuousVideo);
    }
    candidates.extend([AfMode::ContinuousPicture, AfMode::Auto]);

    match candidates.into_iter().find(|m| characteristics.af_modes.contains(m)) {
        Some(af_mode) => {
            settings.af_mode = af_mode;
            settings.focus_distance = None;
        }
        None => {
            settings.af_mode = AfMode::Off;
            settings.focus_distance = Some(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_ipc::Size;

    #[test]
    fn test_set_returns_previous_value() {
        let mut parameters = Parameters::default();
        let old = parameters.set(ParameterValue::Zoom(0.5));
        assert_eq!(old, ParameterValue::Zoom(0.0));
        assert_eq!(parameters.zoom, 0.5);
    }

    #[test]
    fn test_zoom_crop_is_centered() {
        let characteristics = DeviceCharacteristics {
            active_array: Size::new(4000, 3000),
            max_digital_zoom: 4.0,
            ..Default::default()
        };
        assert_eq!(zoom_crop(&characteristics, 0.0), Rect::new(0, 0, 4000, 3000));
        assert_eq!(zoom_crop(&characteristics, 1.0), Rect::new(1500, 1125, 2500, 1875));
    }

    #[test]
    fn test_zoom_out_of_range_rejected() {
        let characteristics = DeviceCharacteristics::default();
        let mut settings = CaptureSettings::default();
        assert!(!apply(&mut settings, &characteristics, &ParameterValue::Zoom(1.5)));
        assert!(settings.crop_region.is_none());
    }

    #[test]
    fn test_exposure_steps() {
        let characteristics = DeviceCharacteristics {
            exposure_compensation_range: (-6, 6),
            exposure_compensation_step: 0.5,
            ..Default::default()
        };
        let mut settings = CaptureSettings::default();
        assert!(apply(&mut settings, &characteristics, &ParameterValue::ExposureCorrection(1.4)));
        assert_eq!(settings.exposure_compensation, 3);

        assert!(!apply(&mut settings, &characteristics, &ParameterValue::ExposureCorrection(3.5)));
        assert_eq!(settings.exposure_compensation, 3);
    }

    #[test]
    fn test_flash_falls_back_to_supported_ae_mode() {
        let characteristics = DeviceCharacteristics {
            ae_modes: vec![AeMode::Off],
            ..Default::default()
        };
        let mut settings = CaptureSettings::default();
        assert!(apply(&mut settings, &characteristics, &ParameterValue::Flash(Flash::Torch)));
        assert_eq!(settings.ae_mode, AeMode::Off);
        assert_eq!(settings.flash_mode, FlashMode::Torch);

        assert!(!apply(&mut settings, &characteristics, &ParameterValue::Flash(Flash::Auto)));
    }

    #[test]
    fn test_flash_unavailable() {
        let characteristics = DeviceCharacteristics {
            flash_available: false,
            ..Default::default()
        };
        let mut settings = CaptureSettings::default();
        assert!(!apply(&mut settings, &characteristics, &ParameterValue::Flash(Flash::On)));
        assert!(apply(&mut settings, &characteristics, &ParameterValue::Flash(Flash::Off)));
    }

    #[test]
    fn test_apply_all_falls_back_to_defaults() {
        let characteristics = DeviceCharacteristics {
            scene_modes: vec![SceneMode::Disabled],
            ..Default::default()
        };
        let parameters = Parameters {
            hdr: Hdr::On,
            white_balance: WhiteBalance::Daylight,
            ..Default::default()
        };
        let mut settings = CaptureSettings::default();
        let effective = apply_all(&mut settings, &characteristics, &parameters);
        assert_eq!(effective.hdr, Hdr::Off);
        assert_eq!(effective.white_balance, WhiteBalance::Daylight);
        assert_eq!(settings.scene_mode, SceneMode::Disabled);
        assert_eq!(settings.awb_mode, AwbMode::Daylight);
    }

    #[test]
    fn test_default_focus_preference() {
        let mut settings = CaptureSettings::default();
        let characteristics = DeviceCharacteristics::default();
        apply_default_focus(&mut settings, &characteristics, Mode::Video);
        assert_eq!(settings.af_mode, AfMode::ContinuousVideo);
        apply_default_focus(&mut settings, &characteristics, Mode::Picture);
        assert_eq!(settings.af_mode, AfMode::ContinuousPicture);

        let fixed = DeviceCharacteristics {
            af_modes: vec![AfMode::Off],
            ..Default::default()
        };
        apply_default_focus(&mut settings, &fixed, Mode::Picture);
        assert_eq!(settings.af_mode, AfMode::Off);
        assert_eq!(settings.focus_distance, Some(0.0));
    }
}
