//! Common types used across engine messages.

use serde::{Deserialize, Serialize};

/// A point in normalized view coordinates (0.0 - 1.0 on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    /// Create a new point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// The center of the frame.
    pub fn center() -> Self {
        Self::new(0.5, 0.5)
    }
}

/// A size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Create a new size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Swap width and height.
    pub fn flip(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Number of pixels.
    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A rectangle in sensor pixel coordinates, right/bottom exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// A rectangle covering `size`, anchored at the origin.
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Clip this rectangle to `bounds`.
    pub fn clamp_to(&self, bounds: &Rect) -> Self {
        Self::new(
            self.left.clamp(bounds.left, bounds.right),
            self.top.clamp(bounds.top, bounds.bottom),
            self.right.clamp(bounds.left, bounds.right),
            self.bottom.clamp(bounds.top, bounds.bottom),
        )
    }
}

/// Whether the engine is configured for stills or recordings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Picture,
    Video,
}

/// Flash behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flash {
    #[default]
    Off,
    On,
    Auto,
    Torch,
}

/// White balance preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhiteBalance {
    #[default]
    Auto,
    Incandescent,
    Fluorescent,
    Daylight,
    Cloudy,
}

/// High dynamic range scene mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hdr {
    #[default]
    Off,
    On,
}

/// A GPS location attached to still captures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Who asked for a metering operation.
///
/// Listeners render different feedback depending on the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeteringTrigger {
    /// A tap or other gesture on the preview.
    Gesture,

    /// A programmatic request.
    Api,
}

/// The parameters that can be changed on a live stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    Flash,
    WhiteBalance,
    Hdr,
    Zoom,
    ExposureCorrection,
    Location,
}

/// A parameter value as reported to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Flash(Flash),
    WhiteBalance(WhiteBalance),
    Hdr(Hdr),
    Zoom(f32),
    ExposureCorrection(f32),
    Location(Option<Location>),
}

impl ParameterValue {
    /// The kind of parameter this value belongs to.
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Flash(_) => ParameterKind::Flash,
            Self::WhiteBalance(_) => ParameterKind::WhiteBalance,
            Self::Hdr(_) => ParameterKind::Hdr,
            Self::Zoom(_) => ParameterKind::Zoom,
            Self::ExposureCorrection(_) => ParameterKind::ExposureCorrection,
            Self::Location(_) => ParameterKind::Location,
        }
    }

    /// False for NaN or infinite zoom and exposure values.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Zoom(v) | Self::ExposureCorrection(v) => v.is_finite(),
            _ => true,
        }
    }

    /// Bitwise equality, so a stored NaN still matches itself.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Zoom(a), Self::Zoom(b))
            | (Self::ExposureCorrection(a), Self::ExposureCorrection(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// What an opened device supports, as reported to listeners.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceOptions {
    pub flash: Vec<Flash>,
    pub white_balance: Vec<WhiteBalance>,
    pub hdr: Vec<Hdr>,
    pub zoom_supported: bool,
    pub exposure_correction_supported: bool,

    /// Minimum and maximum exposure correction in EV.
    pub exposure_correction_range: (f32, f32),

    /// Whether 3A metering can be triggered.
    pub metering_supported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_clamp() {
        let bounds = Rect::new(0, 0, 100, 50);
        let clamped = Rect::new(-10, 40, 20, 80).clamp_to(&bounds);
        assert_eq!(clamped, Rect::new(0, 40, 20, 50));
        assert_eq!(clamped.width(), 20);
        assert_eq!(clamped.height(), 10);
    }

    #[test]
    fn test_parameter_kind() {
        assert_eq!(ParameterValue::Zoom(0.5).kind(), ParameterKind::Zoom);
        assert_eq!(
            ParameterValue::Flash(Flash::Torch).kind(),
            ParameterKind::Flash
        );
    }

    #[test]
    fn test_parameter_value_finite_and_same_as() {
        assert!(ParameterValue::Zoom(0.5).is_finite());
        assert!(!ParameterValue::Zoom(f32::NAN).is_finite());
        assert!(!ParameterValue::ExposureCorrection(f32::INFINITY).is_finite());
        assert!(ParameterValue::Hdr(Hdr::On).is_finite());

        let nan = ParameterValue::ExposureCorrection(f32::NAN);
        assert!(nan.same_as(&nan.clone()));
        assert!(!nan.same_as(&ParameterValue::ExposureCorrection(0.0)));
        assert!(!ParameterValue::Zoom(0.5).same_as(&ParameterValue::ExposureCorrection(0.5)));
    }
}
