//! Device, session and capture-request model for shutter.
//!
//! This crate describes the hardware boundary the capture engine drives:
//! a device backend that opens devices, configures sessions over a set of
//! output surfaces and runs repeating or one-shot capture requests.

mod device;
mod error;
mod frame;
mod request;
mod surface;

pub use device::{
    DeviceBackend, DeviceCharacteristics, DeviceStateCallback, SessionCallback, SessionConfig,
    StillCallback, StreamListener,
};
pub use error::{DeviceError, DeviceErrorCode, DeviceErrorReason};
pub use frame::{CaptureTimestamp, Frame, FrameListener, FrameProcessor};
pub use request::{
    AeMode, AeState, AfMode, AfState, AwbMode, AwbState, CaptureRequest, CaptureResult,
    CaptureSettings, ControlMode, FlashMode, MeteringRegion, RequestBuilder, SceneMode, Template,
    Trigger,
};
pub use surface::{PreviewSurface, SurfaceAllocator, SurfaceHandle};

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;
