//! Error types for the capture engine.

use shutter_capture::{DeviceError, DeviceErrorReason};
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The device failed in a way the engine cannot recover from.
    #[error("Device error ({reason:?}): {message}")]
    Device {
        reason: DeviceErrorReason,
        message: String,
    },

    /// The session rejected the configured outputs.
    #[error("Session configuration failed: {0}")]
    SessionConfiguration(String),

    /// The repeating request could not be submitted.
    #[error("Failed to start preview: {0}")]
    FailedToStartPreview(String),

    /// The operation needs a stage that is not running.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A still capture failed.
    #[error("Picture failed: {0}")]
    Picture(String),

    /// A recording failed.
    #[error("Video failed: {0}")]
    Video(String),

    /// The engine worker thread could not be spawned.
    #[error("Failed to spawn engine worker: {0}")]
    Spawn(String),

    /// The engine worker is gone.
    #[error("Engine worker is gone")]
    WorkerGone,

    /// Waiting for a result timed out.
    #[error("Timed out waiting for the engine")]
    Timeout,
}

impl EngineError {
    /// Whether this failure forces a full teardown.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Device { .. } | Self::SessionConfiguration(_))
    }
}

impl From<DeviceError> for EngineError {
    fn from(error: DeviceError) -> Self {
        match error {
            DeviceError::SessionConfiguration(message) => Self::SessionConfiguration(message),
            DeviceError::CaptureFailed(message) => Self::Picture(message),
            other => Self::Device {
                reason: other.reason().unwrap_or(DeviceErrorReason::Unknown),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_capture::DeviceErrorCode;

    #[test]
    fn test_device_errors_are_unrecoverable() {
        let error = EngineError::from(DeviceError::from(DeviceErrorCode::InUse));
        assert!(error.is_unrecoverable());
        assert!(matches!(
            error,
            EngineError::Device {
                reason: DeviceErrorReason::FailedToConnect,
                ..
            }
        ));
    }

    #[test]
    fn test_capture_failure_is_recoverable() {
        let error = EngineError::from(DeviceError::CaptureFailed("busy".into()));
        assert!(!error.is_unrecoverable());
        assert!(!EngineError::InvalidState("x".into()).is_unrecoverable());
        assert!(EngineError::SessionConfiguration("x".into()).is_unrecoverable());
    }
}
