//! Error types for the device boundary.

use thiserror::Error;

/// Raw error codes reported by a device backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    /// Disabled by policy.
    Disabled,

    /// Opened by another client.
    InUse,

    /// Too many devices open at once.
    MaxInUse,

    /// Fatal error in the device.
    Device,

    /// Fatal error in the device service; a reboot may be needed.
    Service,

    /// The device is no longer available.
    Disconnected,

    /// A code this crate does not know about.
    Other(i32),
}

/// Classified cause of an unrecoverable device failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorReason {
    FailedToConnect,
    Disconnected,
    Unknown,
}

impl DeviceErrorCode {
    /// Classify a raw code into a failure reason.
    pub fn reason(self) -> DeviceErrorReason {
        match self {
            Self::Disabled | Self::InUse | Self::MaxInUse | Self::Device | Self::Service => {
                DeviceErrorReason::FailedToConnect
            }
            Self::Disconnected => DeviceErrorReason::Disconnected,
            Self::Other(_) => DeviceErrorReason::Unknown,
        }
    }
}

/// Errors that can occur at the device boundary.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// The backend refused an operation.
    #[error("Device access error: {code:?}")]
    Access { code: DeviceErrorCode },

    /// The session rejected the configured outputs.
    #[error("Session configuration failed: {0}")]
    SessionConfiguration(String),

    /// A capture request failed.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// No device or session is open.
    #[error("Device not open")]
    NotOpen,
}

impl DeviceError {
    /// The classified reason, for access errors.
    pub fn reason(&self) -> Option<DeviceErrorReason> {
        match self {
            Self::Access { code } => Some(code.reason()),
            Self::NotOpen => Some(DeviceErrorReason::Disconnected),
            _ => None,
        }
    }
}

impl From<DeviceErrorCode> for DeviceError {
    fn from(code: DeviceErrorCode) -> Self {
        Self::Access { code }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classification() {
        assert_eq!(
            DeviceErrorCode::InUse.reason(),
            DeviceErrorReason::FailedToConnect
        );
        assert_eq!(
            DeviceErrorCode::Service.reason(),
            DeviceErrorReason::FailedToConnect
        );
        assert_eq!(
            DeviceErrorCode::Disconnected.reason(),
            DeviceErrorReason::Disconnected
        );
        assert_eq!(
            DeviceErrorCode::Other(42).reason(),
            DeviceErrorReason::Unknown
        );
    }

    #[test]
    fn test_capture_failure_has_no_reason() {
        assert!(DeviceError::CaptureFailed("x".into()).reason().is_none());
        assert_eq!(
            DeviceError::from(DeviceErrorCode::Disabled).reason(),
            Some(DeviceErrorReason::FailedToConnect)
        );
    }
}
