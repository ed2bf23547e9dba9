//! Frame-processing frames.

use std::time::Instant;

use bytes::Bytes;
use shutter_ipc::Size;

/// Timestamp for a processed frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the frame was captured.
    pub capture_time: Instant,

    /// Presentation timestamp in microseconds since the stream started.
    pub pts_us: u64,
}

impl CaptureTimestamp {
    /// Create a timestamp relative to `start_time`.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let pts_us = capture_time.duration_since(start_time).as_micros() as u64;

        Self {
            capture_time,
            pts_us,
        }
    }

    /// Get the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts_us / 1_000
    }
}

/// A frame delivered to frame processors.
#[derive(Debug, Clone)]
pub struct Frame {
    /// NV21 pixel data.
    pub data: Bytes,

    /// Frame size in pixels.
    pub size: Size,

    /// Rotation to apply for upright output, in degrees.
    pub rotation: u32,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl Frame {
    /// Calculate expected NV21 buffer size for a given size.
    pub fn nv21_buffer_size(size: Size) -> usize {
        // Y plane (width * height) + interleaved VU plane (width * height / 2)
        let y_size = size.area() as usize;
        y_size + y_size / 2
    }

    /// Validate that the frame data matches its size.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::nv21_buffer_size(self.size)
    }
}

/// Receives frames from the frame-processing output. Implemented by the
/// engine and handed to the backend.
pub trait FrameListener: Send + Sync {
    fn on_frame(&self, frame: Frame);
}

/// Consumes frames that made it through while the preview is running.
pub trait FrameProcessor: Send + Sync {
    fn process(&self, frame: &Frame);
}
