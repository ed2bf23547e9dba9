//! Per-track encoding and multiplexing into one output container.
//!
//! Each track runs its encoder on its own thread. The tracks agree through a
//! [`MultiplexController`] on when the shared container opens, when the
//! recording stops and when the container is finalized.

mod controller;
mod engine;
mod error;
mod sink;

pub use controller::{MultiplexController, StopAll, StopListener, StopPlan};
pub use engine::EncoderEngine;
pub use error::EncoderError;
pub use sink::{ContainerSink, FileSink, MemoryContainer, MemorySink};

use bytes::Bytes;

/// Channel capacity for raw samples waiting to be encoded, per track.
pub const SAMPLE_CHANNEL_CAPACITY: usize = 8;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Kind of media a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Format of an encoded track, as registered with the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    pub kind: TrackKind,

    /// MIME type of the encoded stream.
    pub mime: String,

    /// Configured bitrate in bits per second.
    pub bitrate_bps: u64,
}

impl TrackFormat {
    pub fn video(bitrate_bps: u64) -> Self {
        Self {
            kind: TrackKind::Video,
            mime: "video/avc".to_string(),
            bitrate_bps,
        }
    }

    pub fn audio(bitrate_bps: u64) -> Self {
        Self {
            kind: TrackKind::Audio,
            mime: "audio/mp4a-latm".to_string(),
            bitrate_bps,
        }
    }
}

/// An encoded sample ready to be written to the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSample {
    pub data: Bytes,

    /// Presentation timestamp in microseconds.
    pub pts_us: u64,

    /// Whether this is a sync sample.
    pub is_keyframe: bool,
}

/// Trait for track encoders.
pub trait TrackEncoder: Send {
    /// Encode one raw sample. May buffer and return nothing.
    fn encode(&mut self, data: &[u8], pts_us: u64) -> EncoderResult<Option<EncodedSample>>;

    /// Drain anything still buffered.
    fn flush(&mut self) -> EncoderResult<Vec<EncodedSample>>;

    /// Format of the encoded output.
    fn format(&self) -> &TrackFormat;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Forwards raw samples unchanged, marking a keyframe every
/// `keyframe_interval` samples.
pub struct PassthroughEncoder {
    format: TrackFormat,
    keyframe_interval: u64,
    sample_count: u64,
}

impl PassthroughEncoder {
    pub fn new(format: TrackFormat, keyframe_interval: u64) -> Self {
        Self {
            format,
            keyframe_interval: keyframe_interval.max(1),
            sample_count: 0,
        }
    }
}

impl TrackEncoder for PassthroughEncoder {
    fn encode(&mut self, data: &[u8], pts_us: u64) -> EncoderResult<Option<EncodedSample>> {
        if data.is_empty() {
            return Err(EncoderError::Encoding("empty sample".into()));
        }
        let is_keyframe = self.sample_count % self.keyframe_interval == 0;
        self.sample_count += 1;
        Ok(Some(EncodedSample {
            data: Bytes::copy_from_slice(data),
            pts_us,
            is_keyframe,
        }))
    }

    fn flush(&mut self) -> EncoderResult<Vec<EncodedSample>> {
        Ok(Vec::new())
    }

    fn format(&self) -> &TrackFormat {
        &self.format
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}
