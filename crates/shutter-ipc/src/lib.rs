//! Typed engine events, states and configuration for shutter.
//!
//! This crate defines the message types exchanged between the capture
//! engine, the encoder pipeline and whoever listens to them.

mod config;
mod events;
mod state;
mod types;

pub use config::{EngineConfig, MeteringConfig, TemplateRestorePolicy, VideoRequest};
pub use events::{EngineEvent, PictureOutcome, VideoOutcome};
pub use state::{Stage, StageState, StageStates, StopReason};
pub use types::{
    DeviceOptions, Flash, Hdr, Location, MeteringTrigger, Mode, ParameterKind, ParameterValue, PointF, Rect, Size,
    WhiteBalance,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (Engine → listener).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
