//! Capture engine for shutter.
//!
//! This crate drives a device through its Device, Bind and Preview stages,
//! applies parameters to the live stream, runs metering actions on it and
//! routes stills and recordings to their outputs.

mod capture;
mod error;
mod holder;
mod orchestrator;
mod parameters;
pub mod sim;
mod state;
mod video;
mod worker;

pub use error::EngineError;
pub use orchestrator::{Engine, Surfaces};
pub use parameters::{zoom_crop, Parameters};
pub use state::{LifecycleOp, Transition};
pub use video::{MuxingRecorder, RecorderCallback, RecorderOutcome, VideoRecorder};
pub use worker::{Completer, Pending, Worker, WorkerHandle};

use crossbeam_channel::Receiver;
use shutter_capture::DeviceBackend;
use shutter_ipc::{EngineConfig, EngineEvent};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Create an engine together with the receiving end of its event channel.
pub fn create_engine(
    config: EngineConfig,
    backend: Box<dyn DeviceBackend>,
    surfaces: Surfaces,
) -> EngineResult<(Engine, Receiver<EngineEvent>)> {
    let (event_tx, event_rx) = shutter_ipc::event_channel();
    let engine = Engine::new(config, backend, surfaces, event_tx)?;
    Ok((engine, event_rx))
}
