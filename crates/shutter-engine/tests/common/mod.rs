#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use shutter_capture::{DeviceCharacteristics, Frame, FrameProcessor, PreviewSurface};
use shutter_engine::sim::{SimController, SimulatedDevice, StaticPreview};
use shutter_engine::{create_engine, Engine, MuxingRecorder, Surfaces};
use shutter_ipc::{EngineConfig, EngineEvent, Size, Stage, StageState};

pub struct Harness {
    pub engine: Engine,
    pub events: Receiver<EngineEvent>,
    pub sim: SimController,
    pub preview: Arc<StaticPreview>,
}

pub fn harness(config: EngineConfig) -> Harness {
    harness_with(config, DeviceCharacteristics::default(), None)
}

pub fn harness_with(
    config: EngineConfig,
    characteristics: DeviceCharacteristics,
    processor: Option<Arc<dyn FrameProcessor>>,
) -> Harness {
    let (device, sim) = SimulatedDevice::new(characteristics);
    let preview = Arc::new(StaticPreview::new(Size::new(1920, 1080)));
    let output: Arc<dyn PreviewSurface> = Arc::clone(&preview) as Arc<dyn PreviewSurface>;
    let mut surfaces = Surfaces::new(output).with_recorder(Box::new(MuxingRecorder::new()));
    if let Some(processor) = processor {
        surfaces = surfaces.with_frame_processor(processor);
    }
    let (engine, events) = create_engine(config, Box::new(device), surfaces).unwrap();
    Harness {
        engine,
        events,
        sim,
        preview,
    }
}

/// Every event received so far.
pub fn drain(events: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    events.try_iter().collect()
}

/// Stage changes among `events`.
pub fn stage_changes(events: &[EngineEvent]) -> Vec<(Stage, StageState)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StageChanged { stage, current, .. } => Some((*stage, *current)),
            _ => None,
        })
        .collect()
}

/// Receive events until one matches, keeping the ones seen on the way.
pub fn wait_for(
    events: &Receiver<EngineEvent>,
    mut matches: impl FnMut(&EngineEvent) -> bool,
) -> Vec<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = events
            .recv_timeout(remaining)
            .expect("expected event did not arrive");
        let done = matches(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[derive(Default)]
pub struct CountingProcessor {
    pub frames: AtomicUsize,
}

impl CountingProcessor {
    pub fn count(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl FrameProcessor for CountingProcessor {
    fn process(&self, _frame: &Frame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}
