//! The live stream as actions see it, and the adapters that turn device
//! callbacks into worker jobs.

use std::sync::Arc;

use crossbeam_channel::Sender;
use shutter_action::{ActionHolder, MeteringListener};
use shutter_capture::{
    CaptureRequest, CaptureResult, DeviceBackend, DeviceCharacteristics, DeviceErrorCode,
    DeviceResult, DeviceStateCallback, Frame, FrameListener, RequestBuilder, StreamListener,
    Template,
};
use shutter_ipc::{EngineEvent, MeteringTrigger, PointF, StageStates};
use tracing::warn;

use crate::orchestrator::EngineCore;
use crate::worker::WorkerHandle;

/// Device access plus the repeating builder, owned by the engine core.
pub(crate) struct StreamHolder {
    pub backend: Box<dyn DeviceBackend>,
    pub characteristics: DeviceCharacteristics,
    pub builder: RequestBuilder,
    pub last_result: Option<CaptureResult>,

    /// Tag of the last repeating request that reached the device.
    pub last_submitted: Option<Template>,

    pub states: StageStates,
    pub listener: Arc<dyn StreamListener>,
}

impl StreamHolder {
    pub fn new(backend: Box<dyn DeviceBackend>, listener: Arc<dyn StreamListener>) -> Self {
        Self {
            backend,
            characteristics: DeviceCharacteristics::default(),
            builder: RequestBuilder::new(Template::Preview),
            last_result: None,
            last_submitted: None,
            states: StageStates::default(),
            listener,
        }
    }

    /// Replace the repeating request with the current builder.
    pub fn submit(&mut self) -> DeviceResult<()> {
        let request = self.builder.build();
        let tag = request.tag;
        self.backend
            .submit_repeating(request, Arc::clone(&self.listener))?;
        self.last_submitted = Some(tag);
        Ok(())
    }
}

impl ActionHolder for StreamHolder {
    fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    fn builder_mut(&mut self) -> &mut RequestBuilder {
        &mut self.builder
    }

    fn characteristics(&self) -> &DeviceCharacteristics {
        &self.characteristics
    }

    fn last_result(&self) -> Option<&CaptureResult> {
        self.last_result.as_ref()
    }

    fn apply_builder(&mut self) {
        if !self.states.preview.is_started() {
            return;
        }
        if let Err(e) = self.submit() {
            warn!(error = %e, "Failed to resubmit repeating request");
        }
    }

    fn capture_once(&mut self) {
        if !self.states.device.is_started() {
            return;
        }
        let request = self.builder.build();
        if let Err(e) = self.backend.capture(request, Arc::clone(&self.listener)) {
            warn!(error = %e, "Failed to submit one-shot request");
        }
    }

    fn is_alive(&self) -> bool {
        self.states.device.is_started()
    }
}

/// Device callbacks for one open attempt.
pub(crate) struct DeviceEvents {
    pub handle: WorkerHandle<EngineCore>,
    pub generation: u64,
}

impl DeviceStateCallback for DeviceEvents {
    fn on_opened(&self, characteristics: DeviceCharacteristics) {
        let generation = self.generation;
        self.handle
            .post(move |core| core.on_device_opened(generation, characteristics));
    }

    fn on_disconnected(&self) {
        let generation = self.generation;
        self.handle
            .post(move |core| core.on_device_lost(generation, DeviceErrorCode::Disconnected));
    }

    fn on_error(&self, code: DeviceErrorCode) {
        let generation = self.generation;
        self.handle
            .post(move |core| core.on_device_lost(generation, code));
    }
}

/// Stream callbacks for one bound session.
pub(crate) struct StreamEvents {
    pub handle: WorkerHandle<EngineCore>,
    pub generation: u64,
}

impl StreamListener for StreamEvents {
    fn on_capture_started(&self, request: &CaptureRequest, _frame_number: u64) {
        let generation = self.generation;
        let request = request.clone();
        self.handle
            .post(move |core| core.on_capture_started(generation, request));
    }

    fn on_capture_progressed(&self, request: &CaptureRequest, partial: &CaptureResult) {
        let generation = self.generation;
        let request = request.clone();
        let partial = partial.clone();
        self.handle
            .post(move |core| core.on_capture_progressed(generation, request, partial));
    }

    fn on_capture_completed(&self, request: &CaptureRequest, result: &CaptureResult) {
        let generation = self.generation;
        let request = request.clone();
        let result = result.clone();
        self.handle
            .post(move |core| core.on_capture_completed(generation, request, result));
    }
}

/// Frames from the frame-processing output of one bound session.
pub(crate) struct FrameEvents {
    pub handle: WorkerHandle<EngineCore>,
    pub generation: u64,
}

impl FrameListener for FrameEvents {
    fn on_frame(&self, frame: Frame) {
        let generation = self.generation;
        self.handle.post(move |core| core.on_frame(generation, frame));
    }
}

/// Forwards metering progress as focus events. Unpointed metering is silent.
pub(crate) struct MeteringEvents {
    pub event_tx: Sender<EngineEvent>,
}

impl MeteringEvents {
    fn send(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

impl MeteringListener for MeteringEvents {
    fn on_metering_started(&mut self, point: Option<PointF>, trigger: MeteringTrigger) {
        if let Some(point) = point {
            self.send(EngineEvent::FocusStart { trigger, point });
        }
    }

    fn on_metering_end(&mut self, point: Option<PointF>, trigger: MeteringTrigger, success: bool) {
        if let Some(point) = point {
            self.send(EngineEvent::FocusEnd {
                trigger,
                point,
                success,
            });
        }
    }
}
