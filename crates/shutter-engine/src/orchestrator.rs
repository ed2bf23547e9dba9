//! Main engine orchestrator.
//!
//! [`Engine`] is a thin handle; the state lives in an [`EngineCore`] owned
//! by a single worker thread. Lifecycle operations are queued and run one at
//! a time as a plan of stage transitions. Transitions that wait on the device
//! park the plan until their callback is posted back onto the worker.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use shutter_action::{ActionId, ActionRegistry};
use shutter_capture::{
    DeviceBackend, DeviceCharacteristics, DeviceError, DeviceErrorCode, DeviceResult,
    FrameListener, FrameProcessor, PreviewSurface, RequestBuilder, SessionConfig,
    SurfaceAllocator, SurfaceHandle, Template,
};
use shutter_ipc::{
    EngineConfig, EngineEvent, Flash, Hdr, Location, MeteringTrigger, Mode, ParameterKind,
    ParameterValue, PointF, Size, Stage, StageState, StageStates, VideoRequest, WhiteBalance,
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::EngineError;
use crate::holder::{DeviceEvents, FrameEvents, StreamEvents, StreamHolder};
use crate::parameters::{self, Parameters};
use crate::state::{self, LifecycleOp, Transition};
use crate::video::VideoRecorder;
use crate::worker::{Completer, Pending, Worker, WorkerHandle};
use crate::EngineResult;

/// Outputs and consumers the engine renders into.
pub struct Surfaces {
    pub preview: Arc<dyn PreviewSurface>,
    pub recorder: Option<Box<dyn VideoRecorder>>,
    pub frame_processor: Option<Arc<dyn FrameProcessor>>,
}

impl Surfaces {
    pub fn new(preview: Arc<dyn PreviewSurface>) -> Self {
        Self {
            preview,
            recorder: None,
            frame_processor: None,
        }
    }

    pub fn with_recorder(mut self, recorder: Box<dyn VideoRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_frame_processor(mut self, processor: Arc<dyn FrameProcessor>) -> Self {
        self.frame_processor = Some(processor);
        self
    }
}

/// The capture engine.
///
/// Every operation returns immediately with a [`Pending`] handle; the work
/// happens on the engine worker in call order.
pub struct Engine {
    worker: Worker<EngineCore>,
    states: Arc<RwLock<StageStates>>,
    parameters: Arc<RwLock<Parameters>>,
}

impl Engine {
    /// Create an engine. Nothing is opened until [`Engine::start`].
    pub fn new(
        config: EngineConfig,
        backend: Box<dyn DeviceBackend>,
        surfaces: Surfaces,
        event_tx: Sender<EngineEvent>,
    ) -> EngineResult<Self> {
        let states = Arc::new(RwLock::new(StageStates::default()));
        let parameters = Arc::new(RwLock::new(Parameters::default()));

        let shared = (Arc::clone(&states), Arc::clone(&parameters));
        let worker = Worker::spawn("shutter-engine", move |handle| {
            EngineCore::new(config, handle, backend, surfaces, event_tx, shared.0, shared.1)
        })
        .map_err(|e| EngineError::Spawn(e.to_string()))?;

        Ok(Self {
            worker,
            states,
            parameters,
        })
    }

    fn handle(&self) -> &WorkerHandle<EngineCore> {
        self.worker.handle()
    }

    fn lifecycle(&self, op: LifecycleOp) -> Pending<()> {
        let (completer, pending) = Pending::channel();
        self.handle().post(move |core| core.enqueue(op, completer));
        pending
    }

    /// Bring up Device, Bind and Preview, in that order.
    #[instrument(name = "engine_start", skip(self))]
    pub fn start(&self) -> Pending<()> {
        self.lifecycle(LifecycleOp::Start)
    }

    /// Tear down Preview, Bind and Device, in that order.
    pub fn stop(&self) -> Pending<()> {
        self.lifecycle(LifecycleOp::Stop)
    }

    /// Rebuild the session and preview without closing the device.
    pub fn restart_bind(&self) -> Pending<()> {
        self.lifecycle(LifecycleOp::RestartBind)
    }

    pub fn restart_preview(&self) -> Pending<()> {
        self.lifecycle(LifecycleOp::RestartPreview)
    }

    /// Block until the worker has nothing left to do.
    pub fn sync(&self) -> EngineResult<()> {
        self.handle().settle().wait()
    }

    pub fn stage_states(&self) -> StageStates {
        *self.states.read()
    }

    pub fn parameters(&self) -> Parameters {
        self.parameters.read().clone()
    }

    /// Store the value right away, then apply it on the worker. Resolves to
    /// false, with the old value restored, if the device rejects it.
    fn set_parameter(&self, value: ParameterValue) -> Pending<bool> {
        if !value.is_finite() {
            warn!(value = ?value, "Rejecting non-finite parameter");
            return Pending::resolved(Ok(false));
        }
        let old = self.parameters.write().set(value.clone());
        self.handle()
            .call(move |core| Ok(core.apply_parameter(old, value)))
    }

    pub fn set_flash(&self, flash: Flash) -> Pending<bool> {
        self.set_parameter(ParameterValue::Flash(flash))
    }

    pub fn set_white_balance(&self, white_balance: WhiteBalance) -> Pending<bool> {
        self.set_parameter(ParameterValue::WhiteBalance(white_balance))
    }

    pub fn set_hdr(&self, hdr: Hdr) -> Pending<bool> {
        self.set_parameter(ParameterValue::Hdr(hdr))
    }

    /// `zoom` in `[0, 1]`.
    pub fn set_zoom(&self, zoom: f32) -> Pending<bool> {
        self.set_parameter(ParameterValue::Zoom(zoom))
    }

    /// `ev` in exposure values.
    pub fn set_exposure_correction(&self, ev: f32) -> Pending<bool> {
        self.set_parameter(ParameterValue::ExposureCorrection(ev))
    }

    pub fn set_location(&self, location: Option<Location>) -> Pending<bool> {
        self.set_parameter(ParameterValue::Location(location))
    }

    /// Meter focus, exposure and white balance around `point`, or the whole
    /// frame if `None`. Replaces any metering in progress.
    pub fn start_metering(&self, point: Option<PointF>, trigger: MeteringTrigger) -> Pending<()> {
        self.handle()
            .call(move |core| core.start_metering(point, trigger))
    }

    /// Abort metering in progress and restore the stream.
    pub fn reset_metering(&self) -> Pending<()> {
        self.handle().call(|core| core.reset_metering())
    }

    /// Capture a still. Resolves once the capture was issued; the image
    /// arrives as [`EngineEvent::PictureResult`].
    pub fn take_picture(&self) -> Pending<()> {
        self.handle().call(|core| core.take_picture())
    }

    /// Rebind with a recorder output and start recording. Resolves once the
    /// recording request is running.
    pub fn take_video(&self, request: VideoRequest) -> Pending<()> {
        let (completer, pending) = Pending::channel();
        self.handle()
            .post(move |core| core.take_video(request, completer));
        pending
    }

    /// Stop the current recording, if any. The result arrives as
    /// [`EngineEvent::VideoResult`].
    pub fn stop_video(&self) -> Pending<()> {
        self.handle().call(|core| core.stop_video())
    }

    /// Toggle the frame-processing output. Rebinds a running session.
    pub fn set_has_frame_processors(&self, enabled: bool) -> Pending<()> {
        let (completer, pending) = Pending::channel();
        self.handle()
            .post(move |core| core.set_has_frame_processors(enabled, completer));
        pending
    }

    pub fn set_frame_processor(&self, processor: Option<Arc<dyn FrameProcessor>>) -> Pending<()> {
        self.handle().call(move |core| {
            core.frame_processor = processor;
            Ok(())
        })
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.handle().post(|core| core.shutdown());
    }
}

/// What the Bind stage allocated.
#[derive(Debug, Default)]
pub(crate) struct Bound {
    pub preview_size: Option<Size>,
    pub picture: Option<(SurfaceHandle, Size)>,
    pub recorder: Option<SurfaceHandle>,
    pub processing: Option<(SurfaceHandle, Size)>,
}

/// A lifecycle operation being worked through.
struct PlanRun {
    op: LifecycleOp,
    steps: VecDeque<Transition>,

    /// The step waiting on a device callback.
    awaiting: Option<Transition>,

    completer: Completer<()>,
    error: Option<EngineError>,
}

enum Step {
    Done(EngineResult<()>),
    Waiting,
}

/// An active recording.
#[derive(Debug, Default)]
pub(crate) struct Recording {
    /// The recorder was started by the first recorded frame.
    pub started: bool,

    /// A stop was requested; the result is on its way.
    pub ending: bool,
}

/// Engine state, owned by the worker thread.
pub struct EngineCore {
    pub(crate) config: EngineConfig,
    pub(crate) handle: WorkerHandle<EngineCore>,
    pub(crate) event_tx: Sender<EngineEvent>,
    shared_states: Arc<RwLock<StageStates>>,
    pub(crate) shared_parameters: Arc<RwLock<Parameters>>,

    pub(crate) stream: StreamHolder,
    pub(crate) actions: ActionRegistry,
    pub(crate) metering: Option<ActionId>,

    pub(crate) preview: Arc<dyn PreviewSurface>,
    pub(crate) recorder: Option<Box<dyn VideoRecorder>>,
    pub(crate) frame_processor: Option<Arc<dyn FrameProcessor>>,
    allocator: SurfaceAllocator,
    pub(crate) bound: Bound,

    /// Bumped whenever device callbacks must be ignored from then on.
    device_generation: u64,

    /// Bumped whenever stream and frame callbacks must be ignored.
    pub(crate) session_generation: u64,

    queue: VecDeque<(LifecycleOp, Completer<()>)>,
    run: Option<PlanRun>,

    /// Recording waiting for the next Bind and Preview.
    pub(crate) pending_video: Option<(VideoRequest, Completer<()>)>,
    pub(crate) recording: Option<Recording>,
    pub(crate) picture_in_flight: bool,
}

impl EngineCore {
    fn new(
        config: EngineConfig,
        handle: WorkerHandle<EngineCore>,
        backend: Box<dyn DeviceBackend>,
        surfaces: Surfaces,
        event_tx: Sender<EngineEvent>,
        shared_states: Arc<RwLock<StageStates>>,
        shared_parameters: Arc<RwLock<Parameters>>,
    ) -> Self {
        let listener = Arc::new(StreamEvents {
            handle: handle.clone(),
            generation: 0,
        });
        Self {
            config,
            handle,
            event_tx,
            shared_states,
            shared_parameters,
            stream: StreamHolder::new(backend, listener),
            actions: ActionRegistry::new(),
            metering: None,
            preview: surfaces.preview,
            recorder: surfaces.recorder,
            frame_processor: surfaces.frame_processor,
            allocator: SurfaceAllocator::default(),
            bound: Bound::default(),
            device_generation: 0,
            session_generation: 0,
            queue: VecDeque::new(),
            run: None,
            pending_video: None,
            recording: None,
            picture_in_flight: false,
        }
    }

    pub(crate) fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }

    fn set_stage(&mut self, stage: Stage, state: StageState) {
        let previous = self.stream.states.get(stage);
        if previous == state {
            return;
        }
        self.stream.states.set(stage, state);
        *self.shared_states.write() = self.stream.states;

        debug!(
            stage = stage.name(),
            previous = ?previous,
            current = ?state,
            "Stage transition"
        );
        self.send_event(EngineEvent::StageChanged {
            stage,
            previous,
            current: state,
        });
    }

    /// Queue a lifecycle operation behind the ones already queued.
    pub(crate) fn enqueue(&mut self, op: LifecycleOp, completer: Completer<()>) {
        debug!(op = op.name(), queued = self.queue.len(), "Lifecycle operation queued");
        self.queue.push_back((op, completer));
        if self.run.is_none() {
            self.advance();
        }
    }

    /// Queue a full teardown nobody waits on.
    pub(crate) fn teardown_detached(&mut self) {
        let (completer, _pending) = Pending::channel();
        self.enqueue(LifecycleOp::Stop, completer);
    }

    /// Run steps until one has to wait on the device or the queue is empty.
    fn advance(&mut self) {
        loop {
            if self.run.is_none() {
                let Some((op, completer)) = self.queue.pop_front() else {
                    return;
                };
                self.begin_plan(op, completer);
            }
            let Some(run) = self.run.as_mut() else {
                return;
            };
            if run.awaiting.is_some() {
                return;
            }
            let Some(step) = run.steps.pop_front() else {
                self.finish_plan();
                continue;
            };
            run.awaiting = Some(step);
            match self.execute(step) {
                Step::Waiting => return,
                Step::Done(result) => self.step_finished(result),
            }
        }
    }

    #[instrument(name = "run_plan", skip(self, completer))]
    fn begin_plan(&mut self, op: LifecycleOp, completer: Completer<()>) {
        let steps = state::plan(op, &self.stream.states);
        debug!(steps = ?steps, "Lifecycle plan");
        self.run = Some(PlanRun {
            op,
            steps: steps.into(),
            awaiting: None,
            completer,
            error: None,
        });
    }

    fn finish_plan(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };
        match run.error {
            Some(e) => {
                warn!(op = run.op.name(), error = %e, "Lifecycle operation failed");
                run.completer.complete(Err(e));
            }
            None => {
                info!(op = run.op.name(), states = ?self.stream.states, "Lifecycle operation done");
                run.completer.complete(Ok(()));
            }
        }
    }

    fn execute(&mut self, step: Transition) -> Step {
        match step {
            Transition::Start(stage) => {
                if self.stream.states.get(stage).is_started() {
                    return Step::Done(Ok(()));
                }
                if !self.stream.states.can_start(stage) {
                    return Step::Done(Err(EngineError::InvalidState(format!(
                        "{} needs the stages below it",
                        stage.name()
                    ))));
                }
                self.set_stage(stage, StageState::Starting);
                match stage {
                    Stage::Device => self.start_device(),
                    Stage::Bind => self.start_bind(),
                    Stage::Preview => Step::Done(self.start_preview()),
                }
            }
            Transition::Stop(stage) => {
                if self.stream.states.get(stage).is_off() {
                    return Step::Done(Ok(()));
                }
                if !self.stream.states.can_stop(stage) {
                    return Step::Done(Err(EngineError::InvalidState(format!(
                        "{} is still needed by the stages above it",
                        stage.name()
                    ))));
                }
                self.set_stage(stage, StageState::Stopping);
                Step::Done(self.release(stage))
            }
        }
    }

    /// A device callback resolved `step`.
    fn complete_step(&mut self, step: Transition, result: EngineResult<()>) {
        let awaiting = self.run.as_ref().and_then(|run| run.awaiting);
        if awaiting != Some(step) {
            debug!(step = ?step, "Ignoring completion of a step that is not running");
            return;
        }
        self.step_finished(result);
        self.advance();
    }

    fn step_finished(&mut self, result: EngineResult<()>) {
        let Some(step) = self.run.as_mut().and_then(|run| run.awaiting.take()) else {
            return;
        };
        match (step, result) {
            (Transition::Start(stage), Ok(())) => {
                self.set_stage(stage, StageState::Started);
                if stage == Stage::Preview {
                    self.on_preview_started();
                }
            }
            (Transition::Start(stage), Err(e)) => {
                error!(stage = stage.name(), error = %e, "Stage failed to start");
                if let Err(cleanup) = self.release(stage) {
                    debug!(error = %cleanup, "Cleanup after failed start");
                }
                self.set_stage(stage, StageState::Off);
                if let Some((_, completer)) = self.pending_video.take() {
                    completer.complete(Err(e.clone()));
                }

                let teardown = state::teardown(&self.stream.states);
                if let Some(run) = self.run.as_mut() {
                    run.error.get_or_insert(e);
                    run.steps = teardown.into();
                }
            }
            (Transition::Stop(stage), result) => {
                if let Err(e) = result {
                    warn!(stage = stage.name(), error = %e, "Stage failed to stop cleanly");
                    if let Some(run) = self.run.as_mut() {
                        run.error.get_or_insert(e);
                    }
                }
                self.set_stage(stage, StageState::Off);
                if stage == Stage::Device {
                    self.send_event(EngineEvent::DeviceClosed);
                }
            }
        }
    }

    fn start_device(&mut self) -> Step {
        self.device_generation += 1;
        let callback = Arc::new(DeviceEvents {
            handle: self.handle.clone(),
            generation: self.device_generation,
        });
        info!(device_id = %self.config.device_id, "Opening device");
        self.stream.backend.open(&self.config.device_id, callback);
        Step::Waiting
    }

    pub(crate) fn on_device_opened(&mut self, generation: u64, characteristics: DeviceCharacteristics) {
        if generation != self.device_generation || self.stream.states.device != StageState::Starting {
            debug!("Ignoring stale device open");
            return;
        }

        let mut builder = RequestBuilder::new(Template::Preview);
        parameters::apply_default_focus(builder.settings_mut(), &characteristics, self.config.mode);
        let requested = self.shared_parameters.read().clone();
        let effective = parameters::apply_all(builder.settings_mut(), &characteristics, &requested);
        for kind in ALL_PARAMETERS {
            let value = effective.value(kind);
            if value != requested.value(kind) {
                warn!(parameter = ?kind, fallback = ?value, "Unsupported parameter, using default");
                self.shared_parameters.write().set(value);
            }
        }

        let options = characteristics.options();
        self.stream.characteristics = characteristics;
        self.stream.builder = builder;
        info!("Device opened");
        self.send_event(EngineEvent::DeviceOpened { options });
        self.complete_step(Transition::Start(Stage::Device), Ok(()));
    }

    /// Disconnect or error from the device, before or after it opened.
    pub(crate) fn on_device_lost(&mut self, generation: u64, code: DeviceErrorCode) {
        if generation != self.device_generation {
            return;
        }
        let error = EngineError::from(DeviceError::from(code));
        match self.stream.states.device {
            StageState::Off => {}
            StageState::Starting => {
                self.complete_step(Transition::Start(Stage::Device), Err(error));
            }
            StageState::Started | StageState::Stopping => {
                error!(code = ?code, "Device lost");
                self.device_generation += 1;
                self.send_event(EngineEvent::Error {
                    recoverable: false,
                    message: error.to_string(),
                });
                if let Some(step) = self.run.as_ref().and_then(|run| run.awaiting) {
                    self.complete_step(step, Err(error));
                }
                self.teardown_detached();
            }
        }
    }

    fn start_bind(&mut self) -> Step {
        self.session_generation += 1;
        let generation = self.session_generation;
        self.stream.listener = Arc::new(StreamEvents {
            handle: self.handle.clone(),
            generation,
        });

        let characteristics = &self.stream.characteristics;
        let Some(preview_size) =
            choose_preview_size(&characteristics.preview_sizes, self.preview.output_size())
        else {
            return Step::Done(Err(EngineError::SessionConfiguration(
                "device reports no preview sizes".into(),
            )));
        };
        self.preview.set_stream_size(preview_size);

        let mut bound = Bound {
            preview_size: Some(preview_size),
            ..Default::default()
        };
        let mut surfaces = vec![self.preview.handle()];

        if self.config.mode == Mode::Picture {
            if let Some(size) = largest(&characteristics.picture_sizes) {
                let surface = self.allocator.allocate();
                surfaces.push(surface);
                bound.picture = Some((surface, size));
            }
        }

        let mut frame_listener = None;
        if self.config.has_frame_processors {
            match processing_size(
                &characteristics.processing_sizes,
                preview_size,
                self.config.frame_processing_max_side,
            ) {
                Some(size) => {
                    let surface = self.allocator.allocate();
                    surfaces.push(surface);
                    bound.processing = Some((surface, size));
                    let listener: Arc<dyn FrameListener> = Arc::new(FrameEvents {
                        handle: self.handle.clone(),
                        generation,
                    });
                    frame_listener = Some((surface, listener));
                }
                None => warn!("No frame processing size fits the preview"),
            }
        }

        if self.config.mode == Mode::Video && self.pending_video.is_some() {
            match self.prepare_recorder(preview_size) {
                Ok(surface) => {
                    surfaces.push(surface);
                    bound.recorder = Some(surface);
                }
                Err(e) => {
                    warn!(error = %e, "Recorder could not be prepared");
                    if let Some((_, completer)) = self.pending_video.take() {
                        completer.complete(Err(e));
                    }
                }
            }
        }

        debug!(
            surfaces = surfaces.len(),
            width = preview_size.width,
            height = preview_size.height,
            "Creating session"
        );
        self.bound = bound;
        let handle = self.handle.clone();
        self.stream.backend.create_session(
            SessionConfig {
                surfaces,
                frame_listener,
            },
            Box::new(move |result| {
                handle.post(move |core| core.on_session_configured(generation, result));
            }),
        );
        Step::Waiting
    }

    fn on_session_configured(&mut self, generation: u64, result: DeviceResult<()>) {
        if generation != self.session_generation {
            debug!("Ignoring stale session callback");
            return;
        }
        let result = result.map_err(|e| match e {
            DeviceError::CaptureFailed(message) => EngineError::SessionConfiguration(message),
            other => EngineError::from(other),
        });
        self.complete_step(Transition::Start(Stage::Bind), result);
    }

    fn start_preview(&mut self) -> EngineResult<()> {
        self.stream.builder.add_target(self.preview.handle());
        if let Some((surface, _)) = self.bound.processing {
            self.stream.builder.add_target(surface);
        }
        self.stream
            .submit()
            .map_err(|e| EngineError::FailedToStartPreview(e.to_string()))
    }

    fn on_preview_started(&mut self) {
        if let Some((request, completer)) = self.pending_video.take() {
            self.handle
                .post(move |core| core.do_take_video(request, completer));
        }
    }

    /// Undo what starting `stage` did, without touching its status.
    fn release(&mut self, stage: Stage) -> EngineResult<()> {
        match stage {
            Stage::Preview => {
                self.end_recording_for_teardown();
                self.actions.abort_all(&mut self.stream);
                self.metering = None;
                let result = self.stream.backend.stop_repeating().map_err(EngineError::from);
                if self.stream.builder.template() != Template::Preview {
                    self.stream.builder = with_template(&self.stream.builder, Template::Preview);
                }
                self.stream.builder.clear_targets();
                self.stream.last_submitted = None;
                result
            }
            Stage::Bind => {
                self.session_generation += 1;
                self.stream.backend.close_session();
                self.bound = Bound::default();
                Ok(())
            }
            Stage::Device => {
                self.device_generation += 1;
                self.stream.backend.close();
                self.stream.builder = RequestBuilder::new(Template::Preview);
                self.stream.last_result = None;
                if let Some((_, completer)) = self.pending_video.take() {
                    completer.complete(Err(EngineError::Video("device closed".into())));
                }
                Ok(())
            }
        }
    }

    pub(crate) fn set_has_frame_processors(&mut self, enabled: bool, completer: Completer<()>) {
        if self.config.has_frame_processors == enabled {
            completer.complete(Ok(()));
            return;
        }
        self.config.has_frame_processors = enabled;
        if self.stream.states.bind.is_started() {
            info!(enabled, "Frame processing toggled, rebinding");
            self.enqueue(LifecycleOp::RestartBind, completer);
        } else {
            completer.complete(Ok(()));
        }
    }

    /// Release everything without waiting on the device.
    pub(crate) fn shutdown(&mut self) {
        info!("Engine shutting down");
        self.run = None;
        self.queue.clear();
        for step in state::teardown(&self.stream.states) {
            if let Transition::Stop(stage) = step {
                if let Err(e) = self.release(stage) {
                    warn!(stage = stage.name(), error = %e, "Release failed during shutdown");
                }
                self.set_stage(stage, StageState::Off);
            }
        }
    }
}

const ALL_PARAMETERS: [ParameterKind; 6] = [
    ParameterKind::Flash,
    ParameterKind::WhiteBalance,
    ParameterKind::Hdr,
    ParameterKind::Zoom,
    ParameterKind::ExposureCorrection,
    ParameterKind::Location,
];

/// A builder for `template` carrying the settings of `builder`, no targets.
pub(crate) fn with_template(builder: &RequestBuilder, template: Template) -> RequestBuilder {
    let mut next = RequestBuilder::new(template);
    *next.settings_mut() = builder.settings().clone();
    next
}

fn largest(sizes: &[Size]) -> Option<Size> {
    sizes.iter().copied().max_by_key(|s| s.area())
}

/// Biggest size no larger than the view, else the smallest available.
fn choose_preview_size(sizes: &[Size], view: Size) -> Option<Size> {
    sizes
        .iter()
        .copied()
        .filter(|s| s.area() <= view.area())
        .max_by_key(|s| s.area())
        .or_else(|| sizes.iter().copied().min_by_key(|s| s.area()))
}

/// Biggest size with both sides within `max_side` and the preview.
fn processing_size(sizes: &[Size], preview: Size, max_side: u32) -> Option<Size> {
    let max_width = max_side.min(preview.width);
    let max_height = max_side.min(preview.height);
    sizes
        .iter()
        .copied()
        .filter(|s| s.width <= max_width && s.height <= max_height)
        .max_by_key(|s| s.area())
}
