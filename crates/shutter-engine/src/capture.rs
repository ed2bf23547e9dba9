//! Operations on the running stream: parameters, metering, stills,
//! recordings and frame processing.

use bytes::Bytes;
use shutter_action::{ActionHolder, Meter};
use shutter_capture::{CaptureRequest, CaptureResult, DeviceResult, Frame, SurfaceHandle, Template, Trigger};
use shutter_ipc::{
    EngineEvent, Location, MeteringTrigger, Mode, ParameterValue, PictureOutcome, PointF, Size,
    TemplateRestorePolicy, VideoOutcome, VideoRequest,
};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::EngineError;
use crate::holder::MeteringEvents;
use crate::orchestrator::{with_template, EngineCore, Recording};
use crate::parameters;
use crate::state::LifecycleOp;
use crate::video::{RecorderCallback, RecorderOutcome};
use crate::worker::{Completer, Pending};
use crate::EngineResult;

impl EngineCore {
    fn accepts_stream(&self, generation: u64) -> bool {
        generation == self.session_generation && self.stream.states.preview.is_started()
    }

    fn require_preview(&self) -> EngineResult<()> {
        if self.stream.states.preview.is_started() {
            Ok(())
        } else {
            Err(EngineError::InvalidState("preview is not started".into()))
        }
    }

    pub(crate) fn on_capture_started(&mut self, generation: u64, request: CaptureRequest) {
        if !self.accepts_stream(generation) {
            return;
        }
        self.actions.dispatch_started(&mut self.stream, &request);
        if request.tag == Template::Record {
            self.on_record_frame_started();
        }
    }

    pub(crate) fn on_capture_progressed(
        &mut self,
        generation: u64,
        request: CaptureRequest,
        partial: CaptureResult,
    ) {
        if !self.accepts_stream(generation) {
            return;
        }
        self.actions
            .dispatch_progressed(&mut self.stream, &request, &partial);
    }

    pub(crate) fn on_capture_completed(
        &mut self,
        generation: u64,
        request: CaptureRequest,
        result: CaptureResult,
    ) {
        if !self.accepts_stream(generation) {
            return;
        }
        self.stream.last_result = Some(result.clone());
        self.actions
            .dispatch_completed(&mut self.stream, &request, &result);
        if let Some(id) = self.metering {
            if !self.actions.contains(id) {
                self.metering = None;
            }
        }

        if request.tag == Template::Record
            && self.recording.as_ref().is_some_and(|r| r.started && !r.ending)
        {
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.frame_available();
            }
        }
    }

    pub(crate) fn on_frame(&mut self, generation: u64, frame: Frame) {
        if !self.accepts_stream(generation) {
            trace!(sequence = frame.sequence, "Dropping frame, preview not running");
            return;
        }
        if let Some(processor) = &self.frame_processor {
            processor.process(&frame);
        }
    }

    /// Apply a value the caller already stored. Rolls the stored value back
    /// if the device rejects it.
    pub(crate) fn apply_parameter(&mut self, old: ParameterValue, value: ParameterValue) -> bool {
        if !self.stream.states.device.is_started() {
            // Applied with everything else once the device opens.
            return true;
        }
        if !parameters::apply(
            self.stream.builder.settings_mut(),
            &self.stream.characteristics,
            &value,
        ) {
            warn!(parameter = ?value.kind(), value = ?value, "Unsupported parameter, rolling back");
            let mut shared = self.shared_parameters.write();
            if shared.value(value.kind()).same_as(&value) {
                shared.set(old);
            }
            return false;
        }

        if matches!(value, ParameterValue::Flash(_)) {
            self.pulse_precapture();
        }
        self.stream.apply_builder();
        debug!(value = ?value, "Parameter applied");
        self.send_event(EngineEvent::ParameterChanged(value));
        true
    }

    /// Wake the AE routine so a new flash mode takes effect.
    fn pulse_precapture(&mut self) {
        if !self.stream.states.preview.is_started() || self.stream.characteristics.legacy_hardware {
            return;
        }
        self.stream.builder.settings_mut().ae_precapture_trigger = Trigger::Start;
        self.stream.capture_once();
        self.stream.builder.settings_mut().ae_precapture_trigger = Trigger::Idle;
    }

    #[instrument(name = "start_metering", skip(self))]
    pub(crate) fn start_metering(
        &mut self,
        point: Option<PointF>,
        trigger: MeteringTrigger,
    ) -> EngineResult<()> {
        self.require_preview()?;
        if !self.stream.characteristics.metering_supported() {
            debug!("Metering not supported, ignoring");
            return Ok(());
        }
        if let Some(previous) = self.metering.take() {
            self.actions.abort(previous, &mut self.stream);
        }

        let listener = MeteringEvents {
            event_tx: self.event_tx.clone(),
        };
        let meter = Meter::new(
            point,
            trigger,
            self.config.mode,
            self.config.metering.clone(),
            Box::new(listener),
        );
        let id = self.actions.start(Box::new(meter), &mut self.stream);
        if self.actions.contains(id) {
            self.metering = Some(id);
        }
        Ok(())
    }

    pub(crate) fn reset_metering(&mut self) -> EngineResult<()> {
        if let Some(id) = self.metering.take() {
            debug!("Resetting metering");
            self.actions.abort(id, &mut self.stream);
        }
        Ok(())
    }

    pub(crate) fn take_picture(&mut self) -> EngineResult<()> {
        self.require_preview()?;
        let Some((surface, size)) = self.bound.picture else {
            return Err(EngineError::InvalidState(
                "no picture output is bound, pictures need Picture mode".into(),
            ));
        };
        if self.picture_in_flight {
            return Err(EngineError::InvalidState("a picture is already being taken".into()));
        }

        let mut builder = with_template(&self.stream.builder, Template::StillCapture);
        builder.add_target(surface);
        let location = builder.settings().location;

        self.picture_in_flight = true;
        info!(width = size.width, height = size.height, "Taking picture");
        let handle = self.handle.clone();
        self.stream.backend.capture_still(
            builder.build(),
            Box::new(move |result| {
                handle.post(move |core| core.on_picture_result(result, size, location));
            }),
        );
        Ok(())
    }

    fn on_picture_result(&mut self, result: DeviceResult<Bytes>, size: Size, location: Option<Location>) {
        self.picture_in_flight = false;
        match result {
            Ok(data) => {
                info!(bytes = data.len(), "Picture taken");
                self.send_event(EngineEvent::PictureResult {
                    result: Ok(PictureOutcome {
                        size,
                        data: data.to_vec(),
                        location,
                    }),
                });
            }
            Err(e) => {
                let error = EngineError::from(e);
                warn!(error = %error, "Picture failed");
                self.send_event(EngineEvent::PictureResult {
                    result: Err(error.to_string()),
                });
                if error.is_unrecoverable() {
                    error!(error = %error, "Unrecoverable error while taking picture");
                    self.send_event(EngineEvent::Error {
                        recoverable: false,
                        message: error.to_string(),
                    });
                    self.teardown_detached();
                }
            }
        }
    }

    pub(crate) fn take_video(&mut self, request: VideoRequest, completer: Completer<()>) {
        let check = if self.config.mode != Mode::Video {
            Err(EngineError::InvalidState("videos need Video mode".into()))
        } else if self.recorder.is_none() {
            Err(EngineError::Video("no recorder attached".into()))
        } else if self.recording.is_some() || self.pending_video.is_some() {
            Err(EngineError::InvalidState("already recording".into()))
        } else {
            self.require_preview()
        };
        if let Err(e) = check {
            completer.complete(Err(e));
            return;
        }

        info!(output = %request.output.display(), "Video requested, rebinding");
        self.pending_video = Some((request, completer));
        let (restart, _pending) = Pending::channel();
        self.enqueue(LifecycleOp::RestartBind, restart);
    }

    pub(crate) fn prepare_recorder(&mut self, size: Size) -> EngineResult<SurfaceHandle> {
        let Some((request, _)) = &self.pending_video else {
            return Err(EngineError::Video("no video requested".into()));
        };
        let Some(recorder) = self.recorder.as_mut() else {
            return Err(EngineError::Video("no recorder attached".into()));
        };
        let handle = self.handle.clone();
        let on_end: RecorderCallback = Box::new(move |outcome| {
            handle.post(move |core| core.on_video_end(outcome));
        });
        recorder.prepare(request, size, on_end)
    }

    /// Submit the record request once the rebind finished.
    pub(crate) fn do_take_video(&mut self, request: VideoRequest, completer: Completer<()>) {
        if let Err(e) = self.require_preview() {
            completer.complete(Err(e));
            return;
        }
        let Some(surface) = self.bound.recorder else {
            completer.complete(Err(EngineError::Video("recorder output is not bound".into())));
            return;
        };

        let mut builder = with_template(&self.stream.builder, Template::Record);
        builder.add_target(self.preview.handle());
        if let Some((processing, _)) = self.bound.processing {
            builder.add_target(processing);
        }
        builder.add_target(surface);
        let previous = std::mem::replace(&mut self.stream.builder, builder);

        match self.stream.submit() {
            Ok(()) => {
                info!(output = %request.output.display(), "Recording request running");
                self.recording = Some(Recording::default());
                completer.complete(Ok(()));
            }
            Err(e) => {
                warn!(error = %e, "Failed to submit record request");
                self.stream.builder = previous;
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.stop();
                }
                completer.complete(Err(EngineError::Video(e.to_string())));
            }
        }
    }

    /// The first recorded frame starts the recorder.
    fn on_record_frame_started(&mut self) {
        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        if recording.started || recording.ending {
            return;
        }
        recording.started = true;
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        match recorder.start() {
            Ok(()) => {
                info!("Recording started");
                self.send_event(EngineEvent::VideoRecordingStart);
            }
            Err(e) => {
                error!(error = %e, "Recorder failed to start");
                if let Some(recording) = self.recording.as_mut() {
                    recording.ending = true;
                }
                recorder.stop();
            }
        }
    }

    pub(crate) fn stop_video(&mut self) -> EngineResult<()> {
        let Some(recording) = self.recording.as_mut() else {
            return Ok(());
        };
        if recording.ending {
            return Ok(());
        }
        recording.ending = true;
        info!("Stopping recording");
        self.send_event(EngineEvent::VideoRecordingEnd);
        if self.config.template_restore == TemplateRestorePolicy::BeforeRecorderStop {
            self.restore_preview_template();
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }
        Ok(())
    }

    /// Stop the recorder because Preview is going away.
    pub(crate) fn end_recording_for_teardown(&mut self) {
        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        if recording.ending {
            return;
        }
        recording.ending = true;
        info!("Preview stopping, ending recording");
        self.send_event(EngineEvent::VideoRecordingEnd);
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.stop();
        }
    }

    fn on_video_end(&mut self, outcome: RecorderOutcome) {
        let recording = self.recording.take();
        if recording.as_ref().is_some_and(|r| !r.ending) {
            info!(reason = ?outcome.reason, "Recording reached its limit");
            self.send_event(EngineEvent::VideoRecordingEnd);
        }
        self.restore_preview_template();

        self.send_event(EngineEvent::EncoderStopped {
            reason: outcome.reason,
            error: outcome.error.clone(),
        });
        let result = match outcome.error {
            None => {
                info!(output = %outcome.output.display(), reason = ?outcome.reason, "Video saved");
                Ok(VideoOutcome {
                    output: outcome.output,
                    reason: outcome.reason,
                })
            }
            Some(e) => {
                warn!(error = %e, "Video failed");
                Err(e)
            }
        };
        self.send_event(EngineEvent::VideoResult { result });
    }

    /// Put the preview template back if the device is still running the
    /// record request.
    fn restore_preview_template(&mut self) {
        if self.stream.last_submitted != Some(Template::Record) {
            return;
        }
        let mut builder = with_template(&self.stream.builder, Template::Preview);
        builder.add_target(self.preview.handle());
        if let Some((processing, _)) = self.bound.processing {
            builder.add_target(processing);
        }
        self.stream.builder = builder;
        if let Err(e) = self.stream.submit() {
            warn!(error = %e, "Failed to restore preview template");
            return;
        }
        debug!("Preview template restored");
    }
}
