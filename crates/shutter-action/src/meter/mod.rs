//! Focus, exposure and white-balance metering around a point.
//!
//! A [`Meter`] runs one sub-meter per 3A routine side by side, each bounded
//! by a frame timeout. When all of them settle the listener is told whether
//! metering succeeded and the stream is put back the way it was.

mod exposure;
mod focus;
mod regions;
mod white_balance;

use shutter_capture::{AfMode, CaptureRequest, CaptureResult, Trigger};
use shutter_ipc::{MeteringConfig, MeteringTrigger, Mode, PointF, Rect};
use tracing::{debug, info};

use crate::action::{Action, ActionBase, ActionHolder, ActionState};
use crate::combinators::{Timeout, Together};

pub use regions::MeterRegions;

use exposure::ExposureConvergence;
use focus::FocusConvergence;
use white_balance::WhiteBalanceConvergence;

/// Told when metering starts and ends.
pub trait MeteringListener: Send {
    fn on_metering_started(&mut self, point: Option<PointF>, trigger: MeteringTrigger);
    fn on_metering_end(&mut self, point: Option<PointF>, trigger: MeteringTrigger, success: bool);
}

/// How one 3A routine is started and judged.
pub(crate) trait Convergence: Send {
    fn name(&self) -> &'static str;

    fn is_supported(&self, holder: &dyn ActionHolder) -> bool;

    /// The routine is already where metering would take it.
    fn should_skip(&self, holder: &dyn ActionHolder) -> bool;

    /// Set regions and triggers on the builder.
    fn on_started(&mut self, holder: &mut dyn ActionHolder, regions: &MeterRegions);

    /// `Some(success)` once the routine settled.
    fn on_result(&mut self, result: &CaptureResult) -> Option<bool>;

    /// Clear regions and cancel any trigger fired in `on_started`.
    fn on_reset(&mut self, holder: &mut dyn ActionHolder);
}

/// Meters a single routine.
pub(crate) struct SubMeter {
    base: ActionBase,
    convergence: Box<dyn Convergence>,
    regions: MeterRegions,
    successful: bool,
}

impl SubMeter {
    fn new(convergence: Box<dyn Convergence>, regions: MeterRegions) -> Self {
        Self {
            base: ActionBase::new(convergence.name()),
            convergence,
            regions,
            successful: false,
        }
    }

    pub(crate) fn successful(&self) -> bool {
        self.successful
    }

    fn reset(&mut self, holder: &mut dyn ActionHolder) {
        self.convergence.on_reset(holder);
    }
}

impl Action for SubMeter {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn on_start(&mut self, holder: &mut dyn ActionHolder) {
        let supported = self.convergence.is_supported(&*holder);
        if !supported || self.convergence.should_skip(&*holder) {
            debug!(meter = self.convergence.name(), supported, "Sub-meter not needed");
            self.successful = true;
            self.base.set_state(ActionState::Completed);
            return;
        }
        self.convergence.on_started(holder, &self.regions);
    }

    fn on_capture_completed(
        &mut self,
        _holder: &mut dyn ActionHolder,
        _request: &CaptureRequest,
        result: &CaptureResult,
    ) {
        if let Some(successful) = self.convergence.on_result(result) {
            debug!(meter = self.convergence.name(), successful, "Sub-meter settled");
            self.successful = successful;
            self.base.set_state(ActionState::Completed);
        }
    }

    fn on_abort(&mut self, _holder: &mut dyn ActionHolder) {
        self.successful = false;
        self.base.set_state(ActionState::Completed);
    }
}

/// Meters focus, exposure and white balance around an optional point.
pub struct Meter {
    base: ActionBase,
    point: Option<PointF>,
    trigger: MeteringTrigger,
    mode: Mode,
    config: MeteringConfig,
    listener: Box<dyn MeteringListener>,
    meters: Option<Together<Timeout<SubMeter>>>,
    saved_focus: Option<(AfMode, Option<f32>)>,
    reset_done: bool,
}

impl Meter {
    /// A meter for `point`, in normalized sensor coordinates. `None` meters
    /// the whole frame.
    pub fn new(
        point: Option<PointF>,
        trigger: MeteringTrigger,
        mode: Mode,
        config: MeteringConfig,
        listener: Box<dyn MeteringListener>,
    ) -> Self {
        Self {
            base: ActionBase::new("meter"),
            point,
            trigger,
            mode,
            config,
            listener,
            meters: None,
            saved_focus: None,
            reset_done: false,
        }
    }

    /// The focus mode metering forces while it runs.
    fn metering_focus_mode(&self, holder: &dyn ActionHolder) -> Option<AfMode> {
        let available = &holder.characteristics().af_modes;
        let mut candidates = vec![AfMode::Auto];
        if self.mode == Mode::Video {
            candidates.push(AfMode::ContinuousVideo);
        }
        candidates.push(AfMode::ContinuousPicture);
        candidates.into_iter().find(|m| available.contains(m))
    }

    fn succeeded(&self) -> bool {
        self.meters.as_ref().is_some_and(|meters| {
            meters
                .children()
                .iter()
                .all(|t| !t.timed_out() && t.child().successful())
        })
    }

    fn finish(&mut self, holder: &mut dyn ActionHolder) {
        let success = self.succeeded();
        info!(success, "Metering finished");
        self.listener.on_metering_end(self.point, self.trigger, success);
        self.reset(holder);
        self.base.set_state(ActionState::Completed);
    }

    /// Put the stream back the way it was before metering. Runs once.
    fn reset(&mut self, holder: &mut dyn ActionHolder) {
        if std::mem::replace(&mut self.reset_done, true) {
            return;
        }
        if !holder.is_alive() {
            debug!("Engine gone, skipping metering reset");
            return;
        }

        if let Some((af_mode, focus_distance)) = self.saved_focus.take() {
            let settings = holder.builder_mut().settings_mut();
            settings.af_mode = af_mode;
            settings.focus_distance = focus_distance;
        }
        if let Some(meters) = self.meters.as_mut() {
            for timeout in meters.children_mut() {
                timeout.child_mut().reset(holder);
            }
        }

        let settings = holder.builder().settings();
        if settings.af_trigger == Trigger::Cancel || settings.ae_precapture_trigger == Trigger::Cancel {
            holder.capture_once();
        }
        let settings = holder.builder_mut().settings_mut();
        settings.af_trigger = Trigger::Idle;
        settings.ae_precapture_trigger = Trigger::Idle;
        holder.apply_builder();
    }
}

impl Action for Meter {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn on_start(&mut self, holder: &mut dyn ActionHolder) {
        let settings = holder.builder().settings();
        self.saved_focus = Some((settings.af_mode, settings.focus_distance));
        if let Some(af_mode) = self.metering_focus_mode(&*holder) {
            holder.builder_mut().settings_mut().af_mode = af_mode;
        }

        let crop = holder
            .builder()
            .settings()
            .crop_region
            .unwrap_or_else(|| Rect::from_size(holder.characteristics().active_array));
        let regions = MeterRegions::compute(
            self.point,
            crop,
            self.config.region_fraction,
            self.config.blur_factor,
        );
        let convergences: [Box<dyn Convergence>; 3] = [
            Box::new(FocusConvergence::default()),
            Box::new(ExposureConvergence::default()),
            Box::new(WhiteBalanceConvergence),
        ];
        let children = convergences
            .into_iter()
            .map(|c| Timeout::new(SubMeter::new(c, regions.clone()), self.config.timeout_frames))
            .collect();

        let mut meters = Together::new(children);
        meters.base_mut().set_state(ActionState::Started);
        meters.on_start(holder);
        self.meters = Some(meters);

        holder.capture_once();
        let settings = holder.builder_mut().settings_mut();
        settings.af_trigger = Trigger::Idle;
        settings.ae_precapture_trigger = Trigger::Idle;
        holder.apply_builder();

        info!(point = ?self.point, trigger = ?self.trigger, "Metering started");
        self.listener.on_metering_started(self.point, self.trigger);

        if self.meters.as_ref().is_some_and(|m| m.is_completed()) {
            self.finish(holder);
        }
    }

    fn on_capture_completed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        result: &CaptureResult,
    ) {
        let Some(meters) = self.meters.as_mut() else {
            return;
        };
        meters.on_capture_completed(holder, request, result);
        if meters.is_completed() {
            self.finish(holder);
        }
    }

    fn on_abort(&mut self, holder: &mut dyn ActionHolder) {
        if let Some(meters) = self.meters.as_mut() {
            if !meters.is_completed() {
                meters.on_abort(holder);
            }
        }
        self.reset(holder);
        self.base.set_state(ActionState::Completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActionRegistry;
    use crate::testing::FakeHolder;
    use shutter_capture::{AeMode, AeState, AfState, AwbMode, AwbState, DeviceCharacteristics};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Started,
        Ended(bool),
    }

    struct Recorder(Arc<Mutex<Vec<Seen>>>);

    impl MeteringListener for Recorder {
        fn on_metering_started(&mut self, _point: Option<PointF>, _trigger: MeteringTrigger) {
            self.0.lock().push(Seen::Started);
        }

        fn on_metering_end(&mut self, _point: Option<PointF>, _trigger: MeteringTrigger, success: bool) {
            self.0.lock().push(Seen::Ended(success));
        }
    }

    fn meter(timeout_frames: u32) -> (Box<dyn Action>, Arc<Mutex<Vec<Seen>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = MeteringConfig {
            timeout_frames,
            ..Default::default()
        };
        let meter = Meter::new(
            Some(PointF::center()),
            MeteringTrigger::Gesture,
            Mode::Picture,
            config,
            Box::new(Recorder(Arc::clone(&seen))),
        );
        (Box::new(meter), seen)
    }

    fn preview_holder() -> FakeHolder {
        let mut holder = FakeHolder::new();
        holder.builder.settings_mut().af_mode = AfMode::ContinuousPicture;
        holder
    }

    fn deliver(registry: &mut ActionRegistry, holder: &mut FakeHolder, result: CaptureResult) {
        let request = holder.builder.build();
        registry.dispatch_completed(holder, &request, &result);
        holder.last_result = Some(result);
    }

    #[test]
    fn test_metering_converges_and_restores_focus() {
        let mut holder = preview_holder();
        let mut registry = ActionRegistry::new();
        let (meter, seen) = meter(60);
        registry.start(meter, &mut holder);

        // Triggers fired once, then the repeating request goes back to idle.
        assert_eq!(holder.captured.len(), 1);
        let fired = &holder.captured[0].settings;
        assert_eq!(fired.af_mode, AfMode::Auto);
        assert_eq!(fired.af_trigger, Trigger::Start);
        assert_eq!(fired.ae_precapture_trigger, Trigger::Start);
        assert_eq!(fired.af_regions.len(), 1);
        assert_eq!(holder.builder.settings().af_trigger, Trigger::Idle);
        assert_eq!(*seen.lock(), vec![Seen::Started]);

        deliver(
            &mut registry,
            &mut holder,
            CaptureResult::new(1)
                .with_af(AfState::ActiveScan)
                .with_ae(AeState::Precapture)
                .with_awb(AwbState::Searching),
        );
        deliver(
            &mut registry,
            &mut holder,
            CaptureResult::new(2)
                .with_af(AfState::ActiveScan)
                .with_ae(AeState::Converged)
                .with_awb(AwbState::Converged),
        );
        assert!(!registry.is_empty());
        deliver(
            &mut registry,
            &mut holder,
            CaptureResult::new(3).with_af(AfState::FocusedLocked),
        );

        assert!(registry.is_empty());
        assert_eq!(*seen.lock(), vec![Seen::Started, Seen::Ended(true)]);

        let settings = holder.builder.settings();
        assert_eq!(settings.af_mode, AfMode::ContinuousPicture);
        assert!(settings.af_regions.is_empty());
        assert!(settings.ae_regions.is_empty());
        assert!(settings.awb_regions.is_empty());
        assert_eq!(settings.af_trigger, Trigger::Idle);

        // The reset cancelled both triggers in a single one-shot request.
        assert_eq!(holder.captured.len(), 2);
        assert_eq!(holder.captured[1].settings.af_trigger, Trigger::Cancel);
        assert_eq!(holder.captured[1].settings.ae_precapture_trigger, Trigger::Cancel);
    }

    #[test]
    fn test_metering_times_out_as_failure() {
        let mut holder = preview_holder();
        let mut registry = ActionRegistry::new();
        let (meter, seen) = meter(2);
        registry.start(meter, &mut holder);

        for frame in 1..=2 {
            deliver(
                &mut registry,
                &mut holder,
                CaptureResult::new(frame)
                    .with_af(AfState::ActiveScan)
                    .with_ae(AeState::Converged)
                    .with_awb(AwbState::Converged),
            );
        }

        assert!(registry.is_empty());
        assert_eq!(*seen.lock(), vec![Seen::Started, Seen::Ended(false)]);
        assert_eq!(holder.builder.settings().af_mode, AfMode::ContinuousPicture);
    }

    #[test]
    fn test_failed_focus_is_failure() {
        let mut holder = preview_holder();
        let mut registry = ActionRegistry::new();
        let (meter, seen) = meter(60);
        registry.start(meter, &mut holder);

        deliver(
            &mut registry,
            &mut holder,
            CaptureResult::new(1)
                .with_af(AfState::NotFocusedLocked)
                .with_ae(AeState::Converged)
                .with_awb(AwbState::Converged),
        );
        assert_eq!(*seen.lock(), vec![Seen::Started, Seen::Ended(false)]);
    }

    #[test]
    fn test_unsupported_routines_complete_at_start() {
        let mut holder = FakeHolder::with_characteristics(DeviceCharacteristics {
            af_modes: vec![AfMode::Off],
            ..Default::default()
        });
        holder.builder.settings_mut().ae_mode = AeMode::Off;
        holder.builder.settings_mut().awb_mode = AwbMode::Daylight;

        let mut registry = ActionRegistry::new();
        let (meter, seen) = meter(60);
        registry.start(meter, &mut holder);

        assert!(registry.is_empty());
        assert_eq!(*seen.lock(), vec![Seen::Started, Seen::Ended(true)]);
    }

    #[test]
    fn test_abort_resets_without_end() {
        let mut holder = preview_holder();
        let mut registry = ActionRegistry::new();
        let (meter, seen) = meter(60);
        let id = registry.start(meter, &mut holder);

        assert!(registry.abort(id, &mut holder));
        assert_eq!(*seen.lock(), vec![Seen::Started]);
        assert_eq!(holder.builder.settings().af_mode, AfMode::ContinuousPicture);
        assert!(holder.builder.settings().af_regions.is_empty());
    }

    #[test]
    fn test_reset_skipped_when_engine_gone() {
        let mut holder = preview_holder();
        let mut registry = ActionRegistry::new();
        let (meter, _seen) = meter(60);
        let id = registry.start(meter, &mut holder);
        let applied = holder.applied.len();

        holder.alive = false;
        registry.abort(id, &mut holder);

        assert_eq!(holder.applied.len(), applied);
        assert_eq!(holder.builder.settings().af_mode, AfMode::Auto);
    }
}
