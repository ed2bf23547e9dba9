use shutter_capture::{AfState, CaptureResult, Trigger};

use super::regions::MeterRegions;
use super::Convergence;
use crate::action::ActionHolder;

/// Drives auto-focus through a trigger and waits for the lens to lock.
#[derive(Debug, Default)]
pub(crate) struct FocusConvergence {
    triggered: bool,
}

impl Convergence for FocusConvergence {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn is_supported(&self, holder: &dyn ActionHolder) -> bool {
        holder.builder().settings().af_mode.supports_trigger()
    }

    fn should_skip(&self, holder: &dyn ActionHolder) -> bool {
        let locked = holder
            .last_result()
            .is_some_and(|r| r.af_state == Some(AfState::FocusedLocked));
        holder.characteristics().max_regions_af == 0 && locked
    }

    fn on_started(&mut self, holder: &mut dyn ActionHolder, regions: &MeterRegions) {
        let max = holder.characteristics().max_regions_af;
        let settings = holder.builder_mut().settings_mut();
        settings.af_regions = regions.take(max);
        settings.af_trigger = Trigger::Start;
        self.triggered = true;
    }

    fn on_result(&mut self, result: &CaptureResult) -> Option<bool> {
        match result.af_state? {
            AfState::FocusedLocked => Some(true),
            AfState::NotFocusedLocked => Some(false),
            _ => None,
        }
    }

    fn on_reset(&mut self, holder: &mut dyn ActionHolder) {
        let settings = holder.builder_mut().settings_mut();
        settings.af_regions.clear();
        if std::mem::take(&mut self.triggered) {
            settings.af_trigger = Trigger::Cancel;
        }
    }
}
