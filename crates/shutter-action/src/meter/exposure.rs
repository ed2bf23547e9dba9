use shutter_capture::{AeState, CaptureResult, Trigger};

use super::regions::MeterRegions;
use super::Convergence;
use crate::action::ActionHolder;

/// Runs a precapture sequence, where the hardware allows one, and waits for
/// auto-exposure to settle.
#[derive(Debug, Default)]
pub(crate) struct ExposureConvergence {
    triggered: bool,
}

impl Convergence for ExposureConvergence {
    fn name(&self) -> &'static str {
        "exposure"
    }

    fn is_supported(&self, holder: &dyn ActionHolder) -> bool {
        holder.builder().settings().ae_mode.is_on()
    }

    fn should_skip(&self, holder: &dyn ActionHolder) -> bool {
        let converged = holder
            .last_result()
            .is_some_and(|r| r.ae_state == Some(AeState::Converged));
        holder.characteristics().max_regions_ae == 0 && converged
    }

    fn on_started(&mut self, holder: &mut dyn ActionHolder, regions: &MeterRegions) {
        let max = holder.characteristics().max_regions_ae;
        let legacy = holder.characteristics().legacy_hardware;
        let settings = holder.builder_mut().settings_mut();
        settings.ae_regions = regions.take(max);
        if !legacy {
            settings.ae_precapture_trigger = Trigger::Start;
            self.triggered = true;
        }
    }

    fn on_result(&mut self, result: &CaptureResult) -> Option<bool> {
        match result.ae_state? {
            AeState::Converged | AeState::FlashRequired | AeState::Locked => Some(true),
            _ => None,
        }
    }

    fn on_reset(&mut self, holder: &mut dyn ActionHolder) {
        let settings = holder.builder_mut().settings_mut();
        settings.ae_regions.clear();
        if std::mem::take(&mut self.triggered) {
            settings.ae_precapture_trigger = Trigger::Cancel;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHolder;
    use shutter_capture::DeviceCharacteristics;
    use shutter_ipc::{PointF, Rect};

    #[test]
    fn test_legacy_hardware_skips_precapture() {
        let mut holder = FakeHolder::with_characteristics(DeviceCharacteristics {
            legacy_hardware: true,
            ..Default::default()
        });
        let regions = MeterRegions::compute(Some(PointF::center()), Rect::new(0, 0, 400, 300), 0.1, 1.5);

        let mut exposure = ExposureConvergence::default();
        exposure.on_started(&mut holder, &regions);
        assert_eq!(holder.builder.settings().ae_precapture_trigger, Trigger::Idle);
        assert_eq!(holder.builder.settings().ae_regions.len(), 1);

        exposure.on_reset(&mut holder);
        assert_eq!(holder.builder.settings().ae_precapture_trigger, Trigger::Idle);
        assert!(holder.builder.settings().ae_regions.is_empty());
    }

    #[test]
    fn test_skip_when_converged_without_regions() {
        let mut holder = FakeHolder::with_characteristics(DeviceCharacteristics {
            max_regions_ae: 0,
            ..Default::default()
        });
        let exposure = ExposureConvergence::default();
        assert!(!exposure.should_skip(&holder));

        holder.last_result = Some(CaptureResult::new(1).with_ae(AeState::Converged));
        assert!(exposure.should_skip(&holder));
    }

    #[test]
    fn test_settled_states() {
        let mut exposure = ExposureConvergence::default();
        let result = |state| CaptureResult::new(1).with_ae(state);
        assert_eq!(exposure.on_result(&result(AeState::Searching)), None);
        assert_eq!(exposure.on_result(&result(AeState::Precapture)), None);
        assert_eq!(exposure.on_result(&result(AeState::FlashRequired)), Some(true));
        assert_eq!(exposure.on_result(&result(AeState::Locked)), Some(true));
    }
}
