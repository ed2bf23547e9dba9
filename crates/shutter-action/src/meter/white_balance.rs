use shutter_capture::{AwbMode, AwbState, CaptureResult};

use super::regions::MeterRegions;
use super::Convergence;
use crate::action::ActionHolder;

#[derive(Debug, Default)]
pub(crate) struct WhiteBalanceConvergence;

impl Convergence for WhiteBalanceConvergence {
    fn name(&self) -> &'static str {
        "white_balance"
    }

    fn is_supported(&self, holder: &dyn ActionHolder) -> bool {
        holder.builder().settings().awb_mode == AwbMode::Auto
    }

    fn should_skip(&self, holder: &dyn ActionHolder) -> bool {
        let converged = holder
            .last_result()
            .is_some_and(|r| r.awb_state == Some(AwbState::Converged));
        holder.characteristics().max_regions_awb == 0 && converged
    }

    fn on_started(&mut self, holder: &mut dyn ActionHolder, regions: &MeterRegions) {
        let max = holder.characteristics().max_regions_awb;
        holder.builder_mut().settings_mut().awb_regions = regions.take(max);
    }

    fn on_result(&mut self, result: &CaptureResult) -> Option<bool> {
        match result.awb_state? {
            AwbState::Converged | AwbState::Locked => Some(true),
            _ => None,
        }
    }

    fn on_reset(&mut self, holder: &mut dyn ActionHolder) {
        holder.builder_mut().settings_mut().awb_regions.clear();
    }
}
