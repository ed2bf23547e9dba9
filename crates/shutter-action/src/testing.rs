//! A holder that records what actions do to it.

use shutter_capture::{
    CaptureRequest, CaptureResult, DeviceCharacteristics, RequestBuilder, Template,
};

use crate::action::ActionHolder;

pub(crate) struct FakeHolder {
    pub builder: RequestBuilder,
    pub characteristics: DeviceCharacteristics,
    pub last_result: Option<CaptureResult>,
    pub alive: bool,
    pub applied: Vec<CaptureRequest>,
    pub captured: Vec<CaptureRequest>,
}

impl FakeHolder {
    pub fn new() -> Self {
        Self::with_characteristics(DeviceCharacteristics::default())
    }

    pub fn with_characteristics(characteristics: DeviceCharacteristics) -> Self {
        Self {
            builder: RequestBuilder::new(Template::Preview),
            characteristics,
            last_result: None,
            alive: true,
            applied: Vec::new(),
            captured: Vec::new(),
        }
    }
}

impl ActionHolder for FakeHolder {
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
        self.applied.push(self.builder.build());
    }

    fn capture_once(&mut self) {
        self.captured.push(self.builder.build());
    }

    fn is_alive(&self) -> bool {
        self.alive
    }
}

/// A completed-result pair for the holder's current request.
pub(crate) fn completed(holder: &FakeHolder, frame_number: u64) -> (CaptureRequest, CaptureResult) {
    (holder.builder.build(), CaptureResult::new(frame_number))
}
