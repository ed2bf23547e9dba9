//! The set of live actions and their stream-event dispatch.

use shutter_capture::{CaptureRequest, CaptureResult};
use tracing::debug;

use crate::action::{Action, ActionHolder, ActionState};

/// Identifies a started action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(u64);

/// Live actions, in start order.
///
/// Every stream event reaches every live action. An action is removed
/// immediately after the callback that completes it, so it never sees
/// another event.
#[derive(Default)]
pub struct ActionRegistry {
    live: Vec<(ActionId, Box<dyn Action>)>,
    next_id: u64,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an action. It joins the live set unless it completed during
    /// its own start.
    pub fn start(&mut self, mut action: Box<dyn Action>, holder: &mut dyn ActionHolder) -> ActionId {
        let id = ActionId(self.next_id);
        self.next_id += 1;

        action.base_mut().set_state(ActionState::Started);
        action.on_start(holder);

        if action.is_completed() {
            debug!(action = action.name(), "Action completed during start");
        } else {
            debug!(action = action.name(), "Action started");
            self.live.push((id, action));
        }
        id
    }

    pub fn dispatch_started(&mut self, holder: &mut dyn ActionHolder, request: &CaptureRequest) {
        self.dispatch(|action| action.on_capture_started(holder, request));
    }

    pub fn dispatch_progressed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        partial: &CaptureResult,
    ) {
        self.dispatch(|action| action.on_capture_progressed(holder, request, partial));
    }

    pub fn dispatch_completed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        result: &CaptureResult,
    ) {
        self.dispatch(|action| action.on_capture_completed(holder, request, result));
    }

    fn dispatch(&mut self, mut deliver: impl FnMut(&mut dyn Action)) {
        let mut i = 0;
        while i < self.live.len() {
            let action = self.live[i].1.as_mut();
            deliver(action);
            if action.is_completed() {
                let (_, action) = self.live.remove(i);
                debug!(action = action.name(), "Action completed");
            } else {
                i += 1;
            }
        }
    }

    /// Abort a live action. Returns false if it is not live.
    pub fn abort(&mut self, id: ActionId, holder: &mut dyn ActionHolder) -> bool {
        let Some(index) = self.live.iter().position(|(live_id, _)| *live_id == id) else {
            return false;
        };
        let (_, action) = self.live.remove(index);
        Self::abort_action(action, holder);
        true
    }

    /// Abort every live action, in start order.
    pub fn abort_all(&mut self, holder: &mut dyn ActionHolder) {
        for (_, action) in std::mem::take(&mut self.live) {
            Self::abort_action(action, holder);
        }
    }

    fn abort_action(mut action: Box<dyn Action>, holder: &mut dyn ActionHolder) {
        debug!(action = action.name(), "Aborting action");
        action.on_abort(holder);
        action.base_mut().set_state(ActionState::Completed);
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.live.iter().any(|(live_id, _)| *live_id == id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
