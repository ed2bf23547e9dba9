//! The action contract and its shared state.

use shutter_capture::{CaptureRequest, CaptureResult, DeviceCharacteristics, RequestBuilder};

/// Lifecycle of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Created, not yet started.
    Idle,

    /// Registered and observing the stream.
    Started,

    /// An action-specific intermediate phase.
    Phase(u8),

    /// Terminal. The action has left its holder.
    Completed,
}

/// Observer of action state changes.
pub type ActionCallback = Box<dyn FnMut(ActionState) + Send>;

/// Identifies a registered observer, for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// State and observers shared by every action.
pub struct ActionBase {
    name: &'static str,
    state: ActionState,
    callbacks: Vec<(CallbackId, ActionCallback)>,
    next_callback: u64,
}

impl ActionBase {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: ActionState::Idle,
            callbacks: Vec::new(),
            next_callback: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == ActionState::Completed
    }

    /// Move to `state`, notifying observers in registration order.
    ///
    /// Returns false if the state did not change. A completed action never
    /// changes state again.
    pub fn set_state(&mut self, state: ActionState) -> bool {
        if state == self.state || self.is_completed() {
            return false;
        }
        self.state = state;
        for (_, callback) in self.callbacks.iter_mut() {
            callback(state);
        }
        true
    }

    /// Register an observer. It is immediately told the current state.
    pub fn add_callback(&mut self, mut callback: ActionCallback) -> CallbackId {
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        callback(self.state);
        self.callbacks.push((id, callback));
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }
}

impl std::fmt::Debug for ActionBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionBase")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// What the owner of the live stream offers to actions.
pub trait ActionHolder {
    /// The live repeating request builder.
    fn builder(&self) -> &RequestBuilder;

    fn builder_mut(&mut self) -> &mut RequestBuilder;

    fn characteristics(&self) -> &DeviceCharacteristics;

    /// The most recent completed result of the repeating request.
    fn last_result(&self) -> Option<&CaptureResult>;

    /// Re-submit the builder as the repeating request, if the stream is
    /// running.
    fn apply_builder(&mut self);

    /// Submit the builder once, so one-frame triggers fire exactly once.
    fn capture_once(&mut self);

    /// Whether the owning engine is still running.
    fn is_alive(&self) -> bool;
}

/// An asynchronous operation observing the live stream.
///
/// Stream hooks default to no-ops; an action overrides the ones it cares
/// about.
pub trait Action: Send {
    fn base(&self) -> &ActionBase;

    fn base_mut(&mut self) -> &mut ActionBase;

    /// One-time setup, called when the action is started.
    fn on_start(&mut self, _holder: &mut dyn ActionHolder) {}

    fn on_capture_started(&mut self, _holder: &mut dyn ActionHolder, _request: &CaptureRequest) {}

    fn on_capture_progressed(
        &mut self,
        _holder: &mut dyn ActionHolder,
        _request: &CaptureRequest,
        _partial: &CaptureResult,
    ) {
    }

    fn on_capture_completed(
        &mut self,
        _holder: &mut dyn ActionHolder,
        _request: &CaptureRequest,
        _result: &CaptureResult,
    ) {
    }

    /// The holder is removing this action before it completed. Must leave
    /// the action `Completed`.
    fn on_abort(&mut self, _holder: &mut dyn ActionHolder) {
        self.base_mut().set_state(ActionState::Completed);
    }

    fn name(&self) -> &'static str {
        self.base().name()
    }

    fn state(&self) -> ActionState {
        self.base().state()
    }

    fn is_completed(&self) -> bool {
        self.base().is_completed()
    }
}

impl Action for Box<dyn Action> {
    fn base(&self) -> &ActionBase {
        (**self).base()
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        (**self).base_mut()
    }

    fn on_start(&mut self, holder: &mut dyn ActionHolder) {
        (**self).on_start(holder)
    }

    fn on_capture_started(&mut self, holder: &mut dyn ActionHolder, request: &CaptureRequest) {
        (**self).on_capture_started(holder, request)
    }

    fn on_capture_progressed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        partial: &CaptureResult,
    ) {
        (**self).on_capture_progressed(holder, request, partial)
    }

    fn on_capture_completed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        result: &CaptureResult,
    ) {
        (**self).on_capture_completed(holder, request, result)
    }

    fn on_abort(&mut self, holder: &mut dyn ActionHolder) {
        (**self).on_abort(holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder() -> (Arc<Mutex<Vec<ActionState>>>, ActionCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Box::new(move |state| sink.lock().push(state)))
    }

    #[test]
    fn test_callback_replays_current_state() {
        let mut base = ActionBase::new("test");
        base.set_state(ActionState::Started);

        let (seen, callback) = recorder();
        base.add_callback(callback);
        assert_eq!(*seen.lock(), vec![ActionState::Started]);
    }

    #[test]
    fn test_callbacks_notified_in_order() {
        let mut base = ActionBase::new("test");
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            base.add_callback(Box::new(move |state| {
                if state == ActionState::Completed {
                    order.lock().push(i);
                }
            }));
        }
        base.set_state(ActionState::Completed);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_removed_callback_not_notified() {
        let mut base = ActionBase::new("test");
        let (seen, callback) = recorder();
        let id = base.add_callback(callback);
        assert!(base.remove_callback(id));
        assert!(!base.remove_callback(id));

        base.set_state(ActionState::Started);
        assert_eq!(*seen.lock(), vec![ActionState::Idle]);
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut base = ActionBase::new("test");
        assert!(base.set_state(ActionState::Completed));
        assert!(!base.set_state(ActionState::Started));
        assert!(base.is_completed());
    }
}
