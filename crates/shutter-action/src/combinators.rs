//! Actions built out of other actions.

use shutter_capture::{CaptureRequest, CaptureResult};

use crate::action::{Action, ActionBase, ActionHolder, ActionState};

/// Runs its children side by side and completes once all of them have.
pub struct Together<A: Action> {
    base: ActionBase,
    children: Vec<A>,
}

impl<A: Action> Together<A> {
    pub fn new(children: Vec<A>) -> Self {
        Self {
            base: ActionBase::new("together"),
            children,
        }
    }

    pub fn children(&self) -> &[A] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [A] {
        &mut self.children
    }

    fn maybe_complete(&mut self) {
        if self.children.iter().all(|c| c.is_completed()) {
            self.base.set_state(ActionState::Completed);
        }
    }

    fn forward(&mut self, mut deliver: impl FnMut(&mut A)) {
        for child in self.children.iter_mut().filter(|c| !c.is_completed()) {
            deliver(child);
        }
        self.maybe_complete();
    }
}

impl<A: Action> Action for Together<A> {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn on_start(&mut self, holder: &mut dyn ActionHolder) {
        for child in self.children.iter_mut() {
            child.base_mut().set_state(ActionState::Started);
            child.on_start(holder);
        }
        self.maybe_complete();
    }

    fn on_capture_started(&mut self, holder: &mut dyn ActionHolder, request: &CaptureRequest) {
        self.forward(|child| child.on_capture_started(holder, request));
    }

    fn on_capture_progressed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        partial: &CaptureResult,
    ) {
        self.forward(|child| child.on_capture_progressed(holder, request, partial));
    }

    fn on_capture_completed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        result: &CaptureResult,
    ) {
        self.forward(|child| child.on_capture_completed(holder, request, result));
    }

    fn on_abort(&mut self, holder: &mut dyn ActionHolder) {
        for child in self.children.iter_mut().filter(|c| !c.is_completed()) {
            child.on_abort(holder);
            child.base_mut().set_state(ActionState::Completed);
        }
        self.base.set_state(ActionState::Completed);
    }
}

/// Aborts its child if it has not completed within `max_frames` completed
/// results.
pub struct Timeout<A: Action> {
    base: ActionBase,
    child: A,
    max_frames: u32,
    frames: u32,
    timed_out: bool,
}

impl<A: Action> Timeout<A> {
    pub fn new(child: A, max_frames: u32) -> Self {
        Self {
            base: ActionBase::new("timeout"),
            child,
            max_frames,
            frames: 0,
            timed_out: false,
        }
    }

    pub fn child(&self) -> &A {
        &self.child
    }

    pub fn child_mut(&mut self) -> &mut A {
        &mut self.child
    }

    /// Whether the child was aborted for running out of frames.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    fn maybe_complete(&mut self) {
        if self.child.is_completed() {
            self.base.set_state(ActionState::Completed);
        }
    }
}

impl<A: Action> Action for Timeout<A> {
    fn base(&self) -> &ActionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ActionBase {
        &mut self.base
    }

    fn on_start(&mut self, holder: &mut dyn ActionHolder) {
        self.child.base_mut().set_state(ActionState::Started);
        self.child.on_start(holder);
        self.maybe_complete();
    }

    fn on_capture_started(&mut self, holder: &mut dyn ActionHolder, request: &CaptureRequest) {
        if !self.child.is_completed() {
            self.child.on_capture_started(holder, request);
        }
        self.maybe_complete();
    }

    fn on_capture_progressed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        partial: &CaptureResult,
    ) {
        if !self.child.is_completed() {
            self.child.on_capture_progressed(holder, request, partial);
        }
        self.maybe_complete();
    }

    fn on_capture_completed(
        &mut self,
        holder: &mut dyn ActionHolder,
        request: &CaptureRequest,
        result: &CaptureResult,
    ) {
        if !self.child.is_completed() {
            self.child.on_capture_completed(holder, request, result);
            self.frames += 1;
            if !self.child.is_completed() && self.frames >= self.max_frames {
                self.timed_out = true;
                self.child.on_abort(holder);
                self.child.base_mut().set_state(ActionState::Completed);
            }
        }
        self.maybe_complete();
    }

    fn on_abort(&mut self, holder: &mut dyn ActionHolder) {
        if !self.child.is_completed() {
            self.child.on_abort(holder);
            self.child.base_mut().set_state(ActionState::Completed);
        }
        self.base.set_state(ActionState::Completed);
    }
}
