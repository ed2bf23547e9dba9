//! Engine stage types.

use serde::{Deserialize, Serialize};

/// One ordered phase of the capture engine lifecycle.
///
/// Stages are totally ordered: `Preview` requires `Bind`, which requires
/// `Device`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Device acquisition.
    Device,

    /// Output surfaces and capture session.
    Bind,

    /// Repeating request producing the live stream.
    Preview,
}

impl Stage {
    /// All stages, lowest first.
    pub const ALL: [Stage; 3] = [Stage::Device, Stage::Bind, Stage::Preview];

    /// Returns the stage above this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Device => Some(Self::Bind),
            Self::Bind => Some(Self::Preview),
            Self::Preview => None,
        }
    }

    /// Returns the stage below this one, if any.
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::Device => None,
            Self::Bind => Some(Self::Device),
            Self::Preview => Some(Self::Bind),
        }
    }

    /// Returns the display name for this stage.
    pub fn name(self) -> &'static str {
        match self {
            Self::Device => "Device",
            Self::Bind => "Bind",
            Self::Preview => "Preview",
        }
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageState {
    #[default]
    Off,
    Starting,
    Started,
    Stopping,
}

impl StageState {
    /// Returns true if the stage is fully started.
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }

    /// Returns true if the stage is off.
    pub fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }
}

/// Snapshot of every stage's status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStates {
    pub device: StageState,
    pub bind: StageState,
    pub preview: StageState,
}

impl StageStates {
    /// Get the status of a stage.
    pub fn get(&self, stage: Stage) -> StageState {
        match stage {
            Stage::Device => self.device,
            Stage::Bind => self.bind,
            Stage::Preview => self.preview,
        }
    }

    /// Set the status of a stage.
    pub fn set(&mut self, stage: Stage, state: StageState) {
        match stage {
            Stage::Device => self.device = state,
            Stage::Bind => self.bind = state,
            Stage::Preview => self.preview = state,
        }
    }

    /// Whether every stage below `stage` is `Started`.
    pub fn can_start(&self, stage: Stage) -> bool {
        let mut below = stage.previous();
        while let Some(lower) = below {
            if !self.get(lower).is_started() {
                return false;
            }
            below = lower.previous();
        }
        true
    }

    /// Whether no stage above `stage` is still running.
    pub fn can_stop(&self, stage: Stage) -> bool {
        let mut above = stage.next();
        while let Some(upper) = above {
            if !self.get(upper).is_off() {
                return false;
            }
            above = upper.next();
        }
        true
    }

    /// Whether every stage is `Started`.
    pub fn all_started(&self) -> bool {
        Stage::ALL.iter().all(|s| self.get(*s).is_started())
    }

    /// Whether every stage is `Off`.
    pub fn all_off(&self) -> bool {
        Stage::ALL.iter().all(|s| self.get(*s).is_off())
    }

    /// Checks the ordering invariant: a stage reports `Started` only if all
    /// lower stages are `Started`.
    pub fn is_consistent(&self) -> bool {
        Stage::ALL
            .iter()
            .all(|s| !self.get(*s).is_started() || self.can_start(*s))
    }
}

/// Reason a recording ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Caller asked to stop.
    #[default]
    User,

    /// The maximum duration was reached.
    MaxDuration,

    /// The maximum file size was reached.
    MaxSize,
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> &'static str {
        match self {
            Self::User => "Recording stopped by user",
            Self::MaxDuration => "Maximum duration reached",
            Self::MaxSize => "Maximum size reached",
        }
    }
}
