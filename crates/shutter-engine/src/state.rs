//! Lifecycle operations and the stage transitions they expand to.

use shutter_ipc::{Stage, StageStates};

/// A caller-visible lifecycle operation. Operations are queued and run one
/// at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOp {
    Start,
    Stop,
    RestartBind,
    RestartPreview,
}

impl LifecycleOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::RestartBind => "restart_bind",
            Self::RestartPreview => "restart_preview",
        }
    }
}

/// One step of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start(Stage),
    Stop(Stage),
}

/// Stop every stage that is not off, top-down.
pub fn teardown(states: &StageStates) -> Vec<Transition> {
    Stage::ALL
        .iter()
        .rev()
        .filter(|s| !states.get(**s).is_off())
        .map(|s| Transition::Stop(*s))
        .collect()
}

/// Expand `op` into steps against the current stage states.
///
/// Starting what is started and stopping what is off are no-ops. Restarts
/// only apply while the stage below the restarted one is running.
pub fn plan(op: LifecycleOp, states: &StageStates) -> Vec<Transition> {
    match op {
        LifecycleOp::Start => Stage::ALL
            .iter()
            .filter(|s| !states.get(**s).is_started())
            .map(|s| Transition::Start(*s))
            .collect(),
        LifecycleOp::Stop => teardown(states),
        LifecycleOp::RestartBind => restart_from(Stage::Bind, states),
        LifecycleOp::RestartPreview => restart_from(Stage::Preview, states),
    }
}

fn restart_from(stage: Stage, states: &StageStates) -> Vec<Transition> {
    if !states.can_start(stage) {
        return Vec::new();
    }
    let affected: Vec<Stage> = Stage::ALL.iter().copied().filter(|s| *s >= stage).collect();

    let mut steps: Vec<Transition> = affected
        .iter()
        .rev()
        .filter(|s| !states.get(**s).is_off())
        .map(|s| Transition::Stop(*s))
        .collect();
    steps.extend(affected.iter().map(|s| Transition::Start(*s)));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_ipc::StageState;

    fn started() -> StageStates {
        StageStates {
            device: StageState::Started,
            bind: StageState::Started,
            preview: StageState::Started,
        }
    }

    #[test]
    fn test_start_from_off() {
        assert_eq!(
            plan(LifecycleOp::Start, &StageStates::default()),
            vec![
                Transition::Start(Stage::Device),
                Transition::Start(Stage::Bind),
                Transition::Start(Stage::Preview),
            ]
        );
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        assert!(plan(LifecycleOp::Start, &started()).is_empty());
        assert!(plan(LifecycleOp::Stop, &StageStates::default()).is_empty());
    }

    #[test]
    fn test_stop_is_top_down() {
        assert_eq!(
            plan(LifecycleOp::Stop, &started()),
            vec![
                Transition::Stop(Stage::Preview),
                Transition::Stop(Stage::Bind),
                Transition::Stop(Stage::Device),
            ]
        );
    }

    #[test]
    fn test_restart_bind_keeps_device() {
        assert_eq!(
            plan(LifecycleOp::RestartBind, &started()),
            vec![
                Transition::Stop(Stage::Preview),
                Transition::Stop(Stage::Bind),
                Transition::Start(Stage::Bind),
                Transition::Start(Stage::Preview),
            ]
        );
    }

    #[test]
    fn test_restart_without_device_is_noop() {
        assert!(plan(LifecycleOp::RestartBind, &StageStates::default()).is_empty());

        let device_only = StageStates {
            device: StageState::Started,
            ..Default::default()
        };
        assert!(plan(LifecycleOp::RestartPreview, &device_only).is_empty());
        assert_eq!(
            plan(LifecycleOp::RestartBind, &device_only),
            vec![Transition::Start(Stage::Bind), Transition::Start(Stage::Preview)]
        );
    }
}
