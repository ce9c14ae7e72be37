//! Stage transitions, independent of storage.
//!
//! `pending → active → {done, skipped, escalated}` and `escalated → done`.
//! Open stages may also be skipped when a route is short-circuited.

use uuid::Uuid;

use super::types::{StageAction, StageOutcome, StageState, StageType};
use super::{WorkflowError, WorkflowResult};

impl StageState {
    pub fn is_settled(self) -> bool {
        matches!(self, StageState::Done | StageState::Skipped)
    }

    pub fn is_actionable(self) -> bool {
        matches!(self, StageState::Active | StageState::Escalated)
    }

    pub fn can_transition_to(self, next: StageState) -> bool {
        use StageState::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Skipped)
                | (Pending, Escalated)
                | (Active, Done)
                | (Active, Skipped)
                | (Active, Escalated)
                | (Escalated, Done)
                | (Escalated, Skipped)
        )
    }
}

impl StageAction {
    pub fn outcome(self) -> StageOutcome {
        match self {
            StageAction::Approve => StageOutcome::Approved,
            StageAction::Sign => StageOutcome::Signed,
            StageAction::CompleteReview => StageOutcome::Reviewed,
            StageAction::Reject => StageOutcome::Rejected,
        }
    }

    pub fn is_rejection(self) -> bool {
        matches!(self, StageAction::Reject)
    }
}

/// Guards every stage write against the lifecycle table.
pub fn ensure_transition(from: StageState, to: StageState) -> WorkflowResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(WorkflowError::invalid_state(format!(
            "a {from} stage cannot become {to}"
        )))
    }
}

/// The completing action a stage type accepts.
pub fn completing_action(stage_type: StageType) -> StageAction {
    match stage_type {
        StageType::Review => StageAction::CompleteReview,
        StageType::Sign => StageAction::Sign,
        StageType::Approve => StageAction::Approve,
    }
}

pub fn check_action(
    stage_type: StageType,
    state: StageState,
    action: StageAction,
) -> WorkflowResult<()> {
    if !state.is_actionable() {
        return Err(WorkflowError::invalid_state(format!(
            "stage is {state}, expected active or escalated"
        )));
    }
    if !action.is_rejection() && action != completing_action(stage_type) {
        return Err(WorkflowError::invalid_state(format!(
            "{action} does not apply to a {stage_type} stage"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSnapshot {
    pub id: Uuid,
    pub step_no: i32,
    pub state: StageState,
}

/// Lowest step that still has unsettled stages.
pub fn current_step(stages: &[StageSnapshot]) -> Option<i32> {
    stages
        .iter()
        .filter(|stage| !stage.state.is_settled())
        .map(|stage| stage.step_no)
        .min()
}

pub fn ensure_turn(stages: &[StageSnapshot], stage_id: Uuid) -> WorkflowResult<()> {
    let stage = stages
        .iter()
        .find(|stage| stage.id == stage_id)
        .ok_or(WorkflowError::NotFound("stage"))?;
    match current_step(stages) {
        Some(step) if step == stage.step_no => Ok(()),
        _ => Err(WorkflowError::invalid_state(
            "stages ordered before this one are not finished",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Some stages of the current step are still open.
    Wait,
    /// The previous step is exhausted; these pending stages start now.
    Activate { step_no: i32, stage_ids: Vec<Uuid> },
    /// Every stage is done or skipped.
    RouteComplete,
}

/// What happens after a stage settles. A step advances only when all of its
/// stages are done or skipped.
pub fn advance(stages: &[StageSnapshot]) -> Advance {
    let Some(step_no) = current_step(stages) else {
        return Advance::RouteComplete;
    };
    let stage_ids: Vec<Uuid> = stages
        .iter()
        .filter(|stage| stage.step_no == step_no && stage.state == StageState::Pending)
        .map(|stage| stage.id)
        .collect();
    if stage_ids.is_empty() {
        Advance::Wait
    } else {
        Advance::Activate { step_no, stage_ids }
    }
}

/// Stages to skip when a route is short-circuited.
pub fn open_stage_ids(stages: &[StageSnapshot]) -> Vec<Uuid> {
    stages
        .iter()
        .filter(|stage| !stage.state.is_settled())
        .map(|stage| stage.id)
        .collect()
}
