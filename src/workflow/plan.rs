use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::assignee::{
    resolve_assignee, AssigneeRule, EscalationPolicy, ResolutionContext, ResolvedAssignee,
};
use super::directory::Directory;
use super::types::{StageState, StageType};
use super::{WorkflowError, WorkflowResult};
use crate::models::RouteTemplateStage;

/// One stage of a template, or of an ad hoc route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub order_no: i32,
    #[serde(default)]
    pub stage_group_no: Option<i32>,
    pub stage_type: StageType,
    pub assignee: AssigneeRule,
    #[serde(default)]
    pub due_in_hours: Option<i32>,
    #[serde(default)]
    pub escalation_policy: Option<EscalationPolicy>,
}

impl StageDefinition {
    pub fn from_template_stage(stage: &RouteTemplateStage) -> WorkflowResult<Self> {
        Ok(Self {
            order_no: stage.order_no,
            stage_group_no: stage.stage_group_no,
            stage_type: stage.stage_type.parse().map_err(WorkflowError::Validation)?,
            assignee: AssigneeRule::from_columns(
                &stage.assignee_type,
                stage.assignee_user_id,
                stage.assignee_role.as_deref(),
                stage.assignee_department_id,
            )?,
            due_in_hours: stage.due_in_hours,
            escalation_policy: EscalationPolicy::from_json(stage.escalation_policy.as_ref())?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStage {
    pub order_no: i32,
    pub stage_group_no: Option<i32>,
    pub step_no: i32,
    pub stage_type: StageType,
    pub state: StageState,
    pub rule: AssigneeRule,
    pub assignee: ResolvedAssignee,
    pub due_at: Option<NaiveDateTime>,
    pub escalation_policy: Option<EscalationPolicy>,
}

pub fn validate_definitions(definitions: &[StageDefinition]) -> WorkflowResult<()> {
    if definitions.is_empty() {
        return Err(WorkflowError::validation("a route needs at least one stage"));
    }
    let mut seen = HashSet::new();
    for definition in definitions {
        if !seen.insert(definition.order_no) {
            return Err(WorkflowError::validation(format!(
                "duplicate order_no {}",
                definition.order_no
            )));
        }
        if matches!(definition.due_in_hours, Some(hours) if hours <= 0) {
            return Err(WorkflowError::validation("due_in_hours must be positive"));
        }
        if let Some(policy) = &definition.escalation_policy {
            policy.validate()?;
        }
    }
    Ok(())
}

/// Step index per definition, for definitions already sorted by `order_no`.
/// Adjacent stages sharing a `stage_group_no` run in the same step.
pub fn assign_steps(sorted: &[StageDefinition]) -> Vec<i32> {
    let mut steps = Vec::with_capacity(sorted.len());
    let mut step = -1;
    let mut previous_group: Option<i32> = None;
    for definition in sorted {
        let joins_previous = matches!(
            (definition.stage_group_no, previous_group),
            (Some(group), Some(prev)) if group == prev
        );
        if !joins_previous || steps.is_empty() {
            step += 1;
        }
        steps.push(step);
        previous_group = definition.stage_group_no;
    }
    steps
}

/// Resolves every assignee and lays the stages out in execution order. Any
/// resolution failure aborts the whole plan.
pub fn plan_route<D: Directory + ?Sized>(
    directory: &mut D,
    mut definitions: Vec<StageDefinition>,
    ctx: &ResolutionContext,
    now: NaiveDateTime,
) -> WorkflowResult<Vec<PlannedStage>> {
    validate_definitions(&definitions)?;
    definitions.sort_by_key(|definition| definition.order_no);
    let steps = assign_steps(&definitions);

    definitions
        .into_iter()
        .zip(steps)
        .map(|(definition, step_no)| {
            let assignee = resolve_assignee(directory, &definition.assignee, ctx)?;
            let state = if step_no == 0 {
                StageState::Active
            } else {
                StageState::Pending
            };
            Ok(PlannedStage {
                order_no: definition.order_no,
                stage_group_no: definition.stage_group_no,
                step_no,
                stage_type: definition.stage_type,
                state,
                due_at: definition
                    .due_in_hours
                    .map(|hours| now + Duration::hours(i64::from(hours))),
                rule: definition.assignee,
                assignee,
                escalation_policy: definition.escalation_policy,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::directory::memory::MemoryDirectory;
    use crate::workflow::AssigneeError;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn user_stage(order_no: i32, group: Option<i32>, user_id: Uuid) -> StageDefinition {
        StageDefinition {
            order_no,
            stage_group_no: group,
            stage_type: StageType::Review,
            assignee: AssigneeRule::User { user_id },
            due_in_hours: None,
            escalation_policy: None,
        }
    }

    #[test]
    fn n_stages_produce_n_planned_in_order_with_due_dates() {
        let mut dir = MemoryDirectory::default();
        let user = dir.add_user(None, true);
        let mut definitions: Vec<StageDefinition> = (1..=4)
            .rev()
            .map(|order| StageDefinition {
                due_in_hours: Some(order * 8),
                ..user_stage(order, None, user)
            })
            .collect();
        definitions[0].stage_type = StageType::Approve;

        let planned =
            plan_route(&mut dir, definitions, &ResolutionContext::default(), now()).unwrap();

        assert_eq!(planned.len(), 4);
        let orders: Vec<i32> = planned.iter().map(|stage| stage.order_no).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        for stage in &planned {
            assert_eq!(
                stage.due_at,
                Some(now() + Duration::hours(i64::from(stage.order_no * 8)))
            );
        }
        assert_eq!(planned[3].stage_type, StageType::Approve);
    }

    #[test]
    fn only_first_step_starts_active() {
        let mut dir = MemoryDirectory::default();
        let user = dir.add_user(None, true);
        let definitions = vec![
            user_stage(1, Some(7), user),
            user_stage(2, Some(7), user),
            user_stage(3, None, user),
        ];
        let planned =
            plan_route(&mut dir, definitions, &ResolutionContext::default(), now()).unwrap();

        let states: Vec<StageState> = planned.iter().map(|stage| stage.state).collect();
        assert_eq!(
            states,
            vec![StageState::Active, StageState::Active, StageState::Pending]
        );
        assert!(planned.iter().all(|stage| stage.due_at.is_none()));
    }

    #[test]
    fn groups_only_merge_adjacent_stages() {
        let user = Uuid::new_v4();
        let sorted = vec![
            user_stage(1, None, user),
            user_stage(2, Some(1), user),
            user_stage(3, Some(1), user),
            user_stage(4, Some(2), user),
            user_stage(5, Some(1), user),
            user_stage(6, None, user),
            user_stage(7, None, user),
        ];
        assert_eq!(assign_steps(&sorted), vec![0, 1, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn resolution_failure_aborts_plan() {
        let mut dir = MemoryDirectory::default();
        let user = dir.add_user(None, true);
        let dept = Uuid::new_v4();
        let definitions = vec![
            user_stage(1, None, user),
            StageDefinition {
                assignee: AssigneeRule::Role {
                    role: "manager".into(),
                    department_id: Some(dept),
                },
                ..user_stage(2, None, user)
            },
        ];
        let err = plan_route(&mut dir, definitions, &ResolutionContext::default(), now())
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::AssigneeResolution(AssigneeError::NoRoleHolder { .. })
        ));
    }

    #[test]
    fn rejects_empty_and_duplicate_definitions() {
        let mut dir = MemoryDirectory::default();
        let user = dir.add_user(None, true);
        assert!(matches!(
            plan_route(&mut dir, vec![], &ResolutionContext::default(), now()),
            Err(WorkflowError::Validation(_))
        ));
        let duplicate = vec![user_stage(1, None, user), user_stage(1, None, user)];
        assert!(matches!(
            plan_route(&mut dir, duplicate, &ResolutionContext::default(), now()),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn rejects_grace_beyond_the_limit() {
        let user = Uuid::new_v4();
        let mut definition = user_stage(1, None, user);
        definition.escalation_policy = Some(EscalationPolicy {
            target: AssigneeRule::DepartmentHead {
                department_id: None,
            },
            grace_hours: 100_000_000_000,
        });
        assert!(matches!(
            validate_definitions(&[definition]),
            Err(WorkflowError::Validation(_))
        ));
    }
}
