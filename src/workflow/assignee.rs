use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::directory::Directory;
use super::types::AssigneeType;
use super::{AssigneeError, WorkflowError, WorkflowResult};

/// Who a stage (or an escalation) goes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssigneeRule {
    User {
        user_id: Uuid,
    },
    Role {
        role: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        department_id: Option<Uuid>,
    },
    DepartmentHead {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        department_id: Option<Uuid>,
    },
}

impl AssigneeRule {
    pub fn from_columns(
        assignee_type: &str,
        user_id: Option<Uuid>,
        role: Option<&str>,
        department_id: Option<Uuid>,
    ) -> WorkflowResult<Self> {
        let kind: AssigneeType = assignee_type.parse().map_err(WorkflowError::Validation)?;
        match kind {
            AssigneeType::User => user_id
                .map(|user_id| AssigneeRule::User { user_id })
                .ok_or_else(|| WorkflowError::validation("user assignee requires a user id")),
            AssigneeType::Role => match role.map(str::trim) {
                Some(role) if !role.is_empty() => Ok(AssigneeRule::Role {
                    role: role.to_string(),
                    department_id,
                }),
                _ => Err(WorkflowError::validation("role assignee requires a role")),
            },
            AssigneeType::DepartmentHead => Ok(AssigneeRule::DepartmentHead { department_id }),
        }
    }

    pub fn assignee_type(&self) -> AssigneeType {
        match self {
            AssigneeRule::User { .. } => AssigneeType::User,
            AssigneeRule::Role { .. } => AssigneeType::Role,
            AssigneeRule::DepartmentHead { .. } => AssigneeType::DepartmentHead,
        }
    }

    /// `(user_id, role, department_id)` column values for this rule.
    pub fn columns(&self) -> (Option<Uuid>, Option<String>, Option<Uuid>) {
        match self {
            AssigneeRule::User { user_id } => (Some(*user_id), None, None),
            AssigneeRule::Role {
                role,
                department_id,
            } => (None, Some(role.clone()), *department_id),
            AssigneeRule::DepartmentHead { department_id } => (None, None, *department_id),
        }
    }
}

/// Longest grace period a policy may carry: one year.
pub const MAX_GRACE_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub target: AssigneeRule,
    #[serde(default)]
    pub grace_hours: i64,
}

impl EscalationPolicy {
    pub fn from_json(value: Option<&serde_json::Value>) -> WorkflowResult<Option<Self>> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => {
                let policy: Self = serde_json::from_value(value.clone()).map_err(|err| {
                    WorkflowError::validation(format!("invalid escalation policy: {err}"))
                })?;
                policy.validate()?;
                Ok(Some(policy))
            }
        }
    }

    pub fn validate(&self) -> WorkflowResult<()> {
        if self.grace_hours < 0 {
            return Err(WorkflowError::validation(
                "escalation grace_hours must not be negative",
            ));
        }
        if self.grace_hours > MAX_GRACE_HOURS {
            return Err(WorkflowError::validation(format!(
                "escalation grace_hours must not exceed {MAX_GRACE_HOURS}"
            )));
        }
        Ok(())
    }
}

/// Department context a rule is resolved against.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolutionContext {
    pub document_department_id: Option<Uuid>,
    pub template_department_id: Option<Uuid>,
}

impl ResolutionContext {
    fn department_for(&self, explicit: Option<Uuid>) -> Option<Uuid> {
        explicit
            .or(self.document_department_id)
            .or(self.template_department_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAssignee {
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
}

pub fn resolve_assignee<D: Directory + ?Sized>(
    directory: &mut D,
    rule: &AssigneeRule,
    ctx: &ResolutionContext,
) -> WorkflowResult<ResolvedAssignee> {
    match rule {
        AssigneeRule::User { user_id } => match directory.resolve_user(*user_id)? {
            Some(user) if user.is_active => Ok(ResolvedAssignee {
                user_id: user.id,
                department_id: user.department_id,
            }),
            _ => Err(AssigneeError::AssigneeNotFound(*user_id).into()),
        },
        AssigneeRule::Role {
            role,
            department_id,
        } => {
            let department_id = ctx
                .department_for(*department_id)
                .ok_or(AssigneeError::MissingDepartment("role"))?;
            let holder = directory
                .find_active_by_role_in_department(role, department_id)?
                .ok_or_else(|| AssigneeError::NoRoleHolder {
                    role: role.clone(),
                    department_id,
                })?;
            Ok(ResolvedAssignee {
                user_id: holder.id,
                department_id: Some(department_id),
            })
        }
        AssigneeRule::DepartmentHead { department_id } => {
            let department_id = ctx
                .department_for(*department_id)
                .ok_or(AssigneeError::MissingDepartment("department_head"))?;
            let chief = directory
                .get_department_chief(department_id)?
                .ok_or(AssigneeError::NoDepartmentHead(department_id))?;
            match directory.resolve_user(chief)? {
                Some(user) if user.is_active => Ok(ResolvedAssignee {
                    user_id: user.id,
                    department_id: Some(department_id),
                }),
                _ => Err(AssigneeError::NoDepartmentHead(department_id).into()),
            }
        }
    }
}
