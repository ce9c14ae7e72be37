use thiserror::Error;
use uuid::Uuid;

use crate::auth::permissions::Permission;
use crate::jobs::JobQueueError;

#[derive(Debug, Error)]
pub enum AssigneeError {
    #[error("assignee {0} does not exist or is inactive")]
    AssigneeNotFound(Uuid),
    #[error("no active holder of role `{role}` in department {department_id}")]
    NoRoleHolder { role: String, department_id: Uuid },
    #[error("department {0} has no active head")]
    NoDepartmentHead(Uuid),
    #[error("no department context to resolve a {0} assignee")]
    MissingDepartment(&'static str),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("actor is not the owner of this stage")]
    NotStageOwner,
    #[error("missing permission `{}`", .0.as_str())]
    Forbidden(Permission),
    #[error("assignee resolution failed: {0}")]
    AssigneeResolution(#[from] AssigneeError),
    #[error("document is already registered")]
    AlreadyRegistered,
    #[error("route template is inactive")]
    TemplateInactive,
    #[error("stage was modified concurrently")]
    ConcurrentModification,
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(diesel::result::Error),
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::InvalidState(_) => "invalid_state",
            WorkflowError::NotStageOwner => "not_stage_owner",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::AssigneeResolution(_) => "assignee_resolution_failure",
            WorkflowError::AlreadyRegistered => "already_registered",
            WorkflowError::TemplateInactive => "template_inactive",
            WorkflowError::ConcurrentModification => "concurrent_modification",
            WorkflowError::Validation(_) => "validation",
            WorkflowError::Database(_) => "database",
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        WorkflowError::InvalidState(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }
}

impl From<diesel::result::Error> for WorkflowError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => WorkflowError::NotFound("record"),
            other => WorkflowError::Database(other),
        }
    }
}

impl From<JobQueueError> for WorkflowError {
    fn from(value: JobQueueError) -> Self {
        match value {
            JobQueueError::Database(err) => err.into(),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
