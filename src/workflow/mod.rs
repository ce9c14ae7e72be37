//! Document routing core: route instantiation, the stage state machine,
//! deadline escalation, the audit timeline and the registration journal.
//!
//! Every mutating entry point takes the document's advisory lock inside its
//! own transaction, so the HTTP layer and the deadline scan serialize per
//! document.

pub mod alerts;
pub mod assignee;
pub mod deadlines;
pub mod delegations;
pub mod directory;
pub mod documents;
pub mod engine;
pub mod error;
pub mod notify;
pub mod plan;
pub mod registration;
pub mod state_machine;
pub mod timeline;
pub mod types;

use uuid::Uuid;

use crate::auth::permissions::{authorize, Permission};

pub use error::{AssigneeError, WorkflowError, WorkflowResult};

/// The user an operation runs on behalf of, with their home department and
/// the permissions of their system role.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub department_id: Option<Uuid>,
    pub permissions: &'static [Permission],
}

impl Actor {
    pub fn require(&self, permission: Permission) -> WorkflowResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(permission))
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        authorize(self.permissions, permission)
    }
}
