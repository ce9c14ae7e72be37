//! Read-only lookups against users, departments and org roles.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use super::WorkflowResult;
use crate::schema::{departments, user_roles, users};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
}

pub trait Directory {
    fn resolve_user(&mut self, user_id: Uuid) -> WorkflowResult<Option<DirectoryUser>>;

    /// First active holder of `role` in the department, in a stable order.
    fn find_active_by_role_in_department(
        &mut self,
        role: &str,
        department_id: Uuid,
    ) -> WorkflowResult<Option<DirectoryUser>>;

    fn get_department_chief(&mut self, department_id: Uuid) -> WorkflowResult<Option<Uuid>>;
}

pub struct PgDirectory<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgDirectory<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

impl Directory for PgDirectory<'_> {
    fn resolve_user(&mut self, user_id: Uuid) -> WorkflowResult<Option<DirectoryUser>> {
        let row = users::table
            .find(user_id)
            .select((users::id, users::department_id, users::is_active))
            .first::<(Uuid, Option<Uuid>, bool)>(self.conn)
            .optional()?;
        Ok(row.map(|(id, department_id, is_active)| DirectoryUser {
            id,
            department_id,
            is_active,
        }))
    }

    fn find_active_by_role_in_department(
        &mut self,
        role: &str,
        department_id: Uuid,
    ) -> WorkflowResult<Option<DirectoryUser>> {
        let row = users::table
            .inner_join(user_roles::table)
            .filter(user_roles::role.eq(role))
            .filter(users::department_id.eq(department_id))
            .filter(users::is_active.eq(true))
            .order((users::username.asc(), users::id.asc()))
            .select((users::id, users::department_id, users::is_active))
            .first::<(Uuid, Option<Uuid>, bool)>(self.conn)
            .optional()?;
        Ok(row.map(|(id, department_id, is_active)| DirectoryUser {
            id,
            department_id,
            is_active,
        }))
    }

    fn get_department_chief(&mut self, department_id: Uuid) -> WorkflowResult<Option<Uuid>> {
        let chief = departments::table
            .find(department_id)
            .select(departments::chief_user_id)
            .first::<Option<Uuid>>(self.conn)
            .optional()?;
        Ok(chief.flatten())
    }
}
