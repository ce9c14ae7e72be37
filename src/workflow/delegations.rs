use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::select;
use uuid::Uuid;

use super::{Actor, WorkflowError, WorkflowResult};
use crate::auth::permissions::Permission;
use crate::models::{Delegation, NewDelegation};
use crate::schema::{delegations, users};

#[derive(Debug, Clone)]
pub struct DelegationRequest {
    pub delegate_user_id: Uuid,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
}

pub fn create_delegation(
    conn: &mut PgConnection,
    actor: &Actor,
    request: DelegationRequest,
    now: NaiveDateTime,
) -> WorkflowResult<Delegation> {
    if request.delegate_user_id == actor.user_id {
        return Err(WorkflowError::validation("cannot delegate to yourself"));
    }
    let starts_at = request.starts_at.unwrap_or(now);
    if matches!(request.ends_at, Some(ends_at) if ends_at <= starts_at) {
        return Err(WorkflowError::validation("ends_at must be after starts_at"));
    }

    let delegate_active: Option<bool> = users::table
        .find(request.delegate_user_id)
        .select(users::is_active)
        .first(conn)
        .optional()?;
    if delegate_active != Some(true) {
        return Err(WorkflowError::NotFound("delegate"));
    }

    let new_delegation = NewDelegation {
        id: Uuid::new_v4(),
        delegator_user_id: actor.user_id,
        delegate_user_id: request.delegate_user_id,
        starts_at,
        ends_at: request.ends_at,
        reason: request
            .reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty()),
    };

    Ok(diesel::insert_into(delegations::table)
        .values(&new_delegation)
        .returning(Delegation::as_returning())
        .get_result(conn)?)
}

/// Delegations the user gave or received, newest first.
pub fn list_delegations(conn: &mut PgConnection, user_id: Uuid) -> WorkflowResult<Vec<Delegation>> {
    Ok(delegations::table
        .filter(
            delegations::delegator_user_id
                .eq(user_id)
                .or(delegations::delegate_user_id.eq(user_id)),
        )
        .order((delegations::created_at.desc(), delegations::id.asc()))
        .select(Delegation::as_select())
        .load(conn)?)
}

pub fn revoke_delegation(
    conn: &mut PgConnection,
    actor: &Actor,
    delegation_id: Uuid,
    now: NaiveDateTime,
) -> WorkflowResult<Delegation> {
    let delegation: Delegation = delegations::table
        .find(delegation_id)
        .select(Delegation::as_select())
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("delegation"))?;

    if delegation.delegator_user_id != actor.user_id {
        actor.require(Permission::DirectoryManage)?;
    }
    if delegation.revoked_at.is_some() {
        return Ok(delegation);
    }

    Ok(diesel::update(delegations::table.find(delegation_id))
        .set(delegations::revoked_at.eq(Some(now)))
        .returning(Delegation::as_returning())
        .get_result(conn)?)
}

/// True when `delegate` holds a delegation in force at `now` from any of
/// `principals`.
pub fn acts_for_any(
    conn: &mut PgConnection,
    delegate: Uuid,
    principals: &[Uuid],
    now: NaiveDateTime,
) -> WorkflowResult<bool> {
    if principals.is_empty() {
        return Ok(false);
    }
    Ok(select(exists(
        delegations::table
            .filter(delegations::delegate_user_id.eq(delegate))
            .filter(delegations::delegator_user_id.eq_any(principals))
            .filter(delegations::revoked_at.is_null())
            .filter(delegations::starts_at.le(now))
            .filter(
                delegations::ends_at
                    .is_null()
                    .or(delegations::ends_at.gt(now)),
            ),
    ))
    .get_result(conn)?)
}
