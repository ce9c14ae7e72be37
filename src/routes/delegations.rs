use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::Delegation;
use crate::state::AppState;
use crate::workflow::delegations::{self, DelegationRequest};

#[derive(Serialize)]
pub struct DelegationView {
    pub id: Uuid,
    pub delegator_user_id: Uuid,
    pub delegate_user_id: Uuid,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl From<Delegation> for DelegationView {
    fn from(delegation: Delegation) -> Self {
        Self {
            id: delegation.id,
            delegator_user_id: delegation.delegator_user_id,
            delegate_user_id: delegation.delegate_user_id,
            starts_at: delegation.starts_at,
            ends_at: delegation.ends_at,
            reason: delegation.reason,
            revoked_at: delegation.revoked_at,
            created_at: delegation.created_at,
        }
    }
}

pub async fn list_delegations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DelegationView>>> {
    let mut conn = state.db()?;
    let rows = delegations::list_delegations(&mut conn, user.user_id)?;
    Ok(Json(rows.into_iter().map(DelegationView::from).collect()))
}

#[derive(Deserialize)]
pub struct CreateDelegationRequest {
    pub delegate_user_id: Uuid,
    pub starts_at: Option<NaiveDateTime>,
    pub ends_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
}

pub async fn create_delegation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateDelegationRequest>,
) -> AppResult<(StatusCode, Json<DelegationView>)> {
    let mut conn = state.db()?;
    let delegation = delegations::create_delegation(
        &mut conn,
        &user.actor(),
        DelegationRequest {
            delegate_user_id: payload.delegate_user_id,
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
            reason: payload.reason,
        },
        state.now(),
    )?;
    Ok((StatusCode::CREATED, Json(delegation.into())))
}

pub async fn revoke_delegation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(delegation_id): Path<Uuid>,
) -> AppResult<Json<DelegationView>> {
    let mut conn = state.db()?;
    let delegation =
        delegations::revoke_delegation(&mut conn, &user.actor(), delegation_id, state.now())?;
    Ok(Json(delegation.into()))
}
