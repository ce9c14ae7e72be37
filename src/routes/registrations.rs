use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{permissions::Permission, AuthenticatedUser};
use crate::error::AppResult;
use crate::state::AppState;
use crate::workflow::{
    registration::{self, RegistrationFilter},
    types::{JournalType, RegistrationStatus},
};

use super::documents::RegistrationView;

#[derive(Deserialize)]
pub struct ListRegistrationsQuery {
    pub journal_type: Option<JournalType>,
    pub status: Option<RegistrationStatus>,
    pub document_id: Option<Uuid>,
}

pub async fn list_registrations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListRegistrationsQuery>,
) -> AppResult<Json<Vec<RegistrationView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let filter = RegistrationFilter {
        journal_type: query.journal_type,
        status: query.status,
        document_id: query.document_id,
    };
    let entries = registration::list_registrations(&mut conn, &filter)?;
    Ok(Json(entries.into_iter().map(RegistrationView::from).collect()))
}

#[derive(Deserialize)]
pub struct CancelRegistrationRequest {
    pub reason: Option<String>,
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(registration_id): Path<Uuid>,
    Json(payload): Json<CancelRegistrationRequest>,
) -> AppResult<Json<RegistrationView>> {
    let mut conn = state.db()?;
    let entry = registration::cancel_registration(
        &mut conn,
        &user.actor(),
        registration_id,
        payload.reason,
        state.now(),
    )?;
    Ok(Json(entry.into()))
}
