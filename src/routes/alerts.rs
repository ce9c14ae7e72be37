use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::Alert;
use crate::state::AppState;
use crate::workflow::{alerts, types::AlertStatus};

#[derive(Serialize)]
pub struct AlertView {
    pub id: Uuid,
    pub document_id: Uuid,
    pub stage_id: Uuid,
    pub kind: String,
    pub status: String,
    pub message: String,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}

impl From<Alert> for AlertView {
    fn from(alert: Alert) -> Self {
        Self {
            id: alert.id,
            document_id: alert.document_id,
            stage_id: alert.stage_id,
            kind: alert.kind,
            status: alert.status,
            message: alert.message,
            created_at: alert.created_at,
            read_at: alert.read_at,
        }
    }
}

#[derive(Deserialize)]
pub struct InboxQuery {
    pub status: Option<AlertStatus>,
}

/// The caller's own alerts.
pub async fn list_inbox(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<InboxQuery>,
) -> AppResult<Json<Vec<AlertView>>> {
    let mut conn = state.db()?;
    let inbox = alerts::list_alerts(&mut conn, user.user_id, query.status)?;
    Ok(Json(inbox.into_iter().map(AlertView::from).collect()))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<AlertView>> {
    let mut conn = state.db()?;
    let alert = alerts::mark_read(&mut conn, alert_id, user.user_id, state.now())?;
    Ok(Json(alert.into()))
}
