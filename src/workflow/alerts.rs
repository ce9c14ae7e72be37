use chrono::NaiveDateTime;
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::select;
use serde_json::json;
use uuid::Uuid;

use super::notify::{enqueue_notification, Notification};
use super::types::{AlertKind, AlertStatus};
use super::{WorkflowError, WorkflowResult};
use crate::models::{Alert, NewAlert};
use crate::schema::alerts;

#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub document_id: Uuid,
    pub stage_id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: AlertKind,
    pub message: String,
}

/// Emits an alert unless one of the same kind already exists for the stage.
/// Returns `None` when nothing was written. Concurrent emitters collide on the
/// unread (stage, kind) index and the loser writes nothing.
pub fn emit_alert(
    conn: &mut PgConnection,
    draft: AlertDraft,
    now: NaiveDateTime,
) -> WorkflowResult<Option<Alert>> {
    let already_alerted: bool = select(exists(
        alerts::table
            .filter(alerts::stage_id.eq(draft.stage_id))
            .filter(alerts::kind.eq(draft.kind.as_str())),
    ))
    .get_result(conn)?;
    if already_alerted {
        return Ok(None);
    }

    let new_alert = NewAlert {
        id: Uuid::new_v4(),
        document_id: draft.document_id,
        stage_id: draft.stage_id,
        recipient_user_id: draft.recipient_user_id,
        kind: draft.kind.as_str().to_string(),
        status: AlertStatus::Unread.as_str().to_string(),
        message: draft.message,
        created_at: now,
    };

    let inserted: Option<Alert> = diesel::insert_into(alerts::table)
        .values(&new_alert)
        .on_conflict_do_nothing()
        .returning(Alert::as_returning())
        .get_result(conn)
        .optional()?;

    if let Some(alert) = &inserted {
        enqueue_notification(
            conn,
            &Notification {
                recipient_user_id: alert.recipient_user_id,
                kind: alert.kind.clone(),
                message: alert.message.clone(),
                metadata: json!({
                    "alert_id": alert.id,
                    "document_id": alert.document_id,
                    "stage_id": alert.stage_id,
                }),
            },
        )?;
    }

    Ok(inserted)
}

pub fn list_alerts(
    conn: &mut PgConnection,
    recipient_user_id: Uuid,
    status: Option<AlertStatus>,
) -> WorkflowResult<Vec<Alert>> {
    let mut query = alerts::table
        .filter(alerts::recipient_user_id.eq(recipient_user_id))
        .select(Alert::as_select())
        .order((alerts::created_at.desc(), alerts::id.asc()))
        .into_boxed();
    if let Some(status) = status {
        query = query.filter(alerts::status.eq(status.as_str()));
    }
    Ok(query.load(conn)?)
}

/// Marks an alert read. Only the recipient can see or touch it.
pub fn mark_read(
    conn: &mut PgConnection,
    alert_id: Uuid,
    recipient_user_id: Uuid,
    now: NaiveDateTime,
) -> WorkflowResult<Alert> {
    let alert: Alert = alerts::table
        .find(alert_id)
        .filter(alerts::recipient_user_id.eq(recipient_user_id))
        .select(Alert::as_select())
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("alert"))?;

    if alert.status == AlertStatus::Read.as_str() {
        return Ok(alert);
    }

    let updated = diesel::update(
        alerts::table
            .find(alert_id)
            .filter(alerts::status.eq(AlertStatus::Unread.as_str())),
    )
    .set((
        alerts::status.eq(AlertStatus::Read.as_str()),
        alerts::read_at.eq(Some(now)),
    ))
    .returning(Alert::as_returning())
    .get_result(conn)
    .optional()?;

    match updated {
        Some(alert) => Ok(alert),
        None => Ok(alerts::table
            .find(alert_id)
            .select(Alert::as_select())
            .first(conn)?),
    }
}
