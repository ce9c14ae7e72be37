//! Append-only audit trail. Nothing here updates or deletes a row.

use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use super::types::TimelineEventType;
use super::{WorkflowError, WorkflowResult};
use crate::models::{DocumentReply, NewDocumentReply, NewTimelineEvent, TimelineEvent};
use crate::schema::{document_replies, timeline_events};

#[derive(Debug, Clone)]
pub struct EventDraft {
    document_id: Uuid,
    event_type: TimelineEventType,
    actor_user_id: Option<Uuid>,
    route_id: Option<Uuid>,
    stage_id: Option<Uuid>,
    parent_event_id: Option<Uuid>,
    payload: Value,
}

impl EventDraft {
    pub fn new(document_id: Uuid, event_type: TimelineEventType) -> Self {
        Self {
            document_id,
            event_type,
            actor_user_id: None,
            route_id: None,
            stage_id: None,
            parent_event_id: None,
            payload: json!({}),
        }
    }

    /// `None` means the system acted (e.g. the deadline scan).
    pub fn actor(mut self, user_id: Option<Uuid>) -> Self {
        self.actor_user_id = user_id;
        self
    }

    pub fn route(mut self, route_id: Uuid) -> Self {
        self.route_id = Some(route_id);
        self
    }

    pub fn stage(mut self, stage_id: Uuid) -> Self {
        self.stage_id = Some(stage_id);
        self
    }

    pub fn parent(mut self, parent_event_id: Option<Uuid>) -> Self {
        self.parent_event_id = parent_event_id;
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

pub fn record_event(
    conn: &mut PgConnection,
    draft: EventDraft,
    now: NaiveDateTime,
) -> WorkflowResult<TimelineEvent> {
    let new_event = NewTimelineEvent {
        id: Uuid::new_v4(),
        document_id: draft.document_id,
        event_type: draft.event_type.as_str().to_string(),
        actor_user_id: draft.actor_user_id,
        route_id: draft.route_id,
        stage_id: draft.stage_id,
        parent_event_id: draft.parent_event_id,
        payload: draft.payload,
        created_at: now,
    };

    let event = diesel::insert_into(timeline_events::table)
        .values(&new_event)
        .returning(TimelineEvent::as_returning())
        .get_result(conn)?;
    Ok(event)
}

pub fn list_events(conn: &mut PgConnection, document_id: Uuid) -> WorkflowResult<Vec<TimelineEvent>> {
    let events = timeline_events::table
        .filter(timeline_events::document_id.eq(document_id))
        .order(timeline_events::seq.asc())
        .select(TimelineEvent::as_select())
        .load(conn)?;
    Ok(events)
}

/// Adds a reply and its `reply` event. A root reply starts its own thread;
/// a child joins the parent's thread and links to the parent's event.
pub fn add_reply(
    conn: &mut PgConnection,
    document_id: Uuid,
    author_user_id: Uuid,
    parent_reply_id: Option<Uuid>,
    body: &str,
    now: NaiveDateTime,
) -> WorkflowResult<(DocumentReply, TimelineEvent)> {
    let body = body.trim();
    if body.is_empty() {
        return Err(WorkflowError::validation("reply body must not be empty"));
    }

    let parent = match parent_reply_id {
        Some(parent_id) => {
            let parent: DocumentReply = document_replies::table
                .find(parent_id)
                .select(DocumentReply::as_select())
                .first(conn)
                .optional()?
                .ok_or(WorkflowError::NotFound("parent reply"))?;
            if parent.document_id != document_id {
                return Err(WorkflowError::validation(
                    "parent reply belongs to another document",
                ));
            }
            Some(parent)
        }
        None => None,
    };

    let reply_id = Uuid::new_v4();
    let thread_id = parent
        .as_ref()
        .map(|parent| parent.thread_id)
        .unwrap_or(reply_id);

    let event = record_event(
        conn,
        EventDraft::new(document_id, TimelineEventType::Reply)
            .actor(Some(author_user_id))
            .parent(parent.as_ref().map(|parent| parent.timeline_event_id))
            .payload(json!({
                "reply_id": reply_id,
                "thread_id": thread_id,
            })),
        now,
    )?;

    let new_reply = NewDocumentReply {
        id: reply_id,
        document_id,
        timeline_event_id: event.id,
        thread_id,
        parent_reply_id,
        author_user_id,
        body: body.to_string(),
        created_at: now,
    };
    let reply = diesel::insert_into(document_replies::table)
        .values(&new_reply)
        .returning(DocumentReply::as_returning())
        .get_result(conn)?;

    Ok((reply, event))
}

pub fn list_replies(conn: &mut PgConnection, document_id: Uuid) -> WorkflowResult<Vec<DocumentReply>> {
    let replies = document_replies::table
        .filter(document_replies::document_id.eq(document_id))
        .order((
            document_replies::thread_id.asc(),
            document_replies::created_at.asc(),
            document_replies::id.asc(),
        ))
        .select(DocumentReply::as_select())
        .load(conn)?;
    Ok(replies)
}
