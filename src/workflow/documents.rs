use chrono::NaiveDateTime;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

use super::notify::{enqueue_notification, Notification};
use super::timeline::{record_event, EventDraft};
use super::types::{DocumentStatus, DocumentType, TimelineEventType};
use super::{Actor, WorkflowError, WorkflowResult};
use crate::auth::permissions::Permission;
use crate::db::lock_document;
use crate::models::{Document, NewDocument, TimelineEvent};
use crate::schema::{document_kinds, documents, users};

/// Loads a live (not soft-deleted) document.
pub fn load_document(conn: &mut PgConnection, document_id: Uuid) -> WorkflowResult<Document> {
    documents::table
        .find(document_id)
        .filter(documents::deleted_at.is_null())
        .select(Document::as_select())
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("document"))
}

pub fn document_status(document: &Document) -> WorkflowResult<DocumentStatus> {
    document.status.parse().map_err(WorkflowError::Validation)
}

#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub title: String,
    pub doc_type: DocumentType,
    pub department_id: Option<Uuid>,
    pub document_kind_id: Option<Uuid>,
    pub summary: Option<String>,
}

/// Creates a draft document. Without an explicit department it is filed
/// under the actor's department.
pub fn create_document(
    conn: &mut PgConnection,
    actor: &Actor,
    draft: DocumentDraft,
    now: NaiveDateTime,
) -> WorkflowResult<Document> {
    actor.require(Permission::DocumentsWrite)?;

    let title = draft.title.trim();
    if title.is_empty() {
        return Err(WorkflowError::validation("title must not be empty"));
    }

    conn.transaction(|conn| {
        if let Some(kind_id) = draft.document_kind_id {
            let kind_exists: i64 = document_kinds::table
                .find(kind_id)
                .count()
                .get_result(conn)?;
            if kind_exists == 0 {
                return Err(WorkflowError::NotFound("document kind"));
            }
        }

        let department_id = draft.department_id.or(actor.department_id);

        let new_document = NewDocument {
            id: Uuid::new_v4(),
            title: title.to_string(),
            doc_type: draft.doc_type.as_str().to_string(),
            status: DocumentStatus::Draft.as_str().to_string(),
            department_id,
            document_kind_id: draft.document_kind_id,
            created_by: actor.user_id,
            summary: draft.summary.clone(),
        };
        let document: Document = diesel::insert_into(documents::table)
            .values(&new_document)
            .returning(Document::as_returning())
            .get_result(conn)?;

        record_event(
            conn,
            EventDraft::new(document.id, TimelineEventType::Created)
                .actor(Some(actor.user_id))
                .payload(json!({
                    "title": document.title,
                    "doc_type": document.doc_type,
                })),
            now,
        )?;
        Ok(document)
    })
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub doc_type: Option<DocumentType>,
    pub department_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
}

pub fn list_documents(
    conn: &mut PgConnection,
    filter: &DocumentFilter,
) -> WorkflowResult<Vec<Document>> {
    let mut query = documents::table
        .filter(documents::deleted_at.is_null())
        .select(Document::as_select())
        .order((documents::created_at.desc(), documents::id.asc()))
        .into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(documents::status.eq(status.as_str()));
    }
    if let Some(doc_type) = filter.doc_type {
        query = query.filter(documents::doc_type.eq(doc_type.as_str()));
    }
    if let Some(department_id) = filter.department_id {
        query = query.filter(documents::department_id.eq(department_id));
    }
    if let Some(responsible) = filter.responsible_user_id {
        query = query.filter(documents::responsible_user_id.eq(responsible));
    }
    Ok(query.load(conn)?)
}

fn ensure_active_user(conn: &mut PgConnection, user_id: Uuid) -> WorkflowResult<()> {
    let active: Option<bool> = users::table
        .find(user_id)
        .select(users::is_active)
        .first(conn)
        .optional()?;
    match active {
        Some(true) => Ok(()),
        _ => Err(WorkflowError::NotFound("user")),
    }
}

fn ensure_not_archived(document: &Document) -> WorkflowResult<()> {
    if document_status(document)? == DocumentStatus::Archived {
        return Err(WorkflowError::invalid_state("document is archived"));
    }
    Ok(())
}

/// Sends the document to another user for attention.
pub fn forward_document(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    to_user_id: Uuid,
    note: Option<String>,
    now: NaiveDateTime,
) -> WorkflowResult<TimelineEvent> {
    actor.require(Permission::DocumentsWrite)?;
    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;
        ensure_not_archived(&document)?;
        ensure_active_user(conn, to_user_id)?;

        let event = record_event(
            conn,
            EventDraft::new(document.id, TimelineEventType::Forward)
                .actor(Some(actor.user_id))
                .payload(json!({ "to_user_id": to_user_id, "note": note })),
            now,
        )?;
        enqueue_notification(
            conn,
            &Notification {
                recipient_user_id: to_user_id,
                kind: TimelineEventType::Forward.as_str().to_string(),
                message: format!("Document \"{}\" was forwarded to you", document.title),
                metadata: json!({ "document_id": document.id, "event_id": event.id }),
            },
        )?;
        Ok(event)
    })
}

/// Sets the responsible user. The first assignment is an `assign` event,
/// later ones `reassign`.
pub fn assign_responsible(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    user_id: Uuid,
    now: NaiveDateTime,
) -> WorkflowResult<(Document, TimelineEvent)> {
    actor.require(Permission::DocumentsWrite)?;
    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;
        ensure_not_archived(&document)?;
        ensure_active_user(conn, user_id)?;

        let previous = document.responsible_user_id;
        if previous == Some(user_id) {
            return Err(WorkflowError::invalid_state(
                "user is already responsible for this document",
            ));
        }
        let event_type = if previous.is_some() {
            TimelineEventType::Reassign
        } else {
            TimelineEventType::Assign
        };

        let updated: Document = diesel::update(documents::table.find(document.id))
            .set((
                documents::responsible_user_id.eq(Some(user_id)),
                documents::updated_at.eq(now),
            ))
            .returning(Document::as_returning())
            .get_result(conn)?;
        let event = record_event(
            conn,
            EventDraft::new(document.id, event_type)
                .actor(Some(actor.user_id))
                .payload(json!({ "from_user_id": previous, "to_user_id": user_id })),
            now,
        )?;
        Ok((updated, event))
    })
}

/// Archives a document whose routing has finished.
pub fn archive_document(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    now: NaiveDateTime,
) -> WorkflowResult<Document> {
    actor.require(Permission::DocumentsArchive)?;
    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;
        let status = document_status(&document)?;
        if !status.is_archivable() {
            return Err(WorkflowError::invalid_state(format!(
                "a {status} document cannot be archived"
            )));
        }

        let archived: Document = diesel::update(documents::table.find(document.id))
            .set((
                documents::status.eq(DocumentStatus::Archived.as_str()),
                documents::updated_at.eq(now),
            ))
            .returning(Document::as_returning())
            .get_result(conn)?;
        record_event(
            conn,
            EventDraft::new(document.id, TimelineEventType::Archive)
                .actor(Some(actor.user_id))
                .payload(json!({ "previous_status": status })),
            now,
        )?;
        Ok(archived)
    })
}

/// Adds a reply under the document lock so the thread and its event land
/// together.
pub fn reply_to_document(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    parent_reply_id: Option<Uuid>,
    body: &str,
    now: NaiveDateTime,
) -> WorkflowResult<(crate::models::DocumentReply, TimelineEvent)> {
    actor.require(Permission::DocumentsWrite)?;
    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        load_document(conn, document_id)?;
        super::timeline::add_reply(conn, document_id, actor.user_id, parent_reply_id, body, now)
    })
}
