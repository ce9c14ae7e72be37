//! Registration journal. Numbers come from a per (journal, year) counter and
//! rows are never deleted; cancelling only flips the status.

use chrono::{Datelike, NaiveDateTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::json;
use uuid::Uuid;

use super::documents::load_document;
use super::timeline::{record_event, EventDraft};
use super::types::{DocumentType, JournalType, RegistrationStatus, TimelineEventType};
use super::{Actor, WorkflowError, WorkflowResult};
use crate::auth::permissions::Permission;
use crate::db::lock_document;
use crate::models::{Document, NewRegistrationEntry, RegistrationEntry};
use crate::schema::{registration_counters, registration_journal};

const ACTIVE_DOCUMENT_INDEX: &str = "registration_journal_active_document_idx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationPrefixes {
    pub incoming: String,
    pub outgoing: String,
}

impl RegistrationPrefixes {
    pub fn for_journal(&self, journal_type: JournalType) -> &str {
        match journal_type {
            JournalType::Incoming => &self.incoming,
            JournalType::Outgoing => &self.outgoing,
        }
    }
}

impl Default for RegistrationPrefixes {
    fn default() -> Self {
        Self {
            incoming: "IN".to_string(),
            outgoing: "OUT".to_string(),
        }
    }
}

/// `PREFIX-YYYY-NNNNNN`
pub fn format_registration_number(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{prefix}-{year:04}-{sequence:06}")
}

fn next_sequence(
    conn: &mut PgConnection,
    journal_type: JournalType,
    year: i32,
) -> WorkflowResult<i64> {
    let value = diesel::insert_into(registration_counters::table)
        .values((
            registration_counters::journal_type.eq(journal_type.as_str()),
            registration_counters::year.eq(year),
            registration_counters::last_value.eq(1_i64),
        ))
        .on_conflict((registration_counters::journal_type, registration_counters::year))
        .do_update()
        .set(registration_counters::last_value.eq(registration_counters::last_value + 1_i64))
        .returning(registration_counters::last_value)
        .get_result::<i64>(conn)?;
    Ok(value)
}

pub fn active_registration(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> WorkflowResult<Option<RegistrationEntry>> {
    Ok(registration_journal::table
        .filter(registration_journal::document_id.eq(document_id))
        .filter(registration_journal::status.eq(RegistrationStatus::Registered.as_str()))
        .select(RegistrationEntry::as_select())
        .first(conn)
        .optional()?)
}

pub fn register(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    prefixes: &RegistrationPrefixes,
    now: NaiveDateTime,
) -> WorkflowResult<RegistrationEntry> {
    actor.require(Permission::RegistrationManage)?;
    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;
        register_locked(conn, &document, actor.user_id, prefixes, now)
    })
}

/// Registers a document whose lock the caller already holds.
pub fn register_locked(
    conn: &mut PgConnection,
    document: &Document,
    registered_by: Uuid,
    prefixes: &RegistrationPrefixes,
    now: NaiveDateTime,
) -> WorkflowResult<RegistrationEntry> {
    let doc_type: DocumentType = document.doc_type.parse().map_err(WorkflowError::Validation)?;
    let journal_type = doc_type.journal_type().ok_or_else(|| {
        WorkflowError::validation(format!("{doc_type} documents are not registered"))
    })?;

    if active_registration(conn, document.id)?.is_some() {
        return Err(WorkflowError::AlreadyRegistered);
    }

    let year = now.year();
    let sequence = next_sequence(conn, journal_type, year)?;
    let new_entry = NewRegistrationEntry {
        id: Uuid::new_v4(),
        document_id: document.id,
        registration_number: format_registration_number(
            prefixes.for_journal(journal_type),
            year,
            sequence,
        ),
        journal_type: journal_type.as_str().to_string(),
        status: RegistrationStatus::Registered.as_str().to_string(),
        registered_at: now,
        registered_by,
    };

    let entry: RegistrationEntry = diesel::insert_into(registration_journal::table)
        .values(&new_entry)
        .returning(RegistrationEntry::as_returning())
        .get_result(conn)
        .map_err(|err| match err {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                if info.constraint_name() == Some(ACTIVE_DOCUMENT_INDEX) =>
            {
                WorkflowError::AlreadyRegistered
            }
            other => other.into(),
        })?;

    record_event(
        conn,
        EventDraft::new(document.id, TimelineEventType::Registered)
            .actor(Some(registered_by))
            .payload(json!({
                "registration_id": entry.id,
                "registration_number": entry.registration_number,
                "journal_type": entry.journal_type,
            })),
        now,
    )?;

    tracing::info!(
        document_id = %document.id,
        registration_number = %entry.registration_number,
        "document registered"
    );
    Ok(entry)
}

pub fn cancel_registration(
    conn: &mut PgConnection,
    actor: &Actor,
    registration_id: Uuid,
    reason: Option<String>,
    now: NaiveDateTime,
) -> WorkflowResult<RegistrationEntry> {
    actor.require(Permission::RegistrationManage)?;

    let document_id: Uuid = registration_journal::table
        .find(registration_id)
        .select(registration_journal::document_id)
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("registration"))?;

    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let entry: RegistrationEntry = registration_journal::table
            .find(registration_id)
            .select(RegistrationEntry::as_select())
            .first(conn)?;
        if entry.status != RegistrationStatus::Registered.as_str() {
            return Err(WorkflowError::invalid_state("registration is already cancelled"));
        }

        let reason = reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());
        let cancelled: RegistrationEntry = diesel::update(registration_journal::table.find(entry.id))
            .set((
                registration_journal::status.eq(RegistrationStatus::Cancelled.as_str()),
                registration_journal::cancelled_at.eq(Some(now)),
                registration_journal::cancelled_by.eq(Some(actor.user_id)),
                registration_journal::cancel_reason.eq(reason.clone()),
            ))
            .returning(RegistrationEntry::as_returning())
            .get_result(conn)?;

        record_event(
            conn,
            EventDraft::new(document_id, TimelineEventType::RegistrationCancelled)
                .actor(Some(actor.user_id))
                .payload(json!({
                    "registration_id": cancelled.id,
                    "registration_number": cancelled.registration_number,
                    "reason": reason,
                })),
            now,
        )?;
        Ok(cancelled)
    })
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    pub journal_type: Option<JournalType>,
    pub status: Option<RegistrationStatus>,
    pub document_id: Option<Uuid>,
}

pub fn list_registrations(
    conn: &mut PgConnection,
    filter: &RegistrationFilter,
) -> WorkflowResult<Vec<RegistrationEntry>> {
    let mut query = registration_journal::table
        .select(RegistrationEntry::as_select())
        .order((
            registration_journal::registered_at.desc(),
            registration_journal::registration_number.desc(),
        ))
        .into_boxed();
    if let Some(journal_type) = filter.journal_type {
        query = query.filter(registration_journal::journal_type.eq(journal_type.as_str()));
    }
    if let Some(status) = filter.status {
        query = query.filter(registration_journal::status.eq(status.as_str()));
    }
    if let Some(document_id) = filter.document_id {
        query = query.filter(registration_journal::document_id.eq(document_id));
    }
    Ok(query.load(conn)?)
}
