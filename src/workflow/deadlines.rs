//! Periodic deadline scan: due-soon and overdue alerts plus escalation.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::alerts::{emit_alert, AlertDraft};
use super::assignee::{resolve_assignee, EscalationPolicy, ResolutionContext};
use super::state_machine::ensure_transition;
use super::directory::PgDirectory;
use super::documents::load_document;
use super::timeline::{record_event, EventDraft};
use super::types::{AlertKind, RouteStatus, StageState, TimelineEventType};
use super::{WorkflowError, WorkflowResult};
use crate::db::lock_document;
use crate::models::{Document, RouteStage};
use crate::schema::{document_routes, documents, route_stages, route_templates};

const SCANNED_STATES: [&str; 3] = ["pending", "active", "escalated"];

/// Upper bound for the due-soon lead window.
pub const MAX_LEAD_WINDOW_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy)]
pub struct DeadlineSettings {
    pub lead_window: Duration,
}

impl DeadlineSettings {
    pub fn from_hours(hours: i64) -> Self {
        Self {
            lead_window: Duration::hours(hours.clamp(0, MAX_LEAD_WINDOW_HOURS)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Assessment {
    pub due_soon: bool,
    pub overdue: bool,
    pub escalate: bool,
}

/// Decides what a stage deserves at `now`. Escalated stages only get the
/// overdue reminder; escalation itself happens once. A grace period that
/// does not fit the calendar is a validation error.
pub fn assess(
    state: StageState,
    due_at: NaiveDateTime,
    policy: Option<&EscalationPolicy>,
    now: NaiveDateTime,
    lead_window: Duration,
) -> WorkflowResult<Assessment> {
    let open = matches!(state, StageState::Pending | StageState::Active);
    if !open && state != StageState::Escalated {
        return Ok(Assessment::default());
    }

    let overdue = due_at <= now;
    let due_soon = open && !overdue && due_at - now <= lead_window;
    let escalate = match policy {
        Some(policy) if open && overdue => now >= escalation_deadline(due_at, policy)?,
        _ => false,
    };

    Ok(Assessment {
        due_soon,
        overdue,
        escalate,
    })
}

fn escalation_deadline(
    due_at: NaiveDateTime,
    policy: &EscalationPolicy,
) -> WorkflowResult<NaiveDateTime> {
    Duration::try_hours(policy.grace_hours)
        .and_then(|grace| due_at.checked_add_signed(grace))
        .ok_or_else(|| {
            WorkflowError::validation(format!(
                "escalation grace of {} hours is out of range",
                policy.grace_hours
            ))
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub documents_scanned: usize,
    pub stages_examined: usize,
    pub alerts_emitted: usize,
    pub escalations: usize,
    pub failures: usize,
}

#[derive(Debug, Default)]
struct DocumentScan {
    stages: usize,
    alerts: usize,
    escalations: usize,
}

/// Scans every document with a stage due within the lead window. Each
/// document runs in its own transaction; a failure is logged and counted and
/// the scan moves on.
pub fn scan_deadlines(
    conn: &mut PgConnection,
    settings: &DeadlineSettings,
    now: NaiveDateTime,
) -> WorkflowResult<ScanReport> {
    let horizon = now + settings.lead_window;
    let candidates: BTreeSet<Uuid> = route_stages::table
        .filter(route_stages::state.eq_any(&SCANNED_STATES[..]))
        .filter(route_stages::due_at.le(horizon))
        .filter(
            route_stages::route_id.eq_any(
                document_routes::table
                    .filter(document_routes::status.eq(RouteStatus::Active.as_str()))
                    .select(document_routes::id),
            ),
        )
        .select(route_stages::document_id)
        .load::<Uuid>(conn)?
        .into_iter()
        .collect();

    let mut report = ScanReport::default();
    for document_id in candidates {
        report.documents_scanned += 1;
        match conn.transaction(|conn| scan_document(conn, document_id, settings, now)) {
            Ok(scan) => {
                report.stages_examined += scan.stages;
                report.alerts_emitted += scan.alerts;
                report.escalations += scan.escalations;
            }
            Err(err) => {
                report.failures += 1;
                tracing::warn!(%document_id, error = %err, "deadline scan failed for document");
            }
        }
    }

    tracing::info!(
        documents = report.documents_scanned,
        stages = report.stages_examined,
        alerts = report.alerts_emitted,
        escalations = report.escalations,
        failures = report.failures,
        "deadline scan finished"
    );
    Ok(report)
}

fn scan_document(
    conn: &mut PgConnection,
    document_id: Uuid,
    settings: &DeadlineSettings,
    now: NaiveDateTime,
) -> WorkflowResult<DocumentScan> {
    lock_document(conn, document_id)?;
    let document = load_document(conn, document_id)?;

    // Re-read under the lock; a user action may have settled stages since
    // the candidate query.
    let stages: Vec<RouteStage> = route_stages::table
        .inner_join(document_routes::table)
        .filter(route_stages::document_id.eq(document.id))
        .filter(document_routes::status.eq(RouteStatus::Active.as_str()))
        .filter(route_stages::state.eq_any(&SCANNED_STATES[..]))
        .filter(route_stages::due_at.is_not_null())
        .order(route_stages::order_no.asc())
        .select(RouteStage::as_select())
        .load(conn)?;

    let mut scan = DocumentScan::default();
    for stage in &stages {
        let Some(due_at) = stage.due_at else { continue };
        scan.stages += 1;

        let state: StageState = stage.state.parse().map_err(WorkflowError::Validation)?;
        let policy = EscalationPolicy::from_json(stage.escalation_policy.as_ref())?;
        let verdict = assess(state, due_at, policy.as_ref(), now, settings.lead_window)?;

        if verdict.due_soon {
            let message = format!("\"{}\" is due at {due_at}", document.title);
            let recipient = stage.assignee_user_id;
            if raise(conn, &document, stage, recipient, AlertKind::DueSoon, message, now)? {
                scan.alerts += 1;
            }
        }
        if verdict.overdue {
            let message = format!("\"{}\" was due at {due_at}", document.title);
            let recipient = stage.assignee_user_id;
            if raise(conn, &document, stage, recipient, AlertKind::Overdue, message, now)? {
                scan.alerts += 1;
            }
        }
        if let (true, Some(policy)) = (verdict.escalate, policy.as_ref()) {
            if escalate_stage(conn, &document, stage, policy, now)? {
                scan.escalations += 1;
                scan.alerts += 1;
            }
        }
    }
    Ok(scan)
}

fn raise(
    conn: &mut PgConnection,
    document: &Document,
    stage: &RouteStage,
    recipient_user_id: Uuid,
    kind: AlertKind,
    message: String,
    now: NaiveDateTime,
) -> WorkflowResult<bool> {
    let alert = emit_alert(
        conn,
        AlertDraft {
            document_id: document.id,
            stage_id: stage.id,
            recipient_user_id,
            kind,
            message,
        },
        now,
    )?;
    Ok(alert.is_some())
}

/// Moves a stage to `escalated` and hands it to the policy target. An
/// unresolvable target leaves the stage alone.
fn escalate_stage(
    conn: &mut PgConnection,
    document: &Document,
    stage: &RouteStage,
    policy: &EscalationPolicy,
    now: NaiveDateTime,
) -> WorkflowResult<bool> {
    let state: StageState = stage.state.parse().map_err(WorkflowError::Validation)?;
    ensure_transition(state, StageState::Escalated)?;

    let template_department_id = match document_routes::table
        .find(stage.route_id)
        .select(document_routes::template_id)
        .first::<Option<Uuid>>(conn)?
    {
        Some(template_id) => route_templates::table
            .find(template_id)
            .select(route_templates::department_id)
            .first::<Option<Uuid>>(conn)
            .optional()?
            .flatten(),
        None => None,
    };
    let ctx = ResolutionContext {
        document_department_id: document.department_id,
        template_department_id,
    };

    let target = match resolve_assignee(&mut PgDirectory::new(conn), &policy.target, &ctx) {
        Ok(target) => target,
        Err(WorkflowError::AssigneeResolution(err)) => {
            tracing::warn!(
                document_id = %document.id,
                stage_id = %stage.id,
                error = %err,
                "escalation target could not be resolved"
            );
            return Ok(false);
        }
        Err(err) => return Err(err),
    };

    let updated = diesel::update(
        route_stages::table
            .find(stage.id)
            .filter(route_stages::state.eq(&stage.state))
            .filter(route_stages::lock_version.eq(stage.lock_version)),
    )
    .set((
        route_stages::state.eq(StageState::Escalated.as_str()),
        route_stages::escalated_to_user_id.eq(Some(target.user_id)),
        route_stages::escalated_at.eq(Some(now)),
        route_stages::lock_version.eq(route_stages::lock_version + 1),
    ))
    .execute(conn)?;
    if updated == 0 {
        tracing::debug!(stage_id = %stage.id, "stage changed before escalation");
        return Ok(false);
    }

    diesel::update(documents::table.find(document.id))
        .set(documents::updated_at.eq(now))
        .execute(conn)?;

    raise(
        conn,
        document,
        stage,
        target.user_id,
        AlertKind::Escalation,
        format!("\"{}\" was escalated to you", document.title),
        now,
    )?;
    record_event(
        conn,
        EventDraft::new(document.id, TimelineEventType::ResponsibleReassigned)
            .route(stage.route_id)
            .stage(stage.id)
            .payload(json!({
                "reason": "deadline_escalation",
                "from_user_id": stage.assignee_user_id,
                "to_user_id": target.user_id,
                "due_at": stage.due_at,
                "grace_hours": policy.grace_hours,
            })),
        now,
    )?;

    tracing::info!(
        document_id = %document.id,
        stage_id = %stage.id,
        escalated_to = %target.user_id,
        "stage escalated"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::assignee::AssigneeRule;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn policy(grace_hours: i64) -> EscalationPolicy {
        EscalationPolicy {
            target: AssigneeRule::DepartmentHead {
                department_id: None,
            },
            grace_hours,
        }
    }

    #[test]
    fn due_within_lead_window_is_due_soon() {
        let verdict = assess(
            StageState::Active,
            now() + Duration::hours(3),
            None,
            now(),
            Duration::hours(24),
        )
        .unwrap();
        assert_eq!(
            verdict,
            Assessment {
                due_soon: true,
                overdue: false,
                escalate: false
            }
        );
    }

    #[test]
    fn far_deadline_is_ignored() {
        let verdict = assess(
            StageState::Pending,
            now() + Duration::hours(30),
            Some(&policy(0)),
            now(),
            Duration::hours(24),
        )
        .unwrap();
        assert_eq!(verdict, Assessment::default());
    }

    #[test]
    fn overdue_past_grace_escalates() {
        let verdict = assess(
            StageState::Active,
            now() - Duration::hours(2),
            Some(&policy(1)),
            now(),
            Duration::hours(24),
        )
        .unwrap();
        assert!(verdict.overdue);
        assert!(verdict.escalate);
        assert!(!verdict.due_soon);
    }

    #[test]
    fn overdue_within_grace_only_alerts() {
        let verdict = assess(
            StageState::Active,
            now() - Duration::hours(2),
            Some(&policy(3)),
            now(),
            Duration::hours(24),
        )
        .unwrap();
        assert!(verdict.overdue);
        assert!(!verdict.escalate);
    }

    #[test]
    fn overdue_without_policy_never_escalates() {
        let verdict = assess(
            StageState::Active,
            now() - Duration::hours(48),
            None,
            now(),
            Duration::hours(24),
        )
        .unwrap();
        assert!(verdict.overdue);
        assert!(!verdict.escalate);
    }

    #[test]
    fn escalated_stage_is_not_escalated_again() {
        let verdict = assess(
            StageState::Escalated,
            now() - Duration::hours(5),
            Some(&policy(0)),
            now(),
            Duration::hours(24),
        )
        .unwrap();
        assert!(verdict.overdue);
        assert!(!verdict.escalate);
    }

    #[test]
    fn settled_stages_are_left_alone() {
        for state in [StageState::Done, StageState::Skipped] {
            let verdict = assess(
                state,
                now() - Duration::hours(5),
                Some(&policy(0)),
                now(),
                Duration::hours(24),
            )
            .unwrap();
            assert_eq!(verdict, Assessment::default());
        }
    }

    #[test]
    fn unrepresentable_grace_is_an_error_not_a_panic() {
        let result = assess(
            StageState::Active,
            now() - Duration::hours(2),
            Some(&policy(100_000_000_000)),
            now(),
            Duration::hours(24),
        );
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
    }

    #[test]
    fn lead_window_is_clamped() {
        let settings = DeadlineSettings::from_hours(i64::MAX);
        assert_eq!(settings.lead_window, Duration::hours(MAX_LEAD_WINDOW_HOURS));
        let settings = DeadlineSettings::from_hours(-5);
        assert_eq!(settings.lead_window, Duration::zero());
    }
}
