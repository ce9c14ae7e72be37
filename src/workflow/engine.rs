//! Route instantiation and stage transitions.

use chrono::NaiveDateTime;
use diesel::dsl::max;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::json;
use uuid::Uuid;

use super::assignee::ResolutionContext;
use super::delegations::acts_for_any;
use super::directory::PgDirectory;
use super::documents::{document_status, load_document};
use super::notify::{enqueue_notification, Notification};
use super::plan::{plan_route, PlannedStage, StageDefinition};
use super::registration::{active_registration, register_locked, RegistrationPrefixes};
use super::state_machine::{
    advance, check_action, ensure_transition, ensure_turn, open_stage_ids, Advance, StageSnapshot,
};
use super::timeline::{record_event, EventDraft};
use super::types::{
    DocumentStatus, DocumentType, RouteStatus, ScopeType, StageAction, StageState, StageType,
    TimelineEventType,
};
use super::{Actor, WorkflowError, WorkflowResult};
use crate::auth::permissions::Permission;
use crate::db::lock_document;
use crate::models::{
    Document, DocumentRoute, NewDocumentRoute, NewRouteStage, RegistrationEntry, RouteStage,
    RouteTemplate, RouteTemplateStage,
};
use crate::schema::{document_routes, documents, route_stages, route_template_stages, route_templates};

const OPEN_STATES: [&str; 3] = ["pending", "active", "escalated"];

#[derive(Debug, Clone)]
pub enum RouteSource {
    Template(Uuid),
    AdHoc(Vec<StageDefinition>),
}

#[derive(Debug, Clone)]
pub struct RouteDetail {
    pub route: DocumentRoute,
    pub stages: Vec<RouteStage>,
}

#[derive(Debug, Clone)]
pub struct StageActionRequest {
    pub action: StageAction,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub document: Document,
    pub route: RouteDetail,
    pub stage_id: Uuid,
    pub activated_stage_ids: Vec<Uuid>,
    pub registration: Option<RegistrationEntry>,
}

fn parse_state(stage: &RouteStage) -> WorkflowResult<StageState> {
    stage.state.parse().map_err(WorkflowError::Validation)
}

fn snapshot(stage: &RouteStage) -> WorkflowResult<StageSnapshot> {
    Ok(StageSnapshot {
        id: stage.id,
        step_no: stage.step_no,
        state: parse_state(stage)?,
    })
}

/// Users entitled to act on a stage without a delegation.
pub fn stage_owners(stage: &RouteStage) -> Vec<Uuid> {
    let mut owners = vec![stage.assignee_user_id];
    if let Some(target) = stage.escalated_to_user_id {
        if target != stage.assignee_user_id {
            owners.push(target);
        }
    }
    owners
}

fn ensure_owner(
    conn: &mut PgConnection,
    actor: &Actor,
    stage: &RouteStage,
    now: NaiveDateTime,
) -> WorkflowResult<()> {
    let owners = stage_owners(stage);
    if owners.contains(&actor.user_id) || acts_for_any(conn, actor.user_id, &owners, now)? {
        Ok(())
    } else {
        Err(WorkflowError::NotStageOwner)
    }
}

pub fn load_route_stages(conn: &mut PgConnection, route_id: Uuid) -> WorkflowResult<Vec<RouteStage>> {
    Ok(route_stages::table
        .filter(route_stages::route_id.eq(route_id))
        .order(route_stages::order_no.asc())
        .select(RouteStage::as_select())
        .load(conn)?)
}

pub fn load_route_detail(conn: &mut PgConnection, route_id: Uuid) -> WorkflowResult<RouteDetail> {
    let route: DocumentRoute = document_routes::table
        .find(route_id)
        .select(DocumentRoute::as_select())
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("route"))?;
    let stages = load_route_stages(conn, route.id)?;
    Ok(RouteDetail { route, stages })
}

/// Every route version of a document, newest first.
pub fn list_routes(conn: &mut PgConnection, document_id: Uuid) -> WorkflowResult<Vec<RouteDetail>> {
    let routes: Vec<DocumentRoute> = document_routes::table
        .filter(document_routes::document_id.eq(document_id))
        .order(document_routes::version_no.desc())
        .select(DocumentRoute::as_select())
        .load(conn)?;
    let route_ids: Vec<Uuid> = routes.iter().map(|route| route.id).collect();
    let stages: Vec<RouteStage> = route_stages::table
        .filter(route_stages::route_id.eq_any(&route_ids))
        .order((route_stages::route_id.asc(), route_stages::order_no.asc()))
        .select(RouteStage::as_select())
        .load(conn)?;

    Ok(routes
        .into_iter()
        .map(|route| {
            let stages = stages
                .iter()
                .filter(|stage| stage.route_id == route.id)
                .cloned()
                .collect();
            RouteDetail { route, stages }
        })
        .collect())
}

fn template_definitions(
    conn: &mut PgConnection,
    document: &Document,
    template_id: Uuid,
) -> WorkflowResult<(RouteTemplate, Vec<StageDefinition>)> {
    let template: RouteTemplate = route_templates::table
        .find(template_id)
        .select(RouteTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(WorkflowError::NotFound("route template"))?;
    if !template.is_active || template.deleted_at.is_some() {
        return Err(WorkflowError::TemplateInactive);
    }

    let scope: ScopeType = template.scope_type.parse().map_err(WorkflowError::Validation)?;
    if scope == ScopeType::Department && template.department_id != document.department_id {
        return Err(WorkflowError::validation(
            "template is scoped to another department",
        ));
    }

    let rows: Vec<RouteTemplateStage> = route_template_stages::table
        .filter(route_template_stages::template_id.eq(template.id))
        .order(route_template_stages::order_no.asc())
        .select(RouteTemplateStage::as_select())
        .load(conn)?;
    if rows.is_empty() {
        return Err(WorkflowError::validation("template has no stages"));
    }
    let definitions = rows
        .iter()
        .map(StageDefinition::from_template_stage)
        .collect::<WorkflowResult<Vec<_>>>()?;
    Ok((template, definitions))
}

/// Skips every open stage of a route and returns the skipped ids.
fn skip_open_stages(
    conn: &mut PgConnection,
    route_id: Uuid,
    except: Option<Uuid>,
    now: NaiveDateTime,
) -> WorkflowResult<Vec<Uuid>> {
    let snapshots = load_route_stages(conn, route_id)?
        .iter()
        .filter(|stage| Some(stage.id) != except)
        .map(snapshot)
        .collect::<WorkflowResult<Vec<_>>>()?;
    let open = open_stage_ids(&snapshots);
    for stage in snapshots.iter().filter(|stage| open.contains(&stage.id)) {
        ensure_transition(stage.state, StageState::Skipped)?;
    }
    if open.is_empty() {
        return Ok(open);
    }

    Ok(diesel::update(route_stages::table)
        .filter(route_stages::id.eq_any(&open))
        .filter(route_stages::state.eq_any(&OPEN_STATES[..]))
        .set((
            route_stages::state.eq(StageState::Skipped.as_str()),
            route_stages::completed_at.eq(Some(now)),
            route_stages::lock_version.eq(route_stages::lock_version + 1),
        ))
        .returning(route_stages::id)
        .get_results(conn)?)
}

fn set_route_status(
    conn: &mut PgConnection,
    route_id: Uuid,
    status: RouteStatus,
    now: NaiveDateTime,
) -> WorkflowResult<()> {
    diesel::update(document_routes::table.find(route_id))
        .set((
            document_routes::status.eq(status.as_str()),
            document_routes::completed_at.eq(Some(now)),
        ))
        .execute(conn)?;
    Ok(())
}

fn set_document_status(
    conn: &mut PgConnection,
    document_id: Uuid,
    status: DocumentStatus,
    now: NaiveDateTime,
) -> WorkflowResult<()> {
    diesel::update(documents::table.find(document_id))
        .set((
            documents::status.eq(status.as_str()),
            documents::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}

fn notify_activated(
    conn: &mut PgConnection,
    document: &Document,
    stages: &[RouteStage],
) -> WorkflowResult<()> {
    for stage in stages {
        enqueue_notification(
            conn,
            &Notification {
                recipient_user_id: stage.assignee_user_id,
                kind: "stage_activated".to_string(),
                message: format!(
                    "Document \"{}\" is waiting for your {}",
                    document.title, stage.stage_type
                ),
                metadata: json!({
                    "document_id": document.id,
                    "route_id": stage.route_id,
                    "stage_id": stage.id,
                }),
            },
        )?;
    }
    Ok(())
}

fn new_stage_row(
    planned: &PlannedStage,
    route_id: Uuid,
    document_id: Uuid,
    now: NaiveDateTime,
) -> WorkflowResult<NewRouteStage> {
    let (_, role, department_id) = planned.rule.columns();
    let escalation_policy = planned
        .escalation_policy
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|err| WorkflowError::validation(err.to_string()))?;
    Ok(NewRouteStage {
        id: Uuid::new_v4(),
        route_id,
        document_id,
        order_no: planned.order_no,
        stage_group_no: planned.stage_group_no,
        step_no: planned.step_no,
        stage_type: planned.stage_type.as_str().to_string(),
        state: planned.state.as_str().to_string(),
        assignee_type: planned.rule.assignee_type().as_str().to_string(),
        assignee_user_id: planned.assignee.user_id,
        assignee_role: role,
        assignee_department_id: department_id.or(planned.assignee.department_id),
        due_at: planned.due_at,
        escalation_policy,
        activated_at: (planned.state == StageState::Active).then_some(now),
        created_at: now,
    })
}

/// Instantiates a new route version for a document. Any assignee that cannot
/// be resolved aborts the whole operation and nothing is written.
pub fn start_route(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    source: RouteSource,
    now: NaiveDateTime,
) -> WorkflowResult<RouteDetail> {
    actor.require(Permission::RoutesStart)?;

    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;
        if document_status(&document)? == DocumentStatus::Archived {
            return Err(WorkflowError::invalid_state("document is archived"));
        }

        let (template, definitions) = match source {
            RouteSource::Template(template_id) => {
                let (template, definitions) = template_definitions(conn, &document, template_id)?;
                (Some(template), definitions)
            }
            RouteSource::AdHoc(definitions) => (None, definitions),
        };

        let ctx = ResolutionContext {
            document_department_id: document.department_id,
            template_department_id: template.as_ref().and_then(|template| template.department_id),
        };
        let planned = plan_route(&mut PgDirectory::new(conn), definitions, &ctx, now)?;

        let previous_version: Option<i32> = document_routes::table
            .filter(document_routes::document_id.eq(document.id))
            .select(max(document_routes::version_no))
            .first(conn)?;

        let superseded: Vec<Uuid> = diesel::update(document_routes::table)
            .filter(document_routes::document_id.eq(document.id))
            .filter(document_routes::status.eq(RouteStatus::Active.as_str()))
            .set((
                document_routes::status.eq(RouteStatus::Superseded.as_str()),
                document_routes::completed_at.eq(Some(now)),
            ))
            .returning(document_routes::id)
            .get_results(conn)?;
        for route_id in &superseded {
            skip_open_stages(conn, *route_id, None, now)?;
        }

        let new_route = NewDocumentRoute {
            id: Uuid::new_v4(),
            document_id: document.id,
            version_no: previous_version.unwrap_or(0) + 1,
            template_id: template.as_ref().map(|template| template.id),
            status: RouteStatus::Active.as_str().to_string(),
            created_by: actor.user_id,
            created_at: now,
        };
        let route: DocumentRoute = diesel::insert_into(document_routes::table)
            .values(&new_route)
            .returning(DocumentRoute::as_returning())
            .get_result(conn)?;

        let rows = planned
            .iter()
            .map(|stage| new_stage_row(stage, route.id, document.id, now))
            .collect::<WorkflowResult<Vec<_>>>()?;
        let mut stages: Vec<RouteStage> = diesel::insert_into(route_stages::table)
            .values(&rows)
            .returning(RouteStage::as_returning())
            .get_results(conn)?;
        stages.sort_by_key(|stage| stage.order_no);

        diesel::update(documents::table.find(document.id))
            .set((
                documents::current_route_id.eq(Some(route.id)),
                documents::status.eq(DocumentStatus::InRoute.as_str()),
                documents::updated_at.eq(now),
            ))
            .execute(conn)?;

        record_event(
            conn,
            EventDraft::new(document.id, TimelineEventType::RouteStarted)
                .actor(Some(actor.user_id))
                .route(route.id)
                .payload(json!({
                    "version_no": route.version_no,
                    "template_id": route.template_id,
                    "stage_count": stages.len(),
                    "superseded_route_ids": superseded,
                })),
            now,
        )?;

        let active: Vec<RouteStage> = stages
            .iter()
            .filter(|stage| stage.state == StageState::Active.as_str())
            .cloned()
            .collect();
        notify_activated(conn, &document, &active)?;

        tracing::info!(
            document_id = %document.id,
            route_id = %route.id,
            version_no = route.version_no,
            stages = stages.len(),
            "route started"
        );
        Ok(RouteDetail { route, stages })
    })
}

/// Applies an approve / sign / complete_review / reject action to a stage.
pub fn act_on_stage(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    stage_id: Uuid,
    request: StageActionRequest,
    prefixes: &RegistrationPrefixes,
    now: NaiveDateTime,
) -> WorkflowResult<ActionOutcome> {
    actor.require(Permission::DocumentsWrite)?;

    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;

        let stage: RouteStage = route_stages::table
            .find(stage_id)
            .filter(route_stages::document_id.eq(document.id))
            .select(RouteStage::as_select())
            .first(conn)
            .optional()?
            .ok_or(WorkflowError::NotFound("stage"))?;
        let route: DocumentRoute = document_routes::table
            .find(stage.route_id)
            .select(DocumentRoute::as_select())
            .first(conn)?;
        if route.status != RouteStatus::Active.as_str() {
            return Err(WorkflowError::invalid_state(format!(
                "route is {}",
                route.status
            )));
        }

        let stage_type: StageType = stage.stage_type.parse().map_err(WorkflowError::Validation)?;
        let state = parse_state(&stage)?;
        check_action(stage_type, state, request.action)?;
        ensure_owner(conn, actor, &stage, now)?;

        let mut snapshots = load_route_stages(conn, route.id)?
            .iter()
            .map(snapshot)
            .collect::<WorkflowResult<Vec<_>>>()?;
        ensure_turn(&snapshots, stage.id)?;
        ensure_transition(state, StageState::Done)?;

        let comment = request
            .comment
            .as_deref()
            .map(str::trim)
            .filter(|comment| !comment.is_empty())
            .map(str::to_string);
        let outcome = request.action.outcome();

        let settled = diesel::update(
            route_stages::table
                .find(stage.id)
                .filter(route_stages::state.eq(&stage.state))
                .filter(route_stages::lock_version.eq(stage.lock_version)),
        )
        .set((
            route_stages::state.eq(StageState::Done.as_str()),
            route_stages::outcome.eq(Some(outcome.as_str())),
            route_stages::comment.eq(comment.as_deref()),
            route_stages::completed_at.eq(Some(now)),
            route_stages::completed_by.eq(Some(actor.user_id)),
            route_stages::lock_version.eq(route_stages::lock_version + 1),
        ))
        .execute(conn)?;
        if settled == 0 {
            return Err(WorkflowError::ConcurrentModification);
        }

        let mut activated_stage_ids = Vec::new();
        let mut registration = None;

        if request.action.is_rejection() {
            let skipped = skip_open_stages(conn, route.id, Some(stage.id), now)?;
            set_route_status(conn, route.id, RouteStatus::Rejected, now)?;
            set_document_status(conn, document.id, DocumentStatus::Rejected, now)?;
            record_event(
                conn,
                EventDraft::new(document.id, TimelineEventType::Override)
                    .actor(Some(actor.user_id))
                    .route(route.id)
                    .stage(stage.id)
                    .payload(json!({
                        "action": request.action,
                        "comment": comment,
                        "skipped_stage_ids": skipped,
                    })),
                now,
            )?;
            tracing::info!(document_id = %document.id, stage_id = %stage.id, "route rejected");
        } else {
            record_event(
                conn,
                EventDraft::new(document.id, TimelineEventType::RouteAction)
                    .actor(Some(actor.user_id))
                    .route(route.id)
                    .stage(stage.id)
                    .payload(json!({
                        "action": request.action,
                        "outcome": outcome,
                        "comment": comment,
                        "on_behalf_of": (!stage_owners(&stage).contains(&actor.user_id))
                            .then_some(stage.assignee_user_id),
                    })),
                now,
            )?;

            if let Some(entry) = snapshots.iter_mut().find(|entry| entry.id == stage.id) {
                entry.state = StageState::Done;
            }
            match advance(&snapshots) {
                Advance::Wait => {}
                Advance::Activate { step_no, stage_ids } => {
                    for entry in snapshots.iter().filter(|entry| stage_ids.contains(&entry.id)) {
                        ensure_transition(entry.state, StageState::Active)?;
                    }
                    let activated: Vec<RouteStage> = diesel::update(route_stages::table)
                        .filter(route_stages::id.eq_any(&stage_ids))
                        .filter(route_stages::state.eq(StageState::Pending.as_str()))
                        .set((
                            route_stages::state.eq(StageState::Active.as_str()),
                            route_stages::activated_at.eq(Some(now)),
                            route_stages::lock_version.eq(route_stages::lock_version + 1),
                        ))
                        .returning(RouteStage::as_returning())
                        .get_results(conn)?;
                    notify_activated(conn, &document, &activated)?;
                    tracing::debug!(document_id = %document.id, step_no, "step activated");
                    activated_stage_ids = activated.into_iter().map(|stage| stage.id).collect();
                }
                Advance::RouteComplete => {
                    set_route_status(conn, route.id, RouteStatus::Completed, now)?;
                    set_document_status(conn, document.id, DocumentStatus::Completed, now)?;
                    record_event(
                        conn,
                        EventDraft::new(document.id, TimelineEventType::RouteCompleted)
                            .actor(Some(actor.user_id))
                            .route(route.id)
                            .payload(json!({ "version_no": route.version_no })),
                        now,
                    )?;

                    let doc_type: DocumentType =
                        document.doc_type.parse().map_err(WorkflowError::Validation)?;
                    if doc_type.journal_type().is_some()
                        && active_registration(conn, document.id)?.is_none()
                    {
                        registration =
                            Some(register_locked(conn, &document, actor.user_id, prefixes, now)?);
                    }
                    tracing::info!(document_id = %document.id, route_id = %route.id, "route completed");
                }
            }
        }

        Ok(ActionOutcome {
            document: load_document(conn, document.id)?,
            route: load_route_detail(conn, route.id)?,
            stage_id: stage.id,
            activated_stage_ids,
            registration,
        })
    })
}

/// Administrative cancellation of the current route. Open stages are skipped
/// and the document ends up rejected.
pub fn override_route(
    conn: &mut PgConnection,
    actor: &Actor,
    document_id: Uuid,
    reason: Option<String>,
    now: NaiveDateTime,
) -> WorkflowResult<RouteDetail> {
    actor.require(Permission::RoutesOverride)?;

    conn.transaction(|conn| {
        lock_document(conn, document_id)?;
        let document = load_document(conn, document_id)?;
        let route_id = document
            .current_route_id
            .ok_or_else(|| WorkflowError::invalid_state("document has no route"))?;
        let route = load_route_detail(conn, route_id)?.route;
        if route.status != RouteStatus::Active.as_str() {
            return Err(WorkflowError::invalid_state(format!(
                "route is {}",
                route.status
            )));
        }

        let skipped = skip_open_stages(conn, route.id, None, now)?;
        set_route_status(conn, route.id, RouteStatus::Rejected, now)?;
        set_document_status(conn, document.id, DocumentStatus::Rejected, now)?;
        record_event(
            conn,
            EventDraft::new(document.id, TimelineEventType::Override)
                .actor(Some(actor.user_id))
                .route(route.id)
                .payload(json!({
                    "action": "administrative_override",
                    "reason": reason,
                    "skipped_stage_ids": skipped,
                })),
            now,
        )?;
        tracing::info!(document_id = %document.id, route_id = %route.id, "route overridden");

        load_route_detail(conn, route.id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(assignee: Uuid, escalated_to: Option<Uuid>) -> RouteStage {
        let now = chrono::Utc::now().naive_utc();
        RouteStage {
            id: Uuid::new_v4(),
            route_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            order_no: 1,
            stage_group_no: None,
            step_no: 0,
            stage_type: "review".into(),
            state: "escalated".into(),
            assignee_type: "user".into(),
            assignee_user_id: assignee,
            assignee_role: None,
            assignee_department_id: None,
            due_at: None,
            escalation_policy: None,
            escalated_to_user_id: escalated_to,
            escalated_at: None,
            activated_at: Some(now),
            completed_at: None,
            completed_by: None,
            outcome: None,
            comment: None,
            lock_version: 0,
            created_at: now,
        }
    }

    #[test]
    fn escalation_target_joins_the_owners() {
        let assignee = Uuid::new_v4();
        let head = Uuid::new_v4();
        assert_eq!(stage_owners(&stage(assignee, None)), vec![assignee]);
        assert_eq!(stage_owners(&stage(assignee, Some(head))), vec![assignee, head]);
        assert_eq!(stage_owners(&stage(assignee, Some(assignee))), vec![assignee]);
    }

    #[test]
    fn snapshots_reject_unknown_states() {
        let mut row = stage(Uuid::new_v4(), None);
        assert_eq!(snapshot(&row).unwrap().state, StageState::Escalated);
        row.state = "archived".into();
        assert!(snapshot(&row).is_err());
    }
}
