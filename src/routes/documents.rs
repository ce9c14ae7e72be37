use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{permissions::Permission, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::models::{
    Document, DocumentReply, DocumentRoute, RegistrationEntry, RouteStage, TimelineEvent,
};
use crate::state::AppState;
use crate::workflow::{
    documents::{self as docs, DocumentDraft, DocumentFilter},
    engine::{self, ActionOutcome, RouteDetail, RouteSource, StageActionRequest},
    plan::StageDefinition,
    registration::{self, active_registration},
    timeline,
    types::{DocumentStatus, DocumentType, StageAction},
};

#[derive(Serialize)]
pub struct DocumentView {
    pub id: Uuid,
    pub title: String,
    pub doc_type: String,
    pub status: String,
    pub department_id: Option<Uuid>,
    pub document_kind_id: Option<Uuid>,
    pub created_by: Uuid,
    pub responsible_user_id: Option<Uuid>,
    pub current_route_id: Option<Uuid>,
    pub summary: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Document> for DocumentView {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            title: document.title,
            doc_type: document.doc_type,
            status: document.status,
            department_id: document.department_id,
            document_kind_id: document.document_kind_id,
            created_by: document.created_by,
            responsible_user_id: document.responsible_user_id,
            current_route_id: document.current_route_id,
            summary: document.summary,
            created_at: document.created_at,
            updated_at: document.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct StageView {
    pub id: Uuid,
    pub order_no: i32,
    pub stage_group_no: Option<i32>,
    pub step_no: i32,
    pub stage_type: String,
    pub state: String,
    pub assignee_type: String,
    pub assignee_user_id: Uuid,
    pub assignee_role: Option<String>,
    pub assignee_department_id: Option<Uuid>,
    pub due_at: Option<NaiveDateTime>,
    pub escalation_policy: Option<Value>,
    pub escalated_to_user_id: Option<Uuid>,
    pub escalated_at: Option<NaiveDateTime>,
    pub activated_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<Uuid>,
    pub outcome: Option<String>,
    pub comment: Option<String>,
}

impl From<RouteStage> for StageView {
    fn from(stage: RouteStage) -> Self {
        Self {
            id: stage.id,
            order_no: stage.order_no,
            stage_group_no: stage.stage_group_no,
            step_no: stage.step_no,
            stage_type: stage.stage_type,
            state: stage.state,
            assignee_type: stage.assignee_type,
            assignee_user_id: stage.assignee_user_id,
            assignee_role: stage.assignee_role,
            assignee_department_id: stage.assignee_department_id,
            due_at: stage.due_at,
            escalation_policy: stage.escalation_policy,
            escalated_to_user_id: stage.escalated_to_user_id,
            escalated_at: stage.escalated_at,
            activated_at: stage.activated_at,
            completed_at: stage.completed_at,
            completed_by: stage.completed_by,
            outcome: stage.outcome,
            comment: stage.comment,
        }
    }
}

#[derive(Serialize)]
pub struct RouteView {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_no: i32,
    pub template_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub stages: Vec<StageView>,
}

impl RouteView {
    fn new(route: DocumentRoute, stages: Vec<RouteStage>) -> Self {
        Self {
            id: route.id,
            document_id: route.document_id,
            version_no: route.version_no,
            template_id: route.template_id,
            status: route.status,
            created_by: route.created_by,
            created_at: route.created_at,
            completed_at: route.completed_at,
            stages: stages.into_iter().map(StageView::from).collect(),
        }
    }
}

impl From<RouteDetail> for RouteView {
    fn from(detail: RouteDetail) -> Self {
        Self::new(detail.route, detail.stages)
    }
}

#[derive(Serialize)]
pub struct RegistrationView {
    pub id: Uuid,
    pub document_id: Uuid,
    pub registration_number: String,
    pub journal_type: String,
    pub status: String,
    pub registered_at: NaiveDateTime,
    pub registered_by: Uuid,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<Uuid>,
    pub cancel_reason: Option<String>,
}

impl From<RegistrationEntry> for RegistrationView {
    fn from(entry: RegistrationEntry) -> Self {
        Self {
            id: entry.id,
            document_id: entry.document_id,
            registration_number: entry.registration_number,
            journal_type: entry.journal_type,
            status: entry.status,
            registered_at: entry.registered_at,
            registered_by: entry.registered_by,
            cancelled_at: entry.cancelled_at,
            cancelled_by: entry.cancelled_by,
            cancel_reason: entry.cancel_reason,
        }
    }
}

#[derive(Serialize)]
pub struct TimelineEventView {
    pub id: Uuid,
    pub event_type: String,
    pub actor_user_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub parent_event_id: Option<Uuid>,
    pub payload: Value,
    pub created_at: NaiveDateTime,
}

impl From<TimelineEvent> for TimelineEventView {
    fn from(event: TimelineEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type,
            actor_user_id: event.actor_user_id,
            route_id: event.route_id,
            stage_id: event.stage_id,
            parent_event_id: event.parent_event_id,
            payload: event.payload,
            created_at: event.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ReplyView {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub parent_reply_id: Option<Uuid>,
    pub timeline_event_id: Uuid,
    pub author_user_id: Uuid,
    pub body: String,
    pub created_at: NaiveDateTime,
}

impl From<DocumentReply> for ReplyView {
    fn from(reply: DocumentReply) -> Self {
        Self {
            id: reply.id,
            thread_id: reply.thread_id,
            parent_reply_id: reply.parent_reply_id,
            timeline_event_id: reply.timeline_event_id,
            author_user_id: reply.author_user_id,
            body: reply.body,
            created_at: reply.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: DocumentView,
    pub current_route: Option<RouteView>,
    pub registration: Option<RegistrationView>,
}

#[derive(Deserialize)]
pub struct ListDocumentsQuery {
    pub status: Option<DocumentStatus>,
    pub doc_type: Option<DocumentType>,
    pub department_id: Option<Uuid>,
    pub responsible_user_id: Option<Uuid>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListDocumentsQuery>,
) -> AppResult<Json<Vec<DocumentView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let filter = DocumentFilter {
        status: query.status,
        doc_type: query.doc_type,
        department_id: query.department_id,
        responsible_user_id: query.responsible_user_id,
    };
    let documents = docs::list_documents(&mut conn, &filter)?;
    Ok(Json(documents.into_iter().map(DocumentView::from).collect()))
}

#[derive(Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub doc_type: DocumentType,
    pub department_id: Option<Uuid>,
    pub document_kind_id: Option<Uuid>,
    pub summary: Option<String>,
}

pub async fn create_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateDocumentRequest>,
) -> AppResult<(StatusCode, Json<DocumentView>)> {
    let mut conn = state.db()?;
    let draft = DocumentDraft {
        title: payload.title,
        doc_type: payload.doc_type,
        department_id: payload.department_id,
        document_kind_id: payload.document_kind_id,
        summary: payload.summary,
    };
    let document = docs::create_document(&mut conn, &user.actor(), draft, state.now())?;
    Ok((StatusCode::CREATED, Json(document.into())))
}

pub async fn get_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentDetail>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let document = docs::load_document(&mut conn, document_id)?;
    let current_route: Option<RouteView> = match document.current_route_id {
        Some(route_id) => Some(engine::load_route_detail(&mut conn, route_id)?.into()),
        None => None,
    };
    let registration = active_registration(&mut conn, document.id)?.map(RegistrationView::from);

    Ok(Json(DocumentDetail {
        document: document.into(),
        current_route,
        registration,
    }))
}

/// Either a template or an explicit stage list.
#[derive(Deserialize)]
pub struct StartRouteRequest {
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub stages: Option<Vec<StageDefinition>>,
}

pub async fn start_route(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<StartRouteRequest>,
) -> AppResult<(StatusCode, Json<RouteView>)> {
    let source = match (payload.template_id, payload.stages) {
        (Some(template_id), None) => RouteSource::Template(template_id),
        (None, Some(stages)) => RouteSource::AdHoc(stages),
        _ => {
            return Err(AppError::bad_request(
                "provide either template_id or stages",
            ))
        }
    };

    let mut conn = state.db()?;
    let detail = engine::start_route(&mut conn, &user.actor(), document_id, source, state.now())?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

pub async fn list_routes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Vec<RouteView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    docs::load_document(&mut conn, document_id)?;
    let routes = engine::list_routes(&mut conn, document_id)?;
    Ok(Json(routes.into_iter().map(RouteView::from).collect()))
}

#[derive(Deserialize)]
pub struct StageActionBody {
    pub action: StageAction,
    pub comment: Option<String>,
}

#[derive(Serialize)]
pub struct StageActionResponse {
    pub document: DocumentView,
    pub route: RouteView,
    pub stage_id: Uuid,
    pub activated_stage_ids: Vec<Uuid>,
    pub registration: Option<RegistrationView>,
}

impl From<ActionOutcome> for StageActionResponse {
    fn from(outcome: ActionOutcome) -> Self {
        Self {
            document: outcome.document.into(),
            route: outcome.route.into(),
            stage_id: outcome.stage_id,
            activated_stage_ids: outcome.activated_stage_ids,
            registration: outcome.registration.map(RegistrationView::from),
        }
    }
}

pub async fn act_on_stage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((document_id, stage_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<StageActionBody>,
) -> AppResult<Json<StageActionResponse>> {
    let mut conn = state.db()?;
    let outcome = engine::act_on_stage(
        &mut conn,
        &user.actor(),
        document_id,
        stage_id,
        StageActionRequest {
            action: payload.action,
            comment: payload.comment,
        },
        &state.registration_prefixes,
        state.now(),
    )?;
    Ok(Json(outcome.into()))
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    pub reason: Option<String>,
}

pub async fn override_route(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<OverrideRequest>,
) -> AppResult<Json<RouteView>> {
    let mut conn = state.db()?;
    let detail =
        engine::override_route(&mut conn, &user.actor(), document_id, payload.reason, state.now())?;
    Ok(Json(detail.into()))
}

pub async fn get_timeline(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Vec<TimelineEventView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    docs::load_document(&mut conn, document_id)?;
    let events = timeline::list_events(&mut conn, document_id)?;
    Ok(Json(events.into_iter().map(TimelineEventView::from).collect()))
}

pub async fn list_replies(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReplyView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    docs::load_document(&mut conn, document_id)?;
    let replies = timeline::list_replies(&mut conn, document_id)?;
    Ok(Json(replies.into_iter().map(ReplyView::from).collect()))
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub body: String,
    pub parent_reply_id: Option<Uuid>,
}

pub async fn add_reply(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<ReplyRequest>,
) -> AppResult<(StatusCode, Json<ReplyView>)> {
    let mut conn = state.db()?;
    let (reply, _event) = docs::reply_to_document(
        &mut conn,
        &user.actor(),
        document_id,
        payload.parent_reply_id,
        &payload.body,
        state.now(),
    )?;
    Ok((StatusCode::CREATED, Json(reply.into())))
}

#[derive(Deserialize)]
pub struct ForwardRequest {
    pub to_user_id: Uuid,
    pub note: Option<String>,
}

pub async fn forward_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<ForwardRequest>,
) -> AppResult<(StatusCode, Json<TimelineEventView>)> {
    let mut conn = state.db()?;
    let event = docs::forward_document(
        &mut conn,
        &user.actor(),
        document_id,
        payload.to_user_id,
        payload.note,
        state.now(),
    )?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub user_id: Uuid,
}

pub async fn assign_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<DocumentView>> {
    let mut conn = state.db()?;
    let (document, _event) = docs::assign_responsible(
        &mut conn,
        &user.actor(),
        document_id,
        payload.user_id,
        state.now(),
    )?;
    Ok(Json(document.into()))
}

pub async fn archive_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<Json<DocumentView>> {
    let mut conn = state.db()?;
    let document = docs::archive_document(&mut conn, &user.actor(), document_id, state.now())?;
    Ok(Json(document.into()))
}

pub async fn register_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(document_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<RegistrationView>)> {
    let mut conn = state.db()?;
    let entry = registration::register(
        &mut conn,
        &user.actor(),
        document_id,
        &state.registration_prefixes,
        state.now(),
    )?;
    Ok((StatusCode::CREATED, Json(entry.into())))
}
