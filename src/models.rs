use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = departments)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub chief_user_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = departments)]
pub struct NewDepartment {
    pub id: Uuid,
    pub name: String,
    pub chief_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: String,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub full_name: String,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_roles)]
pub struct NewUserRole {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = delegations)]
pub struct Delegation {
    pub id: Uuid,
    pub delegator_user_id: Uuid,
    pub delegate_user_id: Uuid,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = delegations)]
pub struct NewDelegation {
    pub id: Uuid,
    pub delegator_user_id: Uuid,
    pub delegate_user_id: Uuid,
    pub starts_at: NaiveDateTime,
    pub ends_at: Option<NaiveDateTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = document_kinds)]
pub struct DocumentKind {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_kinds)]
pub struct NewDocumentKind {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
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
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub doc_type: String,
    pub status: String,
    pub department_id: Option<Uuid>,
    pub document_kind_id: Option<Uuid>,
    pub created_by: Uuid,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = route_templates)]
pub struct RouteTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scope_type: String,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = route_templates)]
pub struct NewRouteTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scope_type: String,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = route_template_stages)]
#[diesel(belongs_to(RouteTemplate, foreign_key = template_id))]
pub struct RouteTemplateStage {
    pub id: Uuid,
    pub template_id: Uuid,
    pub order_no: i32,
    pub stage_group_no: Option<i32>,
    pub stage_type: String,
    pub assignee_type: String,
    pub assignee_user_id: Option<Uuid>,
    pub assignee_role: Option<String>,
    pub assignee_department_id: Option<Uuid>,
    pub due_in_hours: Option<i32>,
    pub escalation_policy: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = route_template_stages)]
pub struct NewRouteTemplateStage {
    pub id: Uuid,
    pub template_id: Uuid,
    pub order_no: i32,
    pub stage_group_no: Option<i32>,
    pub stage_type: String,
    pub assignee_type: String,
    pub assignee_user_id: Option<Uuid>,
    pub assignee_role: Option<String>,
    pub assignee_department_id: Option<Uuid>,
    pub due_in_hours: Option<i32>,
    pub escalation_policy: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = document_routes)]
#[diesel(belongs_to(Document))]
pub struct DocumentRoute {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_no: i32,
    pub template_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_routes)]
pub struct NewDocumentRoute {
    pub id: Uuid,
    pub document_id: Uuid,
    pub version_no: i32,
    pub template_id: Option<Uuid>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = route_stages)]
#[diesel(belongs_to(DocumentRoute, foreign_key = route_id))]
pub struct RouteStage {
    pub id: Uuid,
    pub route_id: Uuid,
    pub document_id: Uuid,
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
    pub escalation_policy: Option<serde_json::Value>,
    pub escalated_to_user_id: Option<Uuid>,
    pub escalated_at: Option<NaiveDateTime>,
    pub activated_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub completed_by: Option<Uuid>,
    pub outcome: Option<String>,
    pub comment: Option<String>,
    pub lock_version: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = route_stages)]
pub struct NewRouteStage {
    pub id: Uuid,
    pub route_id: Uuid,
    pub document_id: Uuid,
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
    pub escalation_policy: Option<serde_json::Value>,
    pub activated_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = timeline_events)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub document_id: Uuid,
    pub event_type: String,
    pub actor_user_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub parent_event_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = timeline_events)]
pub struct NewTimelineEvent {
    pub id: Uuid,
    pub document_id: Uuid,
    pub event_type: String,
    pub actor_user_id: Option<Uuid>,
    pub route_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub parent_event_id: Option<Uuid>,
    pub payload: serde_json::Value,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = document_replies)]
pub struct DocumentReply {
    pub id: Uuid,
    pub document_id: Uuid,
    pub timeline_event_id: Uuid,
    pub thread_id: Uuid,
    pub parent_reply_id: Option<Uuid>,
    pub author_user_id: Uuid,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_replies)]
pub struct NewDocumentReply {
    pub id: Uuid,
    pub document_id: Uuid,
    pub timeline_event_id: Uuid,
    pub thread_id: Uuid,
    pub parent_reply_id: Option<Uuid>,
    pub author_user_id: Uuid,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = alerts)]
pub struct Alert {
    pub id: Uuid,
    pub document_id: Uuid,
    pub stage_id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: String,
    pub status: String,
    pub message: String,
    pub created_at: NaiveDateTime,
    pub read_at: Option<NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = alerts)]
pub struct NewAlert {
    pub id: Uuid,
    pub document_id: Uuid,
    pub stage_id: Uuid,
    pub recipient_user_id: Uuid,
    pub kind: String,
    pub status: String,
    pub message: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = registration_journal)]
pub struct RegistrationEntry {
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
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = registration_journal)]
pub struct NewRegistrationEntry {
    pub id: Uuid,
    pub document_id: Uuid,
    pub registration_number: String,
    pub journal_type: String,
    pub status: String,
    pub registered_at: NaiveDateTime,
    pub registered_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
