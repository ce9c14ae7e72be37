use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{permissions::Permission, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::models::{NewRouteTemplate, NewRouteTemplateStage, RouteTemplate, RouteTemplateStage};
use crate::schema::{departments, route_template_stages, route_templates};
use crate::state::AppState;
use crate::utils::json::{classify_nullable, Nullable};
use crate::workflow::{
    plan::{validate_definitions, StageDefinition},
    types::ScopeType,
};

#[derive(Serialize)]
pub struct TemplateStageView {
    pub id: Uuid,
    #[serde(flatten)]
    pub definition: StageDefinition,
}

#[derive(Serialize)]
pub struct TemplateView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scope_type: String,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub stages: Vec<TemplateStageView>,
}

impl TemplateView {
    fn new(template: RouteTemplate, rows: Vec<RouteTemplateStage>) -> AppResult<Self> {
        let stages = rows
            .iter()
            .map(|row| {
                Ok(TemplateStageView {
                    id: row.id,
                    definition: StageDefinition::from_template_stage(row)?,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Self {
            id: template.id,
            name: template.name,
            description: template.description,
            scope_type: template.scope_type,
            department_id: template.department_id,
            is_active: template.is_active,
            created_by: template.created_by,
            created_at: template.created_at,
            updated_at: template.updated_at,
            stages,
        })
    }
}

#[derive(Deserialize, Default)]
pub struct TemplateListQuery {
    pub department_id: Option<Uuid>,
    pub include_inactive: Option<bool>,
}

pub async fn list_templates(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TemplateListQuery>,
) -> AppResult<Json<Vec<TemplateView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;

    let mut select = route_templates::table
        .filter(route_templates::deleted_at.is_null())
        .select(RouteTemplate::as_select())
        .order(route_templates::name.asc())
        .into_boxed();
    if !query.include_inactive.unwrap_or(false) {
        select = select.filter(route_templates::is_active.eq(true));
    }
    if let Some(department_id) = query.department_id {
        // global templates apply to every department
        select = select.filter(
            route_templates::scope_type
                .eq(ScopeType::Global.as_str())
                .or(route_templates::department_id.eq(department_id)),
        );
    }
    let templates: Vec<RouteTemplate> = select.load(&mut conn)?;

    let mut stages: Vec<RouteTemplateStage> = RouteTemplateStage::belonging_to(&templates)
        .order(route_template_stages::order_no.asc())
        .select(RouteTemplateStage::as_select())
        .load(&mut conn)?;

    let mut response = Vec::with_capacity(templates.len());
    for template in templates {
        let (own, rest): (Vec<_>, Vec<_>) = stages
            .into_iter()
            .partition(|stage| stage.template_id == template.id);
        stages = rest;
        response.push(TemplateView::new(template, own)?);
    }
    Ok(Json(response))
}

pub async fn get_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(template_id): Path<Uuid>,
) -> AppResult<Json<TemplateView>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let template = load_template(&mut conn, template_id)?;
    let stages = load_stages(&mut conn, template_id)?;
    Ok(Json(TemplateView::new(template, stages)?))
}

#[derive(Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub description: Option<String>,
    pub scope_type: ScopeType,
    pub department_id: Option<Uuid>,
    pub is_active: Option<bool>,
    pub stages: Vec<StageDefinition>,
}

pub async fn create_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateView>)> {
    user.require(Permission::TemplatesManage)?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    validate_definitions(&payload.stages)?;

    let mut conn = state.db()?;
    let department_id = check_scope(&mut conn, payload.scope_type, payload.department_id)?;

    let new_template = NewRouteTemplate {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: payload.description.filter(|value| !value.trim().is_empty()),
        scope_type: payload.scope_type.as_str().to_string(),
        department_id,
        is_active: payload.is_active.unwrap_or(true),
        created_by: user.user_id,
    };

    let (template, stages) = conn.transaction::<_, AppError, _>(|conn| {
        let template: RouteTemplate = diesel::insert_into(route_templates::table)
            .values(&new_template)
            .returning(RouteTemplate::as_returning())
            .get_result(conn)?;
        let stages = insert_stages(conn, template.id, &payload.stages)?;
        Ok((template, stages))
    })?;

    tracing::info!(
        template_id = %template.id,
        stages = stages.len(),
        actor = %user.user_id,
        "route template created"
    );
    Ok((StatusCode::CREATED, Json(TemplateView::new(template, stages)?)))
}

#[derive(AsChangeset)]
#[diesel(table_name = route_templates)]
struct UpdateTemplateChangeset {
    name: Option<String>,
    description: Option<Option<String>>,
    is_active: Option<bool>,
    updated_at: NaiveDateTime,
}

/// Edits template metadata. A `stages` array replaces every stage; routes
/// already started keep their own snapshot.
pub async fn update_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(template_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<TemplateView>> {
    user.require(Permission::TemplatesManage)?;

    let name = match classify_nullable::<String>(&body, "name").map_err(AppError::bad_request)? {
        Nullable::Omitted => None,
        Nullable::Null => return Err(AppError::bad_request("name cannot be null")),
        Nullable::Value(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            Some(trimmed.to_string())
        }
    };
    let description = classify_nullable::<String>(&body, "description")
        .map_err(AppError::bad_request)?
        .into_change();
    let is_active =
        match classify_nullable::<bool>(&body, "is_active").map_err(AppError::bad_request)? {
            Nullable::Omitted => None,
            Nullable::Null => return Err(AppError::bad_request("is_active cannot be null")),
            Nullable::Value(value) => Some(value),
        };
    let stages = match classify_nullable::<Vec<StageDefinition>>(&body, "stages")
        .map_err(AppError::bad_request)?
    {
        Nullable::Omitted => None,
        Nullable::Null => return Err(AppError::bad_request("stages cannot be null")),
        Nullable::Value(stages) => {
            validate_definitions(&stages)?;
            Some(stages)
        }
    };

    let mut conn = state.db()?;
    load_template(&mut conn, template_id)?;

    let now = state.now();
    let (template, stage_rows) = conn.transaction::<_, AppError, _>(|conn| {
        let template: RouteTemplate = diesel::update(route_templates::table.find(template_id))
            .set(&UpdateTemplateChangeset {
                name,
                description,
                is_active,
                updated_at: now,
            })
            .returning(RouteTemplate::as_returning())
            .get_result(conn)?;
        let stage_rows = match stages {
            Some(stages) => {
                diesel::delete(
                    route_template_stages::table
                        .filter(route_template_stages::template_id.eq(template_id)),
                )
                .execute(conn)?;
                insert_stages(conn, template_id, &stages)?
            }
            None => load_stages(conn, template_id)?,
        };
        Ok((template, stage_rows))
    })?;

    Ok(Json(TemplateView::new(template, stage_rows)?))
}

/// Soft delete. The row stays for routes that reference it.
pub async fn delete_template(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(template_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require(Permission::TemplatesManage)?;
    let mut conn = state.db()?;
    let now = state.now();
    let updated = diesel::update(
        route_templates::table
            .find(template_id)
            .filter(route_templates::deleted_at.is_null()),
    )
    .set((
        route_templates::deleted_at.eq(now),
        route_templates::is_active.eq(false),
        route_templates::updated_at.eq(now),
    ))
    .execute(&mut conn)?;
    if updated == 0 {
        return Err(AppError::not_found());
    }
    tracing::info!(template_id = %template_id, actor = %user.user_id, "route template deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn load_template(conn: &mut PgConnection, template_id: Uuid) -> AppResult<RouteTemplate> {
    Ok(route_templates::table
        .find(template_id)
        .filter(route_templates::deleted_at.is_null())
        .select(RouteTemplate::as_select())
        .first(conn)?)
}

fn load_stages(conn: &mut PgConnection, template_id: Uuid) -> AppResult<Vec<RouteTemplateStage>> {
    Ok(route_template_stages::table
        .filter(route_template_stages::template_id.eq(template_id))
        .order(route_template_stages::order_no.asc())
        .select(RouteTemplateStage::as_select())
        .load(conn)?)
}

fn insert_stages(
    conn: &mut PgConnection,
    template_id: Uuid,
    definitions: &[StageDefinition],
) -> AppResult<Vec<RouteTemplateStage>> {
    let rows = definitions
        .iter()
        .map(|definition| {
            let (assignee_user_id, assignee_role, assignee_department_id) =
                definition.assignee.columns();
            Ok(NewRouteTemplateStage {
                id: Uuid::new_v4(),
                template_id,
                order_no: definition.order_no,
                stage_group_no: definition.stage_group_no,
                stage_type: definition.stage_type.as_str().to_string(),
                assignee_type: definition.assignee.assignee_type().as_str().to_string(),
                assignee_user_id,
                assignee_role,
                assignee_department_id,
                due_in_hours: definition.due_in_hours,
                escalation_policy: definition
                    .escalation_policy
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let mut stages: Vec<RouteTemplateStage> = diesel::insert_into(route_template_stages::table)
        .values(&rows)
        .returning(RouteTemplateStage::as_returning())
        .get_results(conn)?;
    stages.sort_by_key(|stage| stage.order_no);
    Ok(stages)
}

/// Department templates need an existing department; global ones carry none.
fn check_scope(
    conn: &mut PgConnection,
    scope: ScopeType,
    department_id: Option<Uuid>,
) -> AppResult<Option<Uuid>> {
    match (scope, department_id) {
        (ScopeType::Global, _) => Ok(None),
        (ScopeType::Department, None) => Err(AppError::bad_request(
            "department scoped templates require department_id",
        )),
        (ScopeType::Department, Some(department_id)) => {
            let exists: Option<Uuid> = departments::table
                .find(department_id)
                .select(departments::id)
                .first(conn)
                .optional()?;
            exists.ok_or_else(|| AppError::bad_request("department does not exist"))?;
            Ok(Some(department_id))
        }
    }
}
