use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{permissions::Permission, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::models::{Department, NewDepartment};
use crate::schema::{departments, users};
use crate::state::AppState;

#[derive(Serialize)]
pub struct DepartmentView {
    pub id: Uuid,
    pub name: String,
    pub chief_user_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<Department> for DepartmentView {
    fn from(department: Department) -> Self {
        Self {
            id: department.id,
            name: department.name,
            chief_user_id: department.chief_user_id,
            created_at: department.created_at,
            updated_at: department.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: String,
    pub chief_user_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SetChiefRequest {
    pub chief_user_id: Option<Uuid>,
}

pub async fn list_departments(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DepartmentView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let rows: Vec<Department> = departments::table
        .order(departments::name.asc())
        .select(Department::as_select())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(DepartmentView::from).collect()))
}

pub async fn create_department(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateDepartmentRequest>,
) -> AppResult<(StatusCode, Json<DepartmentView>)> {
    user.require(Permission::DirectoryManage)?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    if let Some(chief) = payload.chief_user_id {
        ensure_active_user(&mut conn, chief)?;
    }

    let department: Department = diesel::insert_into(departments::table)
        .values(&NewDepartment {
            id: Uuid::new_v4(),
            name: name.to_string(),
            chief_user_id: payload.chief_user_id,
        })
        .returning(Department::as_returning())
        .get_result(&mut conn)?;

    tracing::info!(department_id = %department.id, actor = %user.user_id, "department created");
    Ok((StatusCode::CREATED, Json(department.into())))
}

/// Sets or clears the department head.
pub async fn set_chief(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(department_id): Path<Uuid>,
    Json(payload): Json<SetChiefRequest>,
) -> AppResult<Json<DepartmentView>> {
    user.require(Permission::DirectoryManage)?;
    let mut conn = state.db()?;
    if let Some(chief) = payload.chief_user_id {
        ensure_active_user(&mut conn, chief)?;
    }

    let department: Department = diesel::update(departments::table.find(department_id))
        .set((
            departments::chief_user_id.eq(payload.chief_user_id),
            departments::updated_at.eq(state.now()),
        ))
        .returning(Department::as_returning())
        .get_result(&mut conn)?;

    Ok(Json(department.into()))
}

fn ensure_active_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<()> {
    let active: Option<bool> = users::table
        .find(user_id)
        .select(users::is_active)
        .first(conn)
        .optional()?;
    match active {
        Some(true) => Ok(()),
        _ => Err(AppError::bad_request("user does not exist or is inactive")),
    }
}
