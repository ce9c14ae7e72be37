use std::collections::HashMap;

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

use crate::auth::{
    password::hash_password,
    permissions::{Permission, SYSTEM_ROLES},
    AuthenticatedUser,
};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, NewUserRole, User};
use crate::schema::{departments, user_roles, users};
use crate::state::AppState;
use crate::utils::json::{classify_nullable, Nullable};

#[derive(Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub department_id: Option<Uuid>,
    pub is_active: bool,
    pub org_roles: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl UserView {
    fn new(user: User, org_roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            department_id: user.department_id,
            is_active: user.is_active,
            org_roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize, Default)]
pub struct UserListQuery {
    pub department_id: Option<Uuid>,
    pub include_inactive: Option<bool>,
}

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Vec<UserView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;

    let mut select = users::table
        .select(User::as_select())
        .order(users::full_name.asc())
        .into_boxed();
    if let Some(department_id) = query.department_id {
        select = select.filter(users::department_id.eq(department_id));
    }
    if !query.include_inactive.unwrap_or(false) {
        select = select.filter(users::is_active.eq(true));
    }
    let rows: Vec<User> = select.load(&mut conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let role_rows: Vec<(Uuid, String)> = user_roles::table
        .filter(user_roles::user_id.eq_any(&ids))
        .select((user_roles::user_id, user_roles::role))
        .order((user_roles::user_id, user_roles::role))
        .load(&mut conn)?;
    let mut roles_by_user: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (user_id, role) in role_rows {
        roles_by_user.entry(user_id).or_default().push(role);
    }

    let response = rows
        .into_iter()
        .map(|row| {
            let roles = roles_by_user.remove(&row.id).unwrap_or_default();
            UserView::new(row, roles)
        })
        .collect();
    Ok(Json(response))
}

pub async fn get_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserView>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let row: User = users::table
        .find(user_id)
        .select(User::as_select())
        .first(&mut conn)?;
    let roles = load_org_roles(&mut conn, user_id)?;
    Ok(Json(UserView::new(row, roles)))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Option<String>,
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub org_roles: Vec<String>,
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    user.require(Permission::DirectoryManage)?;

    let username = payload.username.trim();
    if username.is_empty() {
        return Err(AppError::bad_request("username must not be empty"));
    }
    if payload.password.len() < 8 {
        return Err(AppError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    let full_name = payload.full_name.trim();
    if full_name.is_empty() {
        return Err(AppError::bad_request("full_name must not be empty"));
    }
    let role = payload.role.as_deref().unwrap_or("user");
    ensure_system_role(role)?;
    let org_roles = normalize_org_roles(payload.org_roles)?;

    let mut conn = state.db()?;
    if let Some(department_id) = payload.department_id {
        ensure_department(&mut conn, department_id)?;
    }

    let password_hash = hash_password(&payload.password)?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        password_hash,
        role: role.to_string(),
        full_name: full_name.to_string(),
        department_id: payload.department_id,
        is_active: true,
    };

    let created = conn.transaction::<_, AppError, _>(|conn| {
        let created: User = match diesel::insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(conn)
        {
            Ok(created) => created,
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => return Err(AppError::bad_request("username already exists")),
            Err(err) => return Err(AppError::from(err)),
        };
        replace_org_roles(conn, created.id, &org_roles)?;
        Ok(created)
    })?;

    tracing::info!(user_id = %created.id, actor = %user.user_id, "user created");
    Ok((StatusCode::CREATED, Json(UserView::new(created, org_roles))))
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct UpdateUserChangeset {
    full_name: Option<String>,
    role: Option<String>,
    department_id: Option<Option<Uuid>>,
    is_active: Option<bool>,
    updated_at: NaiveDateTime,
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<UserView>> {
    user.require(Permission::DirectoryManage)?;
    let mut conn = state.db()?;
    let existing: User = users::table
        .find(user_id)
        .select(User::as_select())
        .first(&mut conn)?;

    let full_name = match classify_nullable::<String>(&body, "full_name")
        .map_err(AppError::bad_request)?
    {
        Nullable::Omitted => None,
        Nullable::Null => return Err(AppError::bad_request("full_name cannot be null")),
        Nullable::Value(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("full_name must not be empty"));
            }
            Some(trimmed.to_string())
        }
    };
    let role = match classify_nullable::<String>(&body, "role").map_err(AppError::bad_request)? {
        Nullable::Omitted => None,
        Nullable::Null => return Err(AppError::bad_request("role cannot be null")),
        Nullable::Value(value) => {
            ensure_system_role(&value)?;
            Some(value)
        }
    };
    let is_active =
        match classify_nullable::<bool>(&body, "is_active").map_err(AppError::bad_request)? {
            Nullable::Omitted => None,
            Nullable::Null => return Err(AppError::bad_request("is_active cannot be null")),
            Nullable::Value(value) => Some(value),
        };
    if is_active == Some(false) && user_id == user.user_id {
        return Err(AppError::bad_request("cannot deactivate your own account"));
    }
    let department_id = classify_nullable::<Uuid>(&body, "department_id")
        .map_err(AppError::bad_request)?
        .into_change();
    if let Some(Some(department_id)) = department_id {
        ensure_department(&mut conn, department_id)?;
    }

    if full_name.is_none() && role.is_none() && is_active.is_none() && department_id.is_none() {
        let roles = load_org_roles(&mut conn, user_id)?;
        return Ok(Json(UserView::new(existing, roles)));
    }

    let updated: User = diesel::update(users::table.find(user_id))
        .set(&UpdateUserChangeset {
            full_name,
            role,
            department_id,
            is_active,
            updated_at: state.now(),
        })
        .returning(User::as_returning())
        .get_result(&mut conn)?;
    let roles = load_org_roles(&mut conn, user_id)?;
    Ok(Json(UserView::new(updated, roles)))
}

#[derive(Deserialize)]
pub struct SetRolesRequest {
    pub org_roles: Vec<String>,
}

/// Replaces the organizational roles used by role-based assignees.
pub async fn set_org_roles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<SetRolesRequest>,
) -> AppResult<Json<UserView>> {
    user.require(Permission::DirectoryManage)?;
    let org_roles = normalize_org_roles(payload.org_roles)?;
    let mut conn = state.db()?;
    let existing: User = users::table
        .find(user_id)
        .select(User::as_select())
        .first(&mut conn)?;

    conn.transaction::<_, AppError, _>(|conn| replace_org_roles(conn, user_id, &org_roles))?;
    Ok(Json(UserView::new(existing, org_roles)))
}

fn load_org_roles(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<String>> {
    Ok(user_roles::table
        .filter(user_roles::user_id.eq(user_id))
        .select(user_roles::role)
        .order(user_roles::role.asc())
        .load(conn)?)
}

fn replace_org_roles(conn: &mut PgConnection, user_id: Uuid, roles: &[String]) -> AppResult<()> {
    diesel::delete(user_roles::table.filter(user_roles::user_id.eq(user_id))).execute(conn)?;
    let rows: Vec<NewUserRole> = roles
        .iter()
        .map(|role| NewUserRole {
            user_id,
            role: role.clone(),
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(user_roles::table)
            .values(&rows)
            .execute(conn)?;
    }
    Ok(())
}

fn normalize_org_roles(roles: Vec<String>) -> AppResult<Vec<String>> {
    let mut normalized: Vec<String> = roles
        .into_iter()
        .map(|role| role.trim().to_string())
        .collect();
    if normalized.iter().any(String::is_empty) {
        return Err(AppError::bad_request("roles must not be empty"));
    }
    normalized.sort();
    normalized.dedup();
    Ok(normalized)
}

fn ensure_system_role(role: &str) -> AppResult<()> {
    if SYSTEM_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("unknown system role `{role}`")))
    }
}

fn ensure_department(conn: &mut PgConnection, department_id: Uuid) -> AppResult<()> {
    let exists: Option<Uuid> = departments::table
        .find(department_id)
        .select(departments::id)
        .first(conn)
        .optional()?;
    exists
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("department does not exist"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_roles_are_trimmed_and_deduplicated() {
        let roles = normalize_org_roles(vec![
            " manager".into(),
            "lawyer".into(),
            "manager ".into(),
        ])
        .unwrap();
        assert_eq!(roles, vec!["lawyer".to_string(), "manager".to_string()]);
        assert!(normalize_org_roles(vec!["  ".into()]).is_err());
    }

    #[test]
    fn only_system_roles_are_accepted() {
        assert!(ensure_system_role("clerk").is_ok());
        assert!(ensure_system_role("manager").is_err());
    }
}
