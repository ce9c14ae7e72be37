use axum::{extract::State, http::StatusCode, Json};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{permissions::Permission, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::models::{DocumentKind, NewDocumentKind};
use crate::schema::document_kinds;
use crate::state::AppState;

#[derive(Serialize)]
pub struct DocumentKindView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

impl From<DocumentKind> for DocumentKindView {
    fn from(kind: DocumentKind) -> Self {
        Self {
            id: kind.id,
            code: kind.code,
            name: kind.name,
            created_at: kind.created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateDocumentKindRequest {
    pub code: String,
    pub name: String,
}

pub async fn list_document_kinds(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<DocumentKindView>>> {
    user.require(Permission::DocumentsRead)?;
    let mut conn = state.db()?;
    let rows: Vec<DocumentKind> = document_kinds::table
        .order(document_kinds::code.asc())
        .select(DocumentKind::as_select())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(DocumentKindView::from).collect()))
}

pub async fn create_document_kind(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateDocumentKindRequest>,
) -> AppResult<(StatusCode, Json<DocumentKindView>)> {
    user.require(Permission::DirectoryManage)?;
    let code = payload.code.trim();
    let name = payload.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(AppError::bad_request("code and name must not be empty"));
    }

    let mut conn = state.db()?;
    let new_kind = NewDocumentKind {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: name.to_string(),
    };
    let kind = match diesel::insert_into(document_kinds::table)
        .values(&new_kind)
        .returning(DocumentKind::as_returning())
        .get_result(&mut conn)
    {
        Ok(kind) => kind,
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("document kind code already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    };

    Ok((StatusCode::CREATED, Json(kind.into())))
}
