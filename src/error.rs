use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

use crate::workflow::WorkflowError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "resource not found")
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            error.to_string(),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, error = %self.message, "request failed");
        }
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        let status = match &value {
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::InvalidState(_) => StatusCode::CONFLICT,
            WorkflowError::NotStageOwner => StatusCode::FORBIDDEN,
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::AssigneeResolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::AlreadyRegistered => StatusCode::CONFLICT,
            WorkflowError::TemplateInactive => StatusCode::CONFLICT,
            WorkflowError::ConcurrentModification => StatusCode::CONFLICT,
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, value.code(), value.to_string())
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            _ => AppError::internal(value),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::AssigneeError;
    use uuid::Uuid;

    #[test]
    fn workflow_errors_keep_distinct_codes() {
        let owner = AppError::from(WorkflowError::NotStageOwner);
        assert_eq!(owner.status(), StatusCode::FORBIDDEN);
        assert_eq!(owner.code(), "not_stage_owner");

        let conflict = AppError::from(WorkflowError::ConcurrentModification);
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "concurrent_modification");

        let resolution = AppError::from(WorkflowError::AssigneeResolution(
            AssigneeError::NoDepartmentHead(Uuid::nil()),
        ));
        assert_eq!(resolution.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(resolution.code(), "assignee_resolution_failure");
    }

    #[test]
    fn missing_rows_become_not_found() {
        let err = AppError::from(WorkflowError::from(diesel::result::Error::NotFound));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
