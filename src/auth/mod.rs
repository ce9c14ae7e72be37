pub mod jwt;
pub mod password;
pub mod permissions;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::{
    state::AppState,
    workflow::{Actor, WorkflowResult},
};
use permissions::{permissions_for_role, Permission};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub role: String,
    pub department_id: Option<uuid::Uuid>,
}

impl AuthenticatedUser {
    pub fn permissions(&self) -> &'static [Permission] {
        permissions_for_role(&self.role)
    }

    pub fn require(&self, permission: Permission) -> WorkflowResult<()> {
        self.actor().require(permission)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            department_id: self.department_id,
            permissions: self.permissions(),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_access_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            department_id: claims.department_id,
        })
    }
}
