use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    workflow::registration::RegistrationPrefixes,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub registration_prefixes: Arc<RegistrationPrefixes>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, jwt: JwtService) -> Self {
        let registration_prefixes = Arc::new(config.registration_prefixes());
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            registration_prefixes,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }

    /// Wall clock for workflow operations, in UTC.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc()
    }
}
