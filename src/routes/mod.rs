use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod alerts;
pub mod auth;
pub mod delegations;
pub mod departments;
pub mod document_kinds;
pub mod documents;
pub mod health;
pub mod registrations;
pub mod templates;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let allow_origin = match state.config.cors_allowed_origin.as_ref() {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        tracing::warn!(origin = value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let departments_routes = Router::new()
        .route(
            "/",
            get(departments::list_departments).post(departments::create_department),
        )
        .route("/:id/chief", patch(departments::set_chief));

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/:id", get(users::get_user).patch(users::update_user))
        .route("/:id/roles", put(users::set_org_roles));

    let document_kinds_routes = Router::new().route(
        "/",
        get(document_kinds::list_document_kinds).post(document_kinds::create_document_kind),
    );

    let templates_routes = Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/:id",
            get(templates::get_template)
                .patch(templates::update_template)
                .delete(templates::delete_template),
        );

    let documents_routes = Router::new()
        .route(
            "/",
            get(documents::list_documents).post(documents::create_document),
        )
        .route("/:id", get(documents::get_document))
        .route(
            "/:id/routes",
            get(documents::list_routes).post(documents::start_route),
        )
        .route(
            "/:id/stages/:stage_id/actions",
            post(documents::act_on_stage),
        )
        .route("/:id/route/override", post(documents::override_route))
        .route("/:id/timeline", get(documents::get_timeline))
        .route(
            "/:id/replies",
            get(documents::list_replies).post(documents::add_reply),
        )
        .route("/:id/forward", post(documents::forward_document))
        .route("/:id/assign", post(documents::assign_document))
        .route("/:id/archive", post(documents::archive_document))
        .route("/:id/registration", post(documents::register_document));

    let registrations_routes = Router::new()
        .route("/", get(registrations::list_registrations))
        .route("/:id/cancel", post(registrations::cancel_registration));

    let alerts_routes = Router::new()
        .route("/", get(alerts::list_inbox))
        .route("/:id/read", post(alerts::mark_read));

    let delegations_routes = Router::new()
        .route(
            "/",
            get(delegations::list_delegations).post(delegations::create_delegation),
        )
        .route("/:id/revoke", post(delegations::revoke_delegation));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/departments", departments_routes)
        .nest("/api/users", users_routes)
        .nest("/api/document-kinds", document_kinds_routes)
        .nest("/api/route-templates", templates_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/registrations", registrations_routes)
        .nest("/api/alerts", alerts_routes)
        .nest("/api/delegations", delegations_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024))
}
