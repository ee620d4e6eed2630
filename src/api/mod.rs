use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State},
    http::{HeaderValue, Request},
    middleware,
    routing::{delete, get, patch, post, put},
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::{AuthService, IntegrationService};
use crate::state::SharedState;

pub mod auth;
mod bulk_upload;
mod error;
mod integrations;
mod types;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn integration_service(&self) -> &Arc<dyn IntegrationService> {
        &self.shared.integration_service
    }
}

/// JSON body extractor whose rejections use the envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejections use the envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

#[must_use]
pub fn create_app_state(shared: Arc<SharedState>) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
    })
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared))
}

#[derive(Serialize)]
struct HealthDto {
    status: &'static str,
    uptime_seconds: u64,
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> Result<ApiResponse<HealthDto>, ApiError> {
    state.store().ping().await?;
    Ok(ApiResponse::success(
        "Service is healthy",
        HealthDto {
            status: "ok",
            uptime_seconds: state.start_time.elapsed().as_secs(),
        },
    ))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health))
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    api_router
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let upload_limit = state.config().import.max_upload_bytes;

    Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::get_current_user))
        .route("/integrations", post(integrations::create_integration))
        .route(
            "/integrations/bulk-upload",
            post(bulk_upload::bulk_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/get-all-integrations",
            get(integrations::list_integrations),
        )
        .route(
            "/get-integrations/{id}",
            get(integrations::get_integration),
        )
        .route(
            "/edit-integrations/{id}",
            put(integrations::update_integration),
        )
        .route(
            "/delete-integrations/{id}",
            delete(integrations::delete_integration),
        )
        .route(
            "/integrations/{id}/toggle-status",
            patch(integrations::toggle_integration_status),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
