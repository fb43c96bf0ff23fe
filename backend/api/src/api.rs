//! Axum REST API: shared state, handlers and the route table.

use std::sync::Arc;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::admin::{
    self, CreateProjectRequest, LoginRequest, RegisterRequest, Session, UpdateProjectRequest,
};
use crate::auth::{self, AdminIdentity, TokenIssuer};
use crate::errors::{AppError, Result};
use crate::models::{Project, Stake};
use crate::projects::{self, ListParams};
use crate::stakes::{self, CreateStakeRequest};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub tokens: TokenIssuer,
}

/// JSON body extractor whose rejections use the API's error shape.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query-string extractor whose rejections use the API's error shape.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path-parameter extractor whose rejections use the API's error shape.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct ApiInfoResponse {
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub message: &'static str,
    pub project: Project,
}

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub projects: Vec<Project>,
}

#[derive(Serialize)]
pub struct StakeResponse {
    pub message: &'static str,
    pub stake: Stake,
}

#[derive(Serialize)]
pub struct StakesResponse {
    pub stakes: Vec<Stake>,
}

// ─────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/admin/projects",
            post(create_project).get(list_admin_projects),
        )
        .route(
            "/api/admin/projects/:id",
            put(update_project).delete(delete_project),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/api/admin/register", post(register))
        .route("/api/admin/login", post(login))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/stake", post(create_stake))
        .route("/api/projects/stakes/:address", get(get_stakes_by_address))
        .route("/api/projects/:id", get(get_project))
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `GET /api`
pub async fn api_info() -> impl IntoResponse {
    Json(ApiInfoResponse {
        message: "Welcome to StakeStream API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/admin/register`
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let session = admin::register(&state.pool, &state.tokens, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            message: "Admin registered successfully",
            session,
        }),
    ))
}

/// `POST /api/admin/login`
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let session = admin::login(&state.pool, &state.tokens, req).await?;
    Ok(Json(SessionResponse {
        message: "Login successful",
        session,
    }))
}

/// `POST /api/admin/projects`
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AdminIdentity>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse> {
    let project = admin::create_project(&state.pool, &caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            message: "Project created successfully",
            project,
        }),
    ))
}

/// `GET /api/admin/projects`
pub async fn list_admin_projects(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AdminIdentity>,
) -> Result<impl IntoResponse> {
    let projects = admin::list_mine(&state.pool, &caller).await?;
    Ok(Json(ProjectsResponse { projects }))
}

/// `PUT /api/admin/projects/:id`
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AdminIdentity>,
    ApiPath(id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateProjectRequest>,
) -> Result<impl IntoResponse> {
    let project = admin::update_project(&state.pool, &caller, &id, req).await?;
    Ok(Json(ProjectResponse {
        message: "Project updated successfully",
        project,
    }))
}

/// `DELETE /api/admin/projects/:id`
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AdminIdentity>,
    ApiPath(id): ApiPath<String>,
) -> Result<impl IntoResponse> {
    admin::delete_project(&state.pool, &caller, &id).await?;
    Ok(Json(MessageResponse {
        message: "Project deleted successfully",
    }))
}

/// `GET /api/projects?status&tag&sort&page&limit`
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse> {
    Ok(Json(projects::list(&state.pool, params).await?))
}

/// `GET /api/projects/:id`
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<String>,
) -> Result<impl IntoResponse> {
    Ok(Json(projects::get_by_id(&state.pool, &id).await?))
}

/// `POST /api/projects/stake`
pub async fn create_stake(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateStakeRequest>,
) -> Result<impl IntoResponse> {
    let stake = stakes::create_stake(&state.pool, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(StakeResponse {
            message: "Stake intent created successfully",
            stake,
        }),
    ))
}

/// `GET /api/projects/stakes/:address`
pub async fn get_stakes_by_address(
    State(state): State<Arc<AppState>>,
    ApiPath(address): ApiPath<String>,
) -> Result<impl IntoResponse> {
    let stakes = stakes::list_by_address(&state.pool, &address).await?;
    Ok(Json(StakesResponse { stakes }))
}

// ─────────────────────────────────────────────────────────
// Router tests
// ─────────────────────────────────────────────────────────
