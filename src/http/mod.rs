use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::engine::EngineError;
use crate::state::AppState;

mod assembly;
mod registry;
mod voting;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Router must be created during startup"
    );

    // The presentation layer is a separate browser app. Any origin is fine
    // while it runs off localhost; deployments pin this down.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let registry_router = registry::router().with_state(state.clone());
    let assembly_router = assembly::router().with_state(state.clone());
    let voting_router = voting::router().with_state(state.clone());
    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .merge(registry_router)
        .merge(assembly_router)
        .merge(voting_router)
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    assert!(uptime <= 31_536_000, "Uptime counter exceeds one year");
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .database
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let response = ReadyResponse {
        status: "ready",
        cache_entries: CacheSummary {
            voters: state.cache.voters.entry_count(),
            tallies: state.cache.tallies.entry_count(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    voters: u64,
    tallies: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error payloads need an error status");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Engine failures carry their own vocabulary; this keeps the status mapping
/// in one place so every handler reports them identically.
fn map_engine_error(err: EngineError) -> HttpError {
    let status = match &err {
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::AssemblyNotFound { .. } | EngineError::QuestionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::QuestionClosed { .. } | EngineError::QuestionNotActive { .. } => {
            StatusCode::CONFLICT
        }
        EngineError::UnknownOption { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::NotEligible { .. } => StatusCode::FORBIDDEN,
    };
    HttpError::new(status, err.to_string())
}
