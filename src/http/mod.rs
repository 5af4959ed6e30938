//! HTTP Surface (spec §4.7, §6.1): a stateless adapter over the Registry
//! and Session Actors. Parses REST requests, talks to the actor via its
//! request/response inbox, and serves the WebSocket upgrade for
//! `/ws/reviewarcade/{code}`. Mirrors the teacher's `axum::Router` +
//! `with_state` convention borrowed from the pack's other axum-based
//! example service, since the teacher's own network layer predates a REST
//! surface entirely (see DESIGN.md).

pub mod rest;
pub mod ws;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::network::auth::validate_token;
use crate::session::Registry;

/// Shared application state handed to every handler via axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub config: Arc<ServerConfig>,
}

/// Build the full REST + WebSocket router for the process.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/reviewarcade/sessions", post(rest::create_session).get(rest::list_sessions))
        .route("/api/reviewarcade/sessions/{code}", get(rest::preview_session))
        .route("/api/reviewarcade/sessions/{code}/join", post(rest::join_session))
        .route(
            "/api/reviewarcade/sessions/{code}/join-teacher",
            post(rest::join_session_as_teacher),
        )
        .route("/api/reviewarcade/sessions/{id}/results", get(rest::session_results))
        .route("/ws/reviewarcade/{code}", get(ws::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pull `Authorization: Bearer <token>` out of the request and verify it as
/// a teacher bearer token, per spec §4.8. Used at session-create,
/// join-as-teacher, and (separately, on the WS `init` frame) host connect.
pub fn extract_teacher_id(headers: &HeaderMap, config: &crate::network::auth::AuthConfig) -> Result<String, AppError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::AuthRequired)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AppError::BadRequest("expected a Bearer authorization header".into()))?;
    let claims = validate_token(token, config)?;
    Ok(claims.teacher_id().to_string())
}
