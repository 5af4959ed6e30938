//! Crate-wide error model.
//!
//! Mirrors the teacher's per-module `thiserror` enums (one error type per
//! component) unified behind a single `AppError` so the HTTP surface and the
//! WebSocket codec can map any failure to both an HTTP status / `{detail}`
//! body and a wire `error{message}` frame without re-deriving the message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::network::auth::AuthError;
use crate::network::codec::CodecError;

/// The wire-level error kind surfaced to clients, per spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthRequired,
    AuthInvalid,
    NotFound,
    Forbidden,
    Full,
    NotAccepting,
    BadMessage,
    PendingQuestion,
    Expired,
    SlowConsumer,
    HeartbeatTimeout,
    Internal,
}

impl ErrorKind {
    /// The wire string for this kind, per spec §7's error-kind catalogue.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::AuthInvalid => "auth_invalid",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Full => "full",
            ErrorKind::NotAccepting => "not_accepting",
            ErrorKind::BadMessage => "bad_message",
            ErrorKind::PendingQuestion => "pending_question",
            ErrorKind::Expired => "expired",
            ErrorKind::SlowConsumer => "slow_consumer",
            ErrorKind::HeartbeatTimeout => "heartbeat_timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors raised while a [`crate::session::actor::SessionActor`] processes a command.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is full")]
    Full,
    #[error("session is not accepting players")]
    NotAccepting,
    #[error("a question is already pending for this player")]
    PendingQuestion,
    #[error("question expired or does not match the pending question")]
    Expired,
    #[error("bad message: {0}")]
    BadMessage(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal session error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Full => ErrorKind::Full,
            SessionError::NotAccepting => ErrorKind::NotAccepting,
            SessionError::PendingQuestion => ErrorKind::PendingQuestion,
            SessionError::Expired => ErrorKind::Expired,
            SessionError::BadMessage(_) => ErrorKind::BadMessage,
            SessionError::Forbidden(_) => ErrorKind::Forbidden,
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised by the session registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session not found")]
    NotFound,
    #[error("session has ended")]
    Ended,
    #[error("too many live sessions")]
    Capacity,
    #[error("session actor is unreachable")]
    ActorGone,
}

/// Top-level application error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("authentication required")]
    AuthRequired,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Codec(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Session(e) => match e {
                SessionError::Full => StatusCode::CONFLICT,
                SessionError::NotAccepting => StatusCode::CONFLICT,
                SessionError::NotFound(_) => StatusCode::NOT_FOUND,
                SessionError::Forbidden(_) => StatusCode::FORBIDDEN,
                SessionError::BadMessage(_) => StatusCode::BAD_REQUEST,
                SessionError::PendingQuestion | SessionError::Expired => StatusCode::BAD_REQUEST,
                SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Registry(e) => match e {
                RegistryError::NotFound => StatusCode::NOT_FOUND,
                RegistryError::Ended => StatusCode::GONE,
                RegistryError::Capacity => StatusCode::CONFLICT,
                RegistryError::ActorGone => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Codec(_) => ErrorKind::BadMessage,
            AppError::Auth(_) => ErrorKind::AuthInvalid,
            AppError::AuthRequired => ErrorKind::AuthRequired,
            AppError::BadRequest(_) => ErrorKind::BadMessage,
            AppError::Session(e) => e.kind(),
            AppError::Registry(e) => match e {
                RegistryError::NotFound => ErrorKind::NotFound,
                RegistryError::Ended => ErrorKind::NotFound,
                RegistryError::Capacity => ErrorKind::Full,
                RegistryError::ActorGone => ErrorKind::Internal,
            },
        }
    }
}

#[derive(Serialize)]
struct DetailBody {
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = DetailBody {
            detail: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
