//! REST handlers (spec §6.1). Each one parses its request, round-trips a
//! command to the relevant session actor (or the Registry directly for
//! session creation), and serializes the actor's reply. No session state is
//! read or mutated here directly — this module stays a thin adapter, per
//! the HTTP Surface component's "stateless adapter" responsibility.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::arcade::model::{
    BankQuestionSpec, GameType, MathConfig, QuestionSourceKind, SessionConfig, SessionStatus,
    TeacherMode,
};
use crate::error::{AppError, RegistryError, SessionError};
use crate::http::{extract_teacher_id, AppState};
use crate::session::actor::{JoinResult, ResultsSnapshot, SessionHandle, SessionPreview};
use crate::session::SessionCommand;

const DEFAULT_LIST_LIMIT: usize = 20;
const MIN_TIME_LIMIT_SECONDS: u32 = 300;
const MAX_TIME_LIMIT_SECONDS: u32 = 3600;
const MIN_MAX_PLAYERS: u32 = 5;
const MAX_MAX_PLAYERS: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub game_type: GameType,
    pub teacher_mode: TeacherMode,
    pub time_limit_minutes: u32,
    pub max_players: u32,
    pub question_source: QuestionSourceKind,
    #[serde(default)]
    pub question_config: Option<MathConfig>,
    /// Ids into an external question bank. The bank persistence store is an
    /// out-of-scope collaborator (spec §1); this surface additionally
    /// accepts the bank content inline via `bank_questions` so a session can
    /// actually be created without that store wired in — see DESIGN.md.
    #[serde(default)]
    pub question_bank_ids: Option<Vec<String>>,
    #[serde(default)]
    pub bank_questions: Option<Vec<BankQuestionSpec>>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub code: String,
    pub status: SessionStatus,
    pub game_type: GameType,
    pub teacher_mode: TeacherMode,
    pub time_limit_seconds: u32,
    pub max_players: u32,
    pub created_at: i64,
}

pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<SessionSummary>, AppError> {
    let teacher_id = extract_teacher_id(&headers, &state.config.auth)?;

    let time_limit_seconds = body.time_limit_minutes.saturating_mul(60);
    if !(MIN_TIME_LIMIT_SECONDS..=MAX_TIME_LIMIT_SECONDS).contains(&time_limit_seconds) {
        return Err(AppError::BadRequest(format!(
            "time_limit_minutes must resolve to {MIN_TIME_LIMIT_SECONDS}-{MAX_TIME_LIMIT_SECONDS} seconds"
        )));
    }
    if !(MIN_MAX_PLAYERS..=MAX_MAX_PLAYERS).contains(&body.max_players) {
        return Err(AppError::BadRequest(format!(
            "max_players must be {MIN_MAX_PLAYERS}-{MAX_MAX_PLAYERS}"
        )));
    }

    let bank_questions = match body.question_source {
        QuestionSourceKind::Bank => {
            let questions = body.bank_questions.unwrap_or_default();
            if questions.is_empty() {
                return Err(AppError::BadRequest(
                    "question_source \"bank\" requires non-empty bank_questions".into(),
                ));
            }
            Some(questions)
        }
        QuestionSourceKind::Math => None,
    };

    let config = SessionConfig {
        time_limit_seconds,
        max_players: body.max_players,
        question_source: body.question_source,
        math_config: body.question_config,
        bank_questions,
    };

    let handle = state
        .registry
        .create(teacher_id, body.teacher_mode, body.game_type, config)
        .await?;
    let preview = preview_of(&handle).await?;

    Ok(Json(SessionSummary {
        id: handle.id,
        code: handle.code,
        status: preview.status,
        game_type: body.game_type,
        teacher_mode: body.teacher_mode,
        time_limit_seconds,
        max_players: body.max_players,
        created_at: handle.created_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub limit: Option<usize>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionPreview>>, AppError> {
    let teacher_id = extract_teacher_id(&headers, &state.config.auth)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(200);
    let handles = state.registry.list_for_teacher(&teacher_id, limit).await;

    let mut previews = Vec::with_capacity(handles.len());
    for handle in &handles {
        previews.push(preview_of(handle).await?);
    }
    Ok(Json(previews))
}

pub async fn preview_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<SessionPreview>, AppError> {
    let handle = state.registry.lookup(&code).await?;
    let preview = preview_of(&handle).await?;
    if preview.status == SessionStatus::Ended {
        return Err(AppError::Registry(RegistryError::Ended));
    }
    Ok(Json(preview))
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub name: String,
}

pub async fn join_session(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<JoinResult>, AppError> {
    let handle = state.registry.lookup(&code).await?;
    let (reply, rx) = oneshot::channel();
    handle
        .send(SessionCommand::Join {
            display_name: body.name,
            reply,
        })
        .await?;
    let result = rx.await.map_err(|_| RegistryError::ActorGone)??;
    Ok(Json(result))
}

pub async fn join_session_as_teacher(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<JoinResult>, AppError> {
    let teacher_id = extract_teacher_id(&headers, &state.config.auth)?;
    let handle = state.registry.lookup(&code).await?;
    let (reply, rx) = oneshot::channel();
    handle
        .send(SessionCommand::JoinTeacher { teacher_id, reply })
        .await?;
    let result = rx.await.map_err(|_| RegistryError::ActorGone)??;
    Ok(Json(result))
}

pub async fn session_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ResultsSnapshot>, AppError> {
    let teacher_id = extract_teacher_id(&headers, &state.config.auth)?;
    let handle = state.registry.lookup_by_id(&id).await?;
    if handle.teacher_id != teacher_id {
        return Err(AppError::Session(SessionError::Forbidden(
            "not this session's teacher".into(),
        )));
    }
    let (reply, rx) = oneshot::channel();
    handle.send(SessionCommand::Results { reply }).await?;
    let snapshot = rx.await.map_err(|_| RegistryError::ActorGone)?;
    Ok(Json(snapshot))
}

async fn preview_of(handle: &SessionHandle) -> Result<SessionPreview, AppError> {
    let (reply, rx) = oneshot::channel();
    handle.send(SessionCommand::Preview { reply }).await?;
    rx.await.map_err(|_| AppError::Registry(RegistryError::ActorGone))
}
