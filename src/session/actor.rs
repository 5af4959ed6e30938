//! Session Actor (spec §4.5) — the single-writer owner of one session's
//! state. Mirrors the teacher's per-`MatchSession` ownership model, but
//! collapses the teacher's callback-heavy flows into one inbox loop, per the
//! redesign note in spec §9.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::arcade::awards::{compute_awards, Award};
use crate::arcade::leaderboard::{leaderboard_view_for, rank_players, LeaderboardEntry};
use crate::arcade::model::{
    now_unix, ConnHandle, GameType, Player, PlayerId, QuestionSourceKind, Session, SessionConfig,
    SessionStatus, TeacherMode,
};
use crate::arcade::question::{BankSampler, MathGenerator, QuestionSource};
use crate::arcade::scoring::{answer_correct, answer_wrong, death};
use crate::core::DeterministicRng;
use crate::error::{ErrorKind, SessionError};
use crate::network::codec::ServerMessage;

/// Public-facing preview used by `GET /sessions/{code}`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPreview {
    pub code: String,
    pub status: SessionStatus,
    pub game_type: GameType,
    pub player_count: u32,
    pub max_players: u32,
}

/// Returned by a successful `join`/`join-teacher` REST call.
#[derive(Debug, Clone, Serialize)]
pub struct JoinResult {
    pub player_id: String,
    pub display_name: String,
    pub session_code: String,
    pub player_token: String,
    pub is_teacher: bool,
    pub joined_at: i64,
}

/// Final-results payload for `GET /sessions/{id}/results`.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsSnapshot {
    pub status: SessionStatus,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub awards: Vec<Award>,
}

/// Commands accepted on a session actor's inbox.
pub enum SessionCommand {
    HostConnected {
        conn: ConnHandle,
        teacher_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    PlayerConnected {
        conn: ConnHandle,
        token: String,
        reply: oneshot::Sender<Result<PlayerId, SessionError>>,
    },
    Disconnect {
        player_id: Option<PlayerId>,
        is_host: bool,
    },
    StartSession {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    PauseSession {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    ResumeSession {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    EndSession {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Death {
        player_id: PlayerId,
        run_score: u64,
        metadata: Option<serde_json::Value>,
    },
    Answer {
        player_id: PlayerId,
        question_id: String,
        answer_index: u8,
        time_ms: u64,
    },
    ScoreUpdate {
        player_id: PlayerId,
        score: u64,
    },
    SpecialEvent {
        player_id: PlayerId,
        event: serde_json::Value,
    },
    Pong {
        player_id: Option<PlayerId>,
        is_host: bool,
    },
    Tick,
    Preview {
        reply: oneshot::Sender<SessionPreview>,
    },
    Join {
        display_name: String,
        reply: oneshot::Sender<Result<JoinResult, SessionError>>,
    },
    JoinTeacher {
        teacher_id: String,
        reply: oneshot::Sender<Result<JoinResult, SessionError>>,
    },
    Results {
        reply: oneshot::Sender<ResultsSnapshot>,
    },
}

/// Handle used by the registry and the HTTP surface to talk to a running
/// session actor.
#[derive(Clone)]
pub struct SessionHandle {
    pub code: String,
    pub id: String,
    pub teacher_id: String,
    pub created_at: i64,
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub async fn send(&self, cmd: SessionCommand) -> Result<(), crate::error::RegistryError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| crate::error::RegistryError::ActorGone)
    }

    /// Whether the actor's inbox has been dropped, i.e. the actor has
    /// stopped running.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Tuning knobs the actor needs but that live in `ServerConfig`.
#[derive(Clone, Copy)]
pub struct ActorConfig {
    pub answer_timeout_seconds: i64,
    pub reap_grace_seconds: i64,
    /// How long a session may sit in `lobby` without being started before
    /// its actor ends it and exits (spec's idle-lobby garbage collection).
    pub lobby_ttl_seconds: i64,
}

/// Spawn a new session actor for a freshly created session, returning a
/// handle to it.
pub fn spawn(
    code: String,
    teacher_id: String,
    teacher_mode: TeacherMode,
    game_type: GameType,
    config: SessionConfig,
    actor_config: ActorConfig,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(256);
    let session = Session::new(code.clone(), teacher_id.clone(), teacher_mode, game_type, config);
    let id = session.id.0.to_string();
    let created_at = session.created_at;
    let question_source = build_question_source(&session);

    let actor = SessionActor {
        session,
        question_source,
        actor_config,
        rx,
    };
    tokio::spawn(actor.run());

    SessionHandle {
        code,
        id,
        teacher_id,
        created_at,
        tx,
    }
}

fn build_question_source(session: &Session) -> Box<dyn QuestionSource> {
    let rng = DeterministicRng::from_session_seed(&session.code, session.created_at);
    match session.config.question_source {
        QuestionSourceKind::Math => {
            let math_config = session.config.math_config.clone().unwrap_or_default();
            Box::new(MathGenerator::new(rng, math_config))
        }
        QuestionSourceKind::Bank => {
            let specs = session.config.bank_questions.clone().unwrap_or_default();
            Box::new(BankSampler::new(rng, specs))
        }
    }
}

struct SessionActor {
    session: Session,
    question_source: Box<dyn QuestionSource>,
    actor_config: ActorConfig,
    rx: mpsc::Receiver<SessionCommand>,
}

impl SessionActor {
    #[instrument(skip(self), fields(code = %self.session.code))]
    async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ended_since: Option<i64> = None;

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => {
                            debug!("session inbox closed, actor exiting");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.handle(SessionCommand::Tick);
                }
            }

            self.maybe_expire_lobby();

            if self.session.status == SessionStatus::Ended {
                let since = *ended_since.get_or_insert_with(now_unix);
                if now_unix() - since >= self.actor_config.reap_grace_seconds {
                    debug!("reap grace elapsed, actor exiting");
                    break;
                }
            }
        }
    }

    fn handle(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::HostConnected {
                conn,
                teacher_id,
                reply,
            } => self.on_host_connected(conn, teacher_id, reply),
            SessionCommand::PlayerConnected { conn, token, reply } => {
                self.on_player_connected(conn, token, reply)
            }
            SessionCommand::Disconnect { player_id, is_host } => {
                self.on_disconnect(player_id, is_host)
            }
            SessionCommand::StartSession { reply } => self.on_start(reply),
            SessionCommand::PauseSession { reply } => self.on_pause(reply),
            SessionCommand::ResumeSession { reply } => self.on_resume(reply),
            SessionCommand::EndSession { reply } => {
                let result = self.end_session();
                let _ = reply.send(result);
            }
            SessionCommand::Death {
                player_id,
                run_score,
                metadata,
            } => self.on_death(player_id, run_score, metadata),
            SessionCommand::Answer {
                player_id,
                question_id,
                answer_index,
                time_ms,
            } => self.on_answer(player_id, question_id, answer_index, time_ms),
            SessionCommand::ScoreUpdate { player_id, score } => {
                self.forward_score_update(player_id, score)
            }
            SessionCommand::SpecialEvent { player_id, event } => {
                self.forward_special_event(player_id, event)
            }
            SessionCommand::Pong { player_id, is_host } => self.on_pong(player_id, is_host),
            SessionCommand::Tick => self.on_tick(),
            SessionCommand::Preview { reply } => {
                let _ = reply.send(self.preview());
            }
            SessionCommand::Join { display_name, reply } => {
                let _ = reply.send(self.join(display_name, false));
            }
            SessionCommand::JoinTeacher { teacher_id, reply } => {
                if teacher_id != self.session.teacher_id {
                    let _ = reply.send(Err(SessionError::Forbidden(
                        "not this session's teacher".into(),
                    )));
                } else {
                    let _ = reply.send(self.join(teacher_id, true));
                }
            }
            SessionCommand::Results { reply } => {
                let _ = reply.send(self.results());
            }
        }
    }

    fn preview(&self) -> SessionPreview {
        SessionPreview {
            code: self.session.code.clone(),
            status: self.session.status,
            game_type: self.session.game_type,
            player_count: self.session.players.len() as u32,
            max_players: self.session.config.max_players,
        }
    }

    fn results(&self) -> ResultsSnapshot {
        ResultsSnapshot {
            status: self.session.status,
            leaderboard: rank_players(&self.session.players),
            awards: compute_awards(&self.session.players),
        }
    }

    fn join(&mut self, name: String, is_teacher: bool) -> Result<JoinResult, SessionError> {
        if self.session.status == SessionStatus::Ended {
            return Err(SessionError::NotAccepting);
        }
        if self.session.players.len() as u32 >= self.session.config.max_players {
            return Err(SessionError::Full);
        }

        let display_name = if is_teacher {
            "Teacher".to_string()
        } else {
            crate::arcade::model::normalize_display_name(&name).map_err(SessionError::BadMessage)?
        };
        let display_name = self.session.dedup_display_name(&display_name);

        let player = Player::new(display_name.clone(), is_teacher);
        let result = JoinResult {
            player_id: player.player_id.0.to_string(),
            display_name,
            session_code: self.session.code.clone(),
            player_token: player.player_token.clone(),
            is_teacher,
            joined_at: player.joined_at,
        };
        self.session.players.push(player);
        Ok(result)
    }

    fn on_host_connected(
        &mut self,
        conn: ConnHandle,
        teacher_id: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    ) {
        if teacher_id != self.session.teacher_id {
            let _ = reply.send(Err(SessionError::Forbidden("not this session's teacher".into())));
            return;
        }
        info!("host connected, superseding any prior host connection");
        let snapshot = self.host_state_snapshot();
        self.session.host_conn = Some(conn.clone());
        self.session.host_teacher_id = Some(teacher_id);
        self.deliver(conn, None, true, snapshot);
        let _ = reply.send(Ok(()));
    }

    fn on_player_connected(
        &mut self,
        conn: ConnHandle,
        token: String,
        reply: oneshot::Sender<Result<PlayerId, SessionError>>,
    ) {
        let Some(player) = self.session.player_by_token(&token) else {
            let _ = reply.send(Err(SessionError::NotFound("unknown player token".into())));
            return;
        };
        let player_id = player.player_id;
        let display_name = player.display_name.clone();

        if let Some(player) = self.session.player_by_id_mut(player_id) {
            player.conn = Some(conn.clone());
            player.connected = true;
        }

        let player_count = self.session.players.len() as u32;
        let snapshot = self.player_state_snapshot(player_id);
        self.deliver(conn, Some(player_id), false, snapshot);

        self.broadcast_to_host(ServerMessage::PlayerConnected {
            player_id: player_id.0.to_string(),
            display_name,
            player_count,
        });

        let _ = reply.send(Ok(player_id));
    }

    fn on_disconnect(&mut self, player_id: Option<PlayerId>, is_host: bool) {
        if is_host {
            self.session.host_conn = None;
            return;
        }
        let Some(player_id) = player_id else { return };
        if let Some(player) = self.session.player_by_id_mut(player_id) {
            player.conn = None;
            player.connected = false;
        }
        self.broadcast_to_host(ServerMessage::PlayerDisconnected {
            player_id: player_id.0.to_string(),
        });
    }

    fn on_start(&mut self, reply: oneshot::Sender<Result<(), SessionError>>) {
        if self.session.status != SessionStatus::Lobby {
            let _ = reply.send(Err(SessionError::BadMessage("session is not in lobby".into())));
            return;
        }
        if self.session.host_conn.is_none() {
            let _ = reply.send(Err(SessionError::Forbidden("no host attached".into())));
            return;
        }
        if self.session.teacher_mode == TeacherMode::Play && self.session.players.is_empty() {
            let _ = reply.send(Err(SessionError::BadMessage(
                "at least one player required".into(),
            )));
            return;
        }

        let now = now_unix();
        self.session.status = SessionStatus::Active;
        self.session.started_at = Some(now);
        self.session.timer_end_wall = Some(now + self.session.config.time_limit_seconds as i64);

        self.broadcast(ServerMessage::SessionStarted {
            game_type: format!("{:?}", self.session.game_type),
            time_limit_seconds: self.session.config.time_limit_seconds,
        });
        let _ = reply.send(Ok(()));
    }

    fn on_pause(&mut self, reply: oneshot::Sender<Result<(), SessionError>>) {
        if self.session.status != SessionStatus::Active {
            let _ = reply.send(Err(SessionError::BadMessage("session is not active".into())));
            return;
        }
        let now = now_unix();
        let remaining = self.session.timer_end_wall.unwrap_or(now) - now;
        self.session.remaining_on_pause = Some(remaining.max(0));
        self.session.status = SessionStatus::Paused;
        self.broadcast(ServerMessage::SessionPaused);
        let _ = reply.send(Ok(()));
    }

    fn on_resume(&mut self, reply: oneshot::Sender<Result<(), SessionError>>) {
        if self.session.status != SessionStatus::Paused {
            let _ = reply.send(Err(SessionError::BadMessage("session is not paused".into())));
            return;
        }
        let remaining = self.session.remaining_on_pause.unwrap_or(0);
        self.session.timer_end_wall = Some(now_unix() + remaining);
        self.session.status = SessionStatus::Active;
        self.broadcast(ServerMessage::SessionResumed {
            remaining_seconds: remaining,
        });
        let _ = reply.send(Ok(()));
    }

    /// Abandoned-lobby garbage collection: a session that never left
    /// `lobby` within `lobby_ttl_seconds` of its creation ends itself.
    fn maybe_expire_lobby(&mut self) {
        if self.session.status == SessionStatus::Lobby
            && now_unix() - self.session.created_at >= self.actor_config.lobby_ttl_seconds
        {
            debug!("lobby ttl elapsed, ending abandoned session");
            let _ = self.end_session();
        }
    }

    fn end_session(&mut self) -> Result<(), SessionError> {
        if matches!(
            self.session.status,
            SessionStatus::Ended | SessionStatus::Draft
        ) {
            return Err(SessionError::BadMessage("session already ended".into()));
        }
        self.session.status = SessionStatus::Ended;
        self.session.ended_at = Some(now_unix());

        let leaderboard = rank_players(&self.session.players);
        let awards = compute_awards(&self.session.players);
        self.broadcast(ServerMessage::SessionEnded {
            final_leaderboard: leaderboard,
            awards,
        });
        Ok(())
    }

    fn on_death(&mut self, player_id: PlayerId, run_score: u64, _metadata: Option<serde_json::Value>) {
        let timeout = self.actor_config.answer_timeout_seconds;
        let Some(player) = self.session.player_by_id_mut(player_id) else {
            return;
        };

        let pending_is_live = player
            .pending_issued_at
            .is_some_and(|issued_at| now_unix() - issued_at <= timeout);
        if player.pending_question.is_some() && pending_is_live {
            self.send_error_to_player(player_id, SessionError::PendingQuestion);
            return;
        }
        // An expired pending question is cleared here rather than left to
        // block every future death: the player is served a fresh question
        // on this death instead (spec §7 / §4.5).
        player.pending_question = None;
        player.pending_issued_at = None;
        player.score.pending_question_id = None;

        player.run_score_history.push(run_score);
        death(&mut player.score, run_score);

        let seen = player.seen_question_ids.clone();
        let recent = player.bank_recent.clone();
        let question = self.question_source.next_for_player(&seen, &recent);

        let Some(player) = self.session.player_by_id_mut(player_id) else {
            return;
        };
        player.seen_question_ids.insert(question.question_id.clone());
        player.score.pending_question_id = Some(question.question_id.clone());
        player.pending_issued_at = Some(now_unix());
        player.pending_question = Some(question.clone());

        self.send_to_player(
            player_id,
            ServerMessage::Question {
                question_id: question.question_id,
                text: question.text,
                options: question.options,
                category: question.category,
                difficulty: question.difficulty,
            },
        );
    }

    fn on_answer(
        &mut self,
        player_id: PlayerId,
        question_id: String,
        answer_index: u8,
        time_ms: u64,
    ) {
        let timeout = self.actor_config.answer_timeout_seconds;
        let Some(player) = self.session.player_by_id_mut(player_id) else {
            return;
        };

        let Some(pending) = player.pending_question.clone() else {
            self.send_error_to_player(player_id, SessionError::Expired);
            return;
        };
        let issued_at = player.pending_issued_at.unwrap_or(0);
        let expired = pending.question_id != question_id || now_unix() - issued_at > timeout;
        if expired {
            self.send_error_to_player(player_id, SessionError::Expired);
            return;
        }

        let correct = answer_index == pending.correct_index;
        let player = self.session.player_by_id_mut(player_id).unwrap();
        player.pending_question = None;
        player.pending_issued_at = None;

        if correct {
            let outcome = answer_correct(&mut player.score, time_ms);
            self.send_to_player(
                player_id,
                ServerMessage::AnswerCorrect {
                    bonus_earned: outcome.bonus_earned,
                    total_score: outcome.total_score,
                    current_streak: outcome.current_streak,
                    streak_multiplier: outcome.streak_multiplier,
                    comeback_credits: outcome.comeback_credits,
                    comeback_start_score: outcome.comeback_start_score,
                    respawn: outcome.respawn,
                },
            );
        } else {
            let _outcome = answer_wrong(&mut player.score, time_ms);
            self.send_to_player(
                player_id,
                ServerMessage::AnswerWrong {
                    correct_index: pending.correct_index,
                    respawn: false,
                },
            );
        }

        self.broadcast_leaderboard();
    }

    fn forward_score_update(&mut self, player_id: PlayerId, score: u64) {
        self.broadcast_to_host(ServerMessage::PlayerScoreUpdate {
            player_id: player_id.0.to_string(),
            score,
        });
    }

    fn forward_special_event(&mut self, player_id: PlayerId, event: serde_json::Value) {
        self.broadcast_to_host(ServerMessage::LiveEvent {
            player_id: player_id.0.to_string(),
            event,
        });
    }

    fn on_pong(&mut self, player_id: Option<PlayerId>, is_host: bool) {
        let now = now_unix();
        if is_host {
            return;
        }
        if let Some(id) = player_id {
            if let Some(player) = self.session.player_by_id_mut(id) {
                player.last_pong_at = Some(now);
            }
        }
    }

    fn on_tick(&mut self) {
        if self.session.status != SessionStatus::Active {
            return;
        }
        if let Some(deadline) = self.session.timer_end_wall {
            if now_unix() >= deadline {
                if let Err(e) = self.end_session() {
                    warn!("timer-driven end_session failed: {e}");
                }
            }
        }
    }

    fn send_error_to_player(&mut self, player_id: PlayerId, err: SessionError) {
        self.send_to_player(player_id, ServerMessage::Error { message: err.to_string() });
    }

    /// Enqueue `msg` on `conn`. A full queue makes the connection a slow
    /// consumer (spec §4.2/§7/scenario S6): force-close it with that reason
    /// and detach the owning player/host exactly as a `Disconnect` would,
    /// preserving their score state. A queue whose receiver is already gone
    /// just detaches.
    fn deliver(&mut self, conn: ConnHandle, player_id: Option<PlayerId>, is_host: bool, msg: ServerMessage) {
        match conn.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("slow consumer, force-closing connection");
                conn.force_close(ErrorKind::SlowConsumer);
                self.on_disconnect(player_id, is_host);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.on_disconnect(player_id, is_host);
            }
        }
    }

    fn send_to_player(&mut self, player_id: PlayerId, msg: ServerMessage) {
        let conn = self
            .session
            .player_by_id(player_id)
            .and_then(|p| p.conn.clone());
        if let Some(conn) = conn {
            self.deliver(conn, Some(player_id), false, msg);
        }
    }

    fn broadcast_to_host(&mut self, msg: ServerMessage) {
        let conn = self.session.host_conn.clone();
        if let Some(conn) = conn {
            self.deliver(conn, None, true, msg);
        }
    }

    fn broadcast(&mut self, msg: ServerMessage) {
        self.broadcast_to_host(msg.clone());
        let targets: Vec<(PlayerId, ConnHandle)> = self
            .session
            .players
            .iter()
            .filter_map(|p| p.conn.clone().map(|c| (p.player_id, c)))
            .collect();
        for (player_id, conn) in targets {
            self.deliver(conn, Some(player_id), false, msg.clone());
        }
    }

    fn broadcast_leaderboard(&mut self) {
        let entries = rank_players(&self.session.players);
        self.broadcast_to_host(ServerMessage::LeaderboardUpdate {
            entries: entries.clone(),
        });
        let targets: Vec<(PlayerId, ConnHandle)> = self
            .session
            .players
            .iter()
            .filter_map(|p| p.conn.clone().map(|c| (p.player_id, c)))
            .collect();
        for (player_id, conn) in targets {
            let view = leaderboard_view_for(&entries, &player_id.0.to_string());
            self.deliver(
                conn,
                Some(player_id),
                false,
                ServerMessage::LeaderboardUpdate { entries: view },
            );
        }
    }

    fn host_state_snapshot(&self) -> ServerMessage {
        ServerMessage::HostState {
            session: serde_json::json!({
                "code": self.session.code,
                "status": self.session.status,
                "game_type": self.session.game_type,
                "players": rank_players(&self.session.players),
            }),
        }
    }

    fn player_state_snapshot(&self, player_id: PlayerId) -> ServerMessage {
        let player = self.session.player_by_id(player_id);
        ServerMessage::PlayerState {
            player: serde_json::json!({
                "player_id": player_id.0.to_string(),
                "display_name": player.map(|p| p.display_name.clone()),
                "total_score": player.map(|p| p.score.total_score),
                "current_streak": player.map(|p| p.score.current_streak),
                "streak_multiplier": player.map(|p| p.score.streak_multiplier),
                "comeback_credits": player.map(|p| p.score.comeback_credits),
            }),
        }
    }
}
