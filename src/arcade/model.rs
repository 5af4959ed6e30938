//! Data model: Session, Player, Question and the enums/config types that
//! describe them. Field-level serialization follows the teacher's tagged
//! JSON convention; wire-format specifics live in `network::codec`.

use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::arcade::scoring::ScoreState;
use crate::error::ErrorKind;
use crate::network::codec::ServerMessage;

/// Handle used by the session actor to push outbound messages onto a
/// connection's bounded writer queue (spec §4.2), and to force-close a
/// misbehaving connection out of band when that queue is saturated.
#[derive(Clone)]
pub struct ConnHandle {
    tx: mpsc::Sender<ServerMessage>,
    closer: mpsc::Sender<ErrorKind>,
}

impl ConnHandle {
    pub fn new(tx: mpsc::Sender<ServerMessage>, closer: mpsc::Sender<ErrorKind>) -> Self {
        Self { tx, closer }
    }

    /// Enqueue `msg` without blocking. `Err(TrySendError::Full(_))` means
    /// the connection is a slow consumer; the caller should `force_close`
    /// it. `Err(TrySendError::Closed(_))` means the connection is already
    /// gone.
    pub fn try_send(
        &self,
        msg: ServerMessage,
    ) -> Result<(), mpsc::error::TrySendError<ServerMessage>> {
        self.tx.try_send(msg)
    }

    /// Ask the connection's writer pump to close with `reason`, bypassing
    /// the outbound queue (which may itself be the reason it's full).
    pub fn force_close(&self, reason: ErrorKind) {
        let _ = self.closer.try_send(reason);
    }
}

/// Ten fixed arcade-game tags a session may be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Platformer,
    Runner,
    Shooter,
    Maze,
    TowerDefense,
    Racer,
    Puzzle,
    Rhythm,
    Dodger,
    Climber,
}

/// Whether a teacher is only monitoring or is also playing their own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeacherMode {
    Monitor,
    Play,
}

/// Session lifecycle state. Transitions are enforced by the session actor,
/// not by this type — see `session::actor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    Lobby,
    Active,
    Paused,
    Ended,
}

/// Arithmetic operation enabled for math-generated questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operation {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Sub => "-",
            Operation::Mul => "\u{d7}",
            Operation::Div => "\u{f7}",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Sub => "sub",
            Operation::Mul => "mul",
            Operation::Div => "div",
        }
    }
}

/// Which question source a session draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSourceKind {
    Math,
    Bank,
}

/// Parameters for the math question generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathConfig {
    pub operations: Vec<Operation>,
    pub min_operand: i64,
    pub max_operand: i64,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            operations: vec![Operation::Add, Operation::Sub],
            min_operand: 1,
            max_operand: 12,
        }
    }
}

/// Per-session configuration, supplied at creation and immutable afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub time_limit_seconds: u32,
    pub max_players: u32,
    pub question_source: QuestionSourceKind,
    pub math_config: Option<MathConfig>,
    pub bank_questions: Option<Vec<BankQuestionSpec>>,
}

/// A question supplied in a bank, prior to being assigned a server-side id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankQuestionSpec {
    pub text: String,
    pub options: [String; 4],
    pub correct_index: u8,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

/// A question handed to a player. `correct_index` is withheld from the
/// wire representation sent to that player until they have answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub text: String,
    pub options: [String; 4],
    pub correct_index: u8,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque player identifier, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Human-legible public session code: 6 characters drawn from
/// `A-Z` minus `I, O` (visually ambiguous with `1`/`0`), digits `2-9`.
pub const SESSION_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const SESSION_CODE_LEN: usize = 6;

pub fn generate_session_code(rng: &mut crate::core::DeterministicRng) -> String {
    (0..SESSION_CODE_LEN)
        .map(|_| {
            let idx = rng.next_int(SESSION_CODE_ALPHABET.len() as u32) as usize;
            SESSION_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Per-session player record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub display_name: String,
    pub player_token: String,
    pub is_teacher: bool,
    #[serde(skip)]
    pub connected: bool,
    pub joined_at: i64,
    pub score: ScoreState,
    #[serde(skip)]
    pub seen_question_ids: HashSet<String>,
    #[serde(skip)]
    pub bank_recent: VecDeque<String>,
    pub run_score_history: Vec<u64>,
    #[serde(skip)]
    pub conn: Option<ConnHandle>,
    #[serde(skip)]
    pub pending_question: Option<Question>,
    #[serde(skip)]
    pub pending_issued_at: Option<i64>,
    #[serde(skip)]
    pub last_pong_at: Option<i64>,
}

impl Player {
    pub fn new(display_name: String, is_teacher: bool) -> Self {
        Self {
            player_id: PlayerId::new(),
            display_name,
            player_token: mint_player_token(),
            is_teacher,
            connected: false,
            joined_at: now_unix(),
            score: ScoreState::default(),
            seen_question_ids: HashSet::new(),
            bank_recent: VecDeque::new(),
            run_score_history: Vec::new(),
            conn: None,
            pending_question: None,
            pending_issued_at: None,
            last_pong_at: None,
        }
    }
}

/// Mint a 128-bit random hex-encoded player token. Never persisted
/// externally, never logged.
pub fn mint_player_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Normalize and validate a display name per spec §6.1: 2-50 Unicode code
/// points after NFC normalization and trimming; rejects control characters.
pub fn normalize_display_name(raw: &str) -> Result<String, String> {
    let trimmed: String = raw.trim().nfc().collect();
    let len = trimmed.chars().count();
    if len < 2 || len > 50 {
        return Err("name must be 2-50 characters".to_string());
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err("name contains control characters".to_string());
    }
    Ok(trimmed)
}

/// The central session entity.
pub struct Session {
    pub id: SessionId,
    pub code: String,
    pub teacher_id: String,
    pub teacher_mode: TeacherMode,
    pub game_type: GameType,
    pub status: SessionStatus,
    pub config: SessionConfig,
    pub timer_end_wall: Option<i64>,
    pub remaining_on_pause: Option<i64>,
    pub players: Vec<Player>,
    pub host_conn: Option<ConnHandle>,
    pub host_teacher_id: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub ended_at: Option<i64>,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: String,
        teacher_id: String,
        teacher_mode: TeacherMode,
        game_type: GameType,
        config: SessionConfig,
    ) -> Self {
        Self {
            id: SessionId::new(),
            code,
            teacher_id,
            teacher_mode,
            game_type,
            status: SessionStatus::Lobby,
            config,
            timer_end_wall: None,
            remaining_on_pause: None,
            players: Vec::new(),
            host_conn: None,
            host_teacher_id: None,
            created_at: now_unix(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn player_by_id(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == id)
    }

    pub fn player_by_id_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.player_id == id)
    }

    pub fn player_by_token(&self, token: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.player_token == token)
    }

    /// Dedup display names within a session: case-insensitive match appends
    /// `#2`, `#3`, etc.
    pub fn dedup_display_name(&self, candidate: &str) -> String {
        let lower = candidate.to_lowercase();
        let collisions = self
            .players
            .iter()
            .filter(|p| p.display_name.to_lowercase() == lower)
            .count();
        if collisions == 0 {
            candidate.to_string()
        } else {
            format!("{candidate}#{}", collisions + 1)
        }
    }
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_normalization_trims_and_validates_length() {
        assert_eq!(normalize_display_name("  Ada  ").unwrap(), "Ada");
        assert!(normalize_display_name("A").is_err());
        assert!(normalize_display_name(&"x".repeat(51)).is_err());
    }

    #[test]
    fn name_normalization_rejects_control_chars() {
        assert!(normalize_display_name("Ada\u{0007}").is_err());
    }

    #[test]
    fn player_token_is_32_hex_chars() {
        let token = mint_player_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn session_code_uses_restricted_alphabet() {
        let mut rng = crate::core::DeterministicRng::new(7);
        let code = generate_session_code(&mut rng);
        assert_eq!(code.len(), SESSION_CODE_LEN);
        assert!(code
            .bytes()
            .all(|b| SESSION_CODE_ALPHABET.contains(&b)));
    }
}
