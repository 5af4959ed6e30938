//! Codec (spec §4.1): tagged JSON wire messages, schema validation, and the
//! 64 KiB payload cap. Follows the teacher's `protocol.rs` convention of one
//! tagged enum per direction plus `to_json`/`from_json` helpers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arcade::awards::Award;
use crate::arcade::leaderboard::LeaderboardEntry;

/// Maximum accepted payload size for a single WebSocket text frame.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("message exceeds {MAX_PAYLOAD_BYTES} bytes")]
    PayloadTooLarge,
    #[error("message is missing a \"type\" field")]
    MissingType,
    #[error("unrecognized message type: {0}")]
    UnknownType(String),
    #[error("message does not match the expected schema: {0}")]
    SchemaViolation(String),
}

/// Which role a connection identified itself as on `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Player,
}

/// Inbound messages, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Init {
        role: Role,
        #[serde(skip_serializing_if = "Option::is_none")]
        teacher_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        player_token: Option<String>,
    },
    Death {
        score: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    Answer {
        question_id: String,
        answer_index: u8,
        time_ms: u64,
    },
    ScoreUpdate {
        score: u64,
    },
    SpecialEvent {
        event: serde_json::Value,
    },
    StartSession,
    PauseSession,
    ResumeSession,
    EndSession,
    Pong,
}

/// Outbound messages, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    HostState {
        session: serde_json::Value,
    },
    PlayerState {
        player: serde_json::Value,
    },
    PlayerConnected {
        player_id: String,
        display_name: String,
        player_count: u32,
    },
    PlayerDisconnected {
        player_id: String,
    },
    SessionStarted {
        game_type: String,
        time_limit_seconds: u32,
    },
    SessionPaused,
    SessionResumed {
        remaining_seconds: i64,
    },
    SessionEnded {
        final_leaderboard: Vec<LeaderboardEntry>,
        awards: Vec<Award>,
    },
    Question {
        question_id: String,
        text: String,
        options: [String; 4],
        category: Option<String>,
        difficulty: Option<String>,
    },
    AnswerCorrect {
        bonus_earned: u64,
        total_score: u64,
        current_streak: u32,
        streak_multiplier: f64,
        comeback_credits: u8,
        comeback_start_score: u64,
        respawn: bool,
    },
    AnswerWrong {
        correct_index: u8,
        respawn: bool,
    },
    LeaderboardUpdate {
        entries: Vec<LeaderboardEntry>,
    },
    LiveEvent {
        player_id: String,
        event: serde_json::Value,
    },
    PlayerScoreUpdate {
        player_id: String,
        score: u64,
    },
    Ping {
        t: i64,
    },
    Error {
        message: String,
    },
}

/// Decode an inbound client frame, enforcing the size cap and presence of a
/// recognized `type` tag.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, CodecError> {
    if raw.len() > MAX_PAYLOAD_BYTES {
        return Err(CodecError::PayloadTooLarge);
    }
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| CodecError::SchemaViolation(e.to_string()))?;
    if value.get("type").is_none() {
        return Err(CodecError::MissingType);
    }
    serde_json::from_value(value).map_err(|e| {
        let msg = e.to_string();
        if msg.contains("unknown variant") {
            CodecError::UnknownType(msg)
        } else {
            CodecError::SchemaViolation(msg)
        }
    })
}

/// Encode an outbound server message as a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> String {
    serde_json::to_string(msg).expect("ServerMessage always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_valid_message() {
        let msg = ClientMessage::Answer {
            question_id: "abc".into(),
            answer_index: 2,
            time_ms: 1500,
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        match decoded {
            ClientMessage::Answer {
                question_id,
                answer_index,
                time_ms,
            } => {
                assert_eq!(question_id, "abc");
                assert_eq!(answer_index, 2);
                assert_eq!(time_ms, 1500);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_type() {
        let err = decode_client_message(r#"{"score": 5}"#).unwrap_err();
        assert!(matches!(err, CodecError::MissingType));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = decode_client_message(r#"{"type": "teleport"}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnknownType(_)));
    }

    #[test]
    fn rejects_oversized_payload() {
        let huge = format!(
            r#"{{"type": "special_event", "event": "{}"}}"#,
            "x".repeat(MAX_PAYLOAD_BYTES + 10)
        );
        let err = decode_client_message(&huge).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge));
    }

    #[test]
    fn rejects_schema_violation_for_missing_required_field() {
        let err = decode_client_message(r#"{"type": "answer", "question_id": "abc"}"#).unwrap_err();
        assert!(matches!(err, CodecError::SchemaViolation(_)));
    }
}
