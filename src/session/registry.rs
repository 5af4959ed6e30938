//! Session registry (spec §4.6): the process-wide map from session code to
//! a running actor, plus the background reaper that retires ended and
//! abandoned-lobby sessions. Mirrors the teacher's `RwLock<HashMap<...>>`
//! match registry, generalized from match ids to human-legible codes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::info;

use crate::arcade::model::{GameType, SessionConfig, TeacherMode};
use crate::config::ServerConfig;
use crate::core::DeterministicRng;
use crate::error::RegistryError;
use crate::session::actor::{self, ActorConfig, SessionHandle};

/// Shared, cloneable handle to the process-wide session registry.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<String, SessionHandle>>>,
    config: ServerConfig,
}

impl Registry {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// Create a new session with a freshly minted, collision-checked code,
    /// spawn its actor, and register it.
    pub async fn create(
        &self,
        teacher_id: String,
        teacher_mode: TeacherMode,
        game_type: GameType,
        config: SessionConfig,
    ) -> Result<SessionHandle, RegistryError> {
        let mut sessions = self.inner.write().await;
        if sessions.len() >= self.config.max_sessions {
            return Err(RegistryError::Capacity);
        }

        let mut rng = DeterministicRng::new(rand_seed());
        let code = loop {
            let candidate = crate::arcade::model::generate_session_code(&mut rng);
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let actor_config = ActorConfig {
            answer_timeout_seconds: self.config.answer_timeout_seconds as i64,
            reap_grace_seconds: self.config.reap_grace_seconds as i64,
            lobby_ttl_seconds: self.config.lobby_ttl_seconds as i64,
        };
        let handle = actor::spawn(code.clone(), teacher_id, teacher_mode, game_type, config, actor_config);
        sessions.insert(code, handle.clone());
        Ok(handle)
    }

    pub async fn lookup(&self, code: &str) -> Result<SessionHandle, RegistryError> {
        self.inner
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    /// Look up a session by its opaque `id` rather than its human-legible
    /// `code` (used by `GET /sessions/{id}/results`, per spec §6.1).
    pub async fn lookup_by_id(&self, id: &str) -> Result<SessionHandle, RegistryError> {
        self.inner
            .read()
            .await
            .values()
            .find(|h| h.id == id)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    /// Latest `limit` live sessions owned by `teacher_id`, newest first.
    /// Ended sessions are retired from this process-wide map once their
    /// actor's reap grace elapses (§4.6); long-term history for a teacher
    /// is the persistence store's concern, out of scope for the core.
    pub async fn list_for_teacher(&self, teacher_id: &str, limit: usize) -> Vec<SessionHandle> {
        let mut handles: Vec<SessionHandle> = self
            .inner
            .read()
            .await
            .values()
            .filter(|h| h.teacher_id == teacher_id)
            .cloned()
            .collect();
        handles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        handles.truncate(limit);
        handles
    }

    pub async fn remove(&self, code: &str) {
        self.inner.write().await.remove(code);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Spawn the background reaper: evicts sessions whose actor has dropped
    /// its inbox (ended + reap grace elapsed is handled by the actor itself
    /// shutting down; this just clears the now-dead registry entry) and
    /// lobby sessions that have sat unstarted past the configured TTL.
    pub fn spawn_reaper(&self) {
        let registry = self.clone();
        let period = Duration::from_secs(30.min(registry.config.lobby_ttl_seconds.max(1)));
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                registry.reap_once().await;
            }
        });
    }

    async fn reap_once(&self) {
        let mut sessions = self.inner.write().await;
        let mut dead = Vec::new();
        for (code, handle) in sessions.iter() {
            if handle.is_closed() {
                dead.push(code.clone());
            }
        }
        for code in &dead {
            sessions.remove(code);
        }
        if !dead.is_empty() {
            info!(count = dead.len(), "reaped dead session actors");
        }
    }
}

/// A lightweight, non-cryptographic seed for the session-code RNG. Session
/// codes are not a security boundary (player/teacher tokens are); only
/// collision-avoidance matters here.
fn rand_seed() -> u64 {
    use rand::RngCore;
    rand::thread_rng().next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arcade::model::{MathConfig, Operation, QuestionSourceKind};

    fn test_config() -> SessionConfig {
        SessionConfig {
            time_limit_seconds: 300,
            max_players: 30,
            question_source: QuestionSourceKind::Math,
            math_config: Some(MathConfig {
                operations: vec![Operation::Add],
                min_operand: 1,
                max_operand: 12,
            }),
            bank_questions: None,
        }
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips() {
        let registry = Registry::new(ServerConfig::default());
        let handle = registry
            .create(
                "teacher-1".into(),
                TeacherMode::Monitor,
                GameType::Runner,
                test_config(),
            )
            .await
            .unwrap();
        let found = registry.lookup(&handle.code).await.unwrap();
        assert_eq!(found.code, handle.code);
    }

    #[tokio::test]
    async fn lookup_by_id_finds_the_same_session_as_lookup_by_code() {
        let registry = Registry::new(ServerConfig::default());
        let handle = registry
            .create("teacher-1".into(), TeacherMode::Monitor, GameType::Runner, test_config())
            .await
            .unwrap();
        let found = registry.lookup_by_id(&handle.id).await.unwrap();
        assert_eq!(found.code, handle.code);
    }

    #[tokio::test]
    async fn list_for_teacher_filters_and_orders_newest_first() {
        let registry = Registry::new(ServerConfig::default());
        let _other = registry
            .create("teacher-2".into(), TeacherMode::Monitor, GameType::Runner, test_config())
            .await
            .unwrap();
        let mine_first = registry
            .create("teacher-1".into(), TeacherMode::Monitor, GameType::Runner, test_config())
            .await
            .unwrap();
        let mine_second = registry
            .create("teacher-1".into(), TeacherMode::Monitor, GameType::Runner, test_config())
            .await
            .unwrap();

        let listed = registry.list_for_teacher("teacher-1", 10).await;
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|h| h.teacher_id == "teacher-1"));
        assert!(listed.iter().any(|h| h.code == mine_first.code));
        assert!(listed.iter().any(|h| h.code == mine_second.code));
    }

    #[tokio::test]
    async fn lookup_unknown_code_errors() {
        let registry = Registry::new(ServerConfig::default());
        assert!(matches!(
            registry.lookup("NOPE00").await,
            Err(RegistryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn capacity_limit_is_enforced() {
        let mut config = ServerConfig::default();
        config.max_sessions = 1;
        let registry = Registry::new(config);
        registry
            .create("t1".into(), TeacherMode::Monitor, GameType::Runner, test_config())
            .await
            .unwrap();
        assert!(matches!(
            registry
                .create("t2".into(), TeacherMode::Monitor, GameType::Runner, test_config())
                .await,
            Err(RegistryError::Capacity)
        ));
    }
}
