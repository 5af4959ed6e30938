//! Environment-driven server configuration.
//!
//! Follows the teacher's `AuthConfig::from_env` idiom: read each variable
//! with `.ok()`/a typed fallback, parsed once at startup and handed around
//! as an immutable `Arc<ServerConfig>`.

use crate::network::auth::AuthConfig;

/// Top-level server configuration, parsed once in `main`.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to.
    pub bind_addr: String,
    /// Grace period after a session ends before the registry reaps it.
    pub reap_grace_seconds: u64,
    /// TTL for a session that never leaves `lobby`.
    pub lobby_ttl_seconds: u64,
    /// Heartbeat ping interval for WebSocket connections.
    pub heartbeat_interval_seconds: u64,
    /// Time without a pong before a connection is dropped.
    pub heartbeat_timeout_seconds: u64,
    /// Window in which an `answer` is valid after a `question` was issued.
    pub answer_timeout_seconds: u64,
    /// Maximum number of live (non-ended) sessions this process will hold.
    pub max_sessions: usize,
    /// Bounded outbound queue size per connection.
    pub outbound_queue_capacity: usize,
    /// Teacher bearer-token verification config.
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            reap_grace_seconds: 60,
            lobby_ttl_seconds: 2 * 60 * 60,
            heartbeat_interval_seconds: 20,
            heartbeat_timeout_seconds: 45,
            answer_timeout_seconds: 120,
            max_sessions: 1000,
            outbound_queue_capacity: 256,
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build configuration from environment variables, falling back to
    /// spec-mandated defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            reap_grace_seconds: parse_env_or("REAP_GRACE_SECONDS", defaults.reap_grace_seconds),
            lobby_ttl_seconds: parse_env_or("LOBBY_TTL_SECONDS", defaults.lobby_ttl_seconds),
            heartbeat_interval_seconds: parse_env_or(
                "HEARTBEAT_INTERVAL_SECONDS",
                defaults.heartbeat_interval_seconds,
            ),
            heartbeat_timeout_seconds: parse_env_or(
                "HEARTBEAT_TIMEOUT_SECONDS",
                defaults.heartbeat_timeout_seconds,
            ),
            answer_timeout_seconds: parse_env_or(
                "ANSWER_TIMEOUT_SECONDS",
                defaults.answer_timeout_seconds,
            ),
            max_sessions: parse_env_or("MAX_SESSIONS", defaults.max_sessions),
            outbound_queue_capacity: defaults.outbound_queue_capacity,
            auth: AuthConfig::from_env(),
        }
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
