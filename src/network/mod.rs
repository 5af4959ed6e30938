//! Network layer: wire codec, teacher/player token auth, and the
//! per-connection reader/writer pump (spec §4.1, §4.2, §4.8). Session state
//! itself lives one level up, in `session` — this layer only ever talks to
//! it through `SessionCommand`.

pub mod auth;
pub mod codec;
pub mod connection;

pub use auth::{validate_token, AuthConfig, AuthError, TokenClaims};
pub use codec::{decode_client_message, encode_server_message, ClientMessage, Role, ServerMessage};
pub use connection::ConnectionConfig;
