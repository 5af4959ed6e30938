//! # Review Arcade Session Server
//!
//! The real-time session server behind Review Arcade: it holds each
//! classroom session's authoritative state, multiplexes WebSocket
//! connections, runs the server-side scoring and question-gating
//! protocol, and broadcasts state to a host and its players with low
//! latency and consistent ordering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 REVIEW ARCADE SESSION SERVER                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  core/     - Deterministic primitives (seeded RNG, hashing)    │
//! │  arcade/   - Domain model, scoring, question sourcing,         │
//! │              leaderboard ranking, end-of-session awards        │
//! │  session/  - The per-session actor and the process registry    │
//! │  network/  - Wire codec, connection pump, teacher/player auth  │
//! │  http/     - REST endpoints + WebSocket upgrade dispatch       │
//! │  config    - Environment-driven ServerConfig                   │
//! │  error     - Crate-wide AppError unifying component errors     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-writer discipline: every mutation of a session's state happens on
//! that session's actor task, reached only through its command inbox. All
//! other tasks — connection pumps, HTTP handlers, the registry's reaper —
//! communicate with it exclusively by message.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod arcade;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod network;
pub mod session;

pub use config::ServerConfig;
pub use error::AppError;
pub use session::Registry;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
