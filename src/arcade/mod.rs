//! Game-agnostic arcade domain: data model, scoring, question sourcing,
//! leaderboard ranking, and end-of-session awards.

pub mod awards;
pub mod leaderboard;
pub mod model;
pub mod question;
pub mod scoring;

pub use model::{
    GameType, MathConfig, Player, PlayerId, Question, Session, SessionConfig, SessionId,
    SessionStatus, TeacherMode,
};
pub use question::QuestionSource;
pub use scoring::ScoreState;
