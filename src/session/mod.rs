//! Session layer: the per-session actor and the process-wide registry that
//! owns a handle to each one.

pub mod actor;
pub mod registry;

pub use actor::{ActorConfig, JoinResult, ResultsSnapshot, SessionCommand, SessionHandle, SessionPreview};
pub use registry::Registry;
