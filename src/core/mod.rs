//! Deterministic primitives shared by the rest of the crate.

pub mod hash;
pub mod rng;

pub use hash::{question_id_for_math, StateHash, StateHasher};
pub use rng::DeterministicRng;
