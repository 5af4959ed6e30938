//! State Hashing
//!
//! Deterministic hashing used to derive stable, content-addressed question
//! ids and to fingerprint scoring state for tests.

use sha2::{Digest, Sha256};

/// Hash output type (256 bits / 32 bytes).
pub type StateHash = [u8; 32];

/// Deterministic hasher wrapping SHA-256.
///
/// Order of updates is significant: the same fields updated in a different
/// order produce a different hash.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for math-generated question ids.
    pub fn for_question() -> Self {
        Self::new(b"REVIEW_ARCADE_QUESTION_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute hash with a domain separator in one call.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> StateHash {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}

/// Derive a stable question id for a math problem `a <op> b`.
///
/// Hex-encoded so it can travel as a plain JSON string and double as the
/// dedup key in a player's seen-question set.
pub fn question_id_for_math(a: i64, op: &str, b: i64) -> String {
    let mut hasher = StateHasher::for_question();
    hasher.update_i64(a);
    hasher.update_bytes(op.as_bytes());
    hasher.update_i64(b);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_hasher_determinism() {
        let make_hash = || {
            let mut hasher = StateHasher::new(b"test");
            hasher.update_u32(100);
            hasher.update_u64(12345);
            hasher.update_bool(true);
            hasher.finalize()
        };

        assert_eq!(make_hash(), make_hash());
    }

    #[test]
    fn test_hash_order_matters() {
        let hash1 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(1);
            h.update_u32(2);
            h.finalize()
        };

        let hash2 = {
            let mut h = StateHasher::new(b"test");
            h.update_u32(2);
            h.update_u32(1);
            h.finalize()
        };

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_domain_separation() {
        let data = [1u8, 2, 3, 4];
        let hash1 = hash_with_domain(b"DOMAIN_A", &data);
        let hash2 = hash_with_domain(b"DOMAIN_B", &data);
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_question_id_deterministic_and_order_sensitive() {
        let id1 = question_id_for_math(3, "add", 4);
        let id2 = question_id_for_math(3, "add", 4);
        assert_eq!(id1, id2);

        let id3 = question_id_for_math(4, "add", 3);
        assert_ne!(id1, id3);
    }
}
