//! SHA-256 binding for ledger chain linkage.
//!
//! Grounded on the teacher's `physics/hashing.rs` (a dedicated hashing
//! module with a named `Digest` type and a single canonical hash function),
//! but delegating the FIPS 180-4 computation itself to the `sha2` crate
//! rather than a hand-rolled transcription — the teacher's own sibling
//! crates in the example pack (`Mehd1b-Tokamak-AI-Layer`, `logannye-tinyzkp`)
//! already reach for `sha2` for exactly this purpose.

use sha2::{Digest as _, Sha256};

/// A SHA-256 digest: 32 bytes.
pub type Digest = [u8; 32];

/// Compute SHA-256 over an arbitrary byte slice.
pub fn sha256(input: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let out = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&out);
    digest
}

/// Render a digest as lowercase hex, truncated to `prefix_len` bytes. The
/// full digest is always used for chain linkage; truncation is for display
/// only (spec §6 `hash_prefix_length`).
pub fn to_hex(digest: &Digest, prefix_len: usize) -> String {
    let len = prefix_len.min(digest.len());
    digest[..len].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_matches_known_vector() {
        let digest = sha256(b"");
        assert_eq!(
            to_hex(&digest, 32),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_is_deterministic() {
        assert_eq!(sha256(b"hello"), sha256(b"hello"));
    }

    #[test]
    fn different_inputs_produce_different_digests() {
        assert_ne!(sha256(b"hello"), sha256(b"world"));
    }

    #[test]
    fn to_hex_truncates_to_requested_length() {
        let digest = sha256(b"hello");
        assert_eq!(to_hex(&digest, 4).len(), 8);
    }
}
