//! Cryptographic fixtures for testing
//!
//! RSA key generation takes long enough that every test generating its own
//! keys would dominate the suite. Keys here are generated once per test
//! binary and handed out by slot.

use chrono::{DateTime, Utc};
use jwks_service::crypto::generate_private_key;
use jwks_service::models::KeyPair;
use rsa::RsaPrivateKey;
use std::sync::OnceLock;

/// Number of distinct fixture keys.
pub const FIXTURE_KEY_COUNT: usize = 4;

/// RSA-2048 private key for `slot`.
///
/// Slots wrap around, so `test_private_key(n)` and
/// `test_private_key(n + FIXTURE_KEY_COUNT)` are the same key.
pub fn test_private_key(slot: usize) -> RsaPrivateKey {
    static KEYS: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();

    let keys = KEYS.get_or_init(|| {
        (0..FIXTURE_KEY_COUNT)
            .map(|_| generate_private_key(2048).expect("fixture key generation failed"))
            .collect()
    });
    keys[slot % FIXTURE_KEY_COUNT].clone()
}

/// Key pair with a fixed `kid` built from fixture key `slot`.
pub fn test_key_pair(kid: &str, slot: usize, not_after: DateTime<Utc>) -> KeyPair {
    KeyPair::new(kid, test_private_key(slot), not_after)
}

/// Deterministic 32-byte master key for at-rest sealing tests.
pub fn test_master_key() -> Vec<u8> {
    (0u8..32).map(|i| i.wrapping_mul(7).wrapping_add(3)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixture_keys_are_cached_and_distinct() {
        assert_eq!(
            test_private_key(0).to_public_key(),
            test_private_key(0).to_public_key()
        );
        assert_eq!(
            test_private_key(1).to_public_key(),
            test_private_key(1 + FIXTURE_KEY_COUNT).to_public_key()
        );
        assert_ne!(
            test_private_key(0).to_public_key(),
            test_private_key(1).to_public_key()
        );
    }

    #[test]
    fn test_key_pair_uses_given_kid_and_expiry() {
        let not_after = Utc::now() + Duration::hours(1);
        let pair = test_key_pair("fixture", 2, not_after);
        assert_eq!(pair.kid(), "fixture");
        assert_eq!(pair.not_after(), not_after);
        assert_eq!(pair.public_key(), &test_private_key(2).to_public_key());
    }

    #[test]
    fn test_master_key_is_deterministic() {
        assert_eq!(test_master_key().len(), 32);
        assert_eq!(test_master_key(), test_master_key());
    }
}
