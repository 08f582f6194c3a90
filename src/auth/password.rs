//! Salted password hashing.
//!
//! Stored form is `<hex derived key>.<hex salt>`. The key is derived with
//! Argon2id (memory-hard) and compared in constant time.

use argon2::{Algorithm, Argon2, Params, Version};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 64;

const MEMORY_KIB: u32 = 19_456;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Hashing task failed: {0}")]
    Task(String),
}

// Verified against when the username is unknown, so both failure paths cost the same.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    hash_with_salt("dummy-password-for-timing", &[0x5a; SALT_LEN]).unwrap_or_default()
});

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, Some(KEY_LEN))
        .map_err(|e| PasswordError::Derivation(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

fn derive(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], PasswordError> {
    let mut key = [0u8; KEY_LEN];
    hasher()?
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| PasswordError::Derivation(e.to_string()))?;
    Ok(key)
}

/// Hash with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    hash_with_salt(password, &salt)
}

pub fn hash_with_salt(password: &str, salt: &[u8]) -> Result<String, PasswordError> {
    let key = derive(password, salt)?;
    Ok(format!("{}.{}", hex::encode(key), hex::encode(salt)))
}

/// Check `password` against a stored `hash.salt` value. Malformed stored
/// values never verify.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((hash_hex, salt_hex)) = stored.split_once('.') else {
        return false;
    };
    let (Ok(expected), Ok(salt)) = (hex::decode(hash_hex), hex::decode(salt_hex)) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }

    match derive(password, &salt) {
        Ok(derived) => bool::from(derived.as_slice().ct_eq(expected.as_slice())),
        Err(e) => {
            tracing::warn!("Password verification could not derive key: {}", e);
            false
        }
    }
}

/// Well-formed stored value that no known password derives to
pub fn generate_unusable_hash() -> String {
    let mut key = [0u8; KEY_LEN];
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut key);
    OsRng.fill_bytes(&mut salt);
    format!("{}.{}", hex::encode(key), hex::encode(salt))
}

/// Burn the same work as a real verification and fail
pub fn verify_dummy(password: &str) -> bool {
    let _ = verify_password(&DUMMY_HASH, password);
    false
}

/// `hash_password` off the async runtime
pub async fn hash_in_background(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}

/// `verify_password` off the async runtime; `None` stored hash means the
/// user does not exist and the dummy hash is checked instead.
pub async fn verify_in_background(stored: Option<String>, password: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || match stored {
        Some(stored) => verify_password(&stored, &password),
        None => verify_dummy(&password),
    })
    .await
    .map_err(|e| PasswordError::Task(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_is_symmetric() {
        let salt = [7u8; SALT_LEN];
        for password in ["Secret123", "", "pässwörd with spaces", "a.b.c"] {
            let stored = hash_with_salt(password, &salt).unwrap();
            assert!(verify_password(&stored, password), "{password:?} should verify");
            assert!(!verify_password(&stored, &format!("{password}x")));
        }
    }

    #[test]
    fn stored_format_is_hash_dot_salt() {
        let salt = [1u8; SALT_LEN];
        let stored = hash_with_salt("Secret123", &salt).unwrap();
        let (hash, salt_hex) = stored.split_once('.').unwrap();
        assert_eq!(hash.len(), KEY_LEN * 2);
        assert_eq!(salt_hex, hex::encode(salt));
    }

    #[test]
    fn random_salts_differ() {
        let a = hash_password("Secret123").unwrap();
        let b = hash_password("Secret123").unwrap();
        assert_ne!(a, b);
        assert!(verify_password(&a, "Secret123"));
        assert!(verify_password(&b, "Secret123"));
    }

    #[test]
    fn malformed_stored_values_fail() {
        assert!(!verify_password("", "x"));
        assert!(!verify_password("nodot", "x"));
        assert!(!verify_password("zz.zz", "x"));
        assert!(!verify_password("abcd.0101", "x"));
    }

    #[test]
    fn unusable_hash_is_well_formed_but_never_matches() {
        let stored = generate_unusable_hash();
        let (hash, salt) = stored.split_once('.').unwrap();
        assert_eq!(hash.len(), KEY_LEN * 2);
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert!(!verify_password(&stored, ""));
    }

    #[test]
    fn dummy_never_verifies() {
        assert!(!verify_dummy("dummy-password-for-timing"));
    }

    #[tokio::test]
    async fn background_helpers_round_trip() {
        let stored = hash_in_background("Secret123".to_string()).await.unwrap();
        assert!(verify_in_background(Some(stored.clone()), "Secret123".to_string()).await.unwrap());
        assert!(!verify_in_background(Some(stored), "secret123".to_string()).await.unwrap());
        assert!(!verify_in_background(None, "Secret123".to_string()).await.unwrap());
    }
}
