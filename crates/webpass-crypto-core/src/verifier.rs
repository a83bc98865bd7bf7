//! Master password verifier.
//!
//! The vault stores an Argon2id PHC string (`$argon2id$v=19$...`) with its
//! own random salt. [`validate`] gates every interactive unlock before any
//! key derivation happens.

use crate::error::CryptoError;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;

/// Random salt length for the verifier hash.
const VERIFIER_SALT_LEN: usize = 16;

/// Produce a one-way verifier for `password`.
///
/// # Errors
///
/// Returns `CryptoError::PasswordHash` if Argon2id hashing fails.
pub fn hash_password(password: &[u8]) -> Result<String, CryptoError> {
    let mut salt_bytes = [0u8; VERIFIER_SALT_LEN];
    OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CryptoError::PasswordHash(format!("salt encoding failed: {e}")))?;

    Argon2::default()
        .hash_password(password, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored verifier.
///
/// The digest comparison inside `argon2` is constant-time. A verifier that
/// cannot be parsed never validates.
#[must_use]
pub fn validate(password: &[u8], verifier: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(verifier) else {
        return false;
    };
    Argon2::default().verify_password(password, &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_validates() {
        let verifier = hash_password(b"correct-horse").unwrap();
        assert!(verifier.starts_with("$argon2id$"));
        assert!(validate(b"correct-horse", &verifier));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let verifier = hash_password(b"correct-horse").unwrap();
        assert!(!validate(b"correct-horse ", &verifier));
        assert!(!validate(b"", &verifier));
    }

    #[test]
    fn verifier_does_not_contain_password() {
        let verifier = hash_password(b"correct-horse").unwrap();
        assert!(!verifier.contains("correct-horse"));
    }

    #[test]
    fn verifiers_are_salted() {
        let a = hash_password(b"same").unwrap();
        let b = hash_password(b"same").unwrap();
        assert_ne!(a, b);
        assert!(validate(b"same", &a) && validate(b"same", &b));
    }

    #[test]
    fn garbage_verifier_never_validates() {
        assert!(!validate(b"anything", "not-a-phc-string"));
        assert!(!validate(b"anything", ""));
    }
}
