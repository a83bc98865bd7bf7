//! Per-site secret codec, keyed by the application key.
//!
//! "No secret stored" and "secret present but undecryptable" are distinct
//! outcomes: the first is `None` at the store level, the second is always
//! `CryptoError::SecretDecrypt`. A failed decrypt never becomes an empty
//! string.

use crate::error::CryptoError;
use crate::memory::{SecretKey, SecretText};
use crate::symmetric::{self, Ciphertext};

/// AAD tag binding a ciphertext to the site-secret purpose.
const SECRET_AAD: &[u8] = b"webpass-site-secret";

/// Encrypt a site secret. Absent or empty input yields `Ok(None)`.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AES-256-GCM operation fails.
pub fn encrypt_secret(
    plaintext: Option<&str>,
    app_key: &SecretKey,
) -> Result<Option<Ciphertext>, CryptoError> {
    match plaintext {
        None | Some("") => Ok(None),
        Some(text) => symmetric::seal(text.as_bytes(), app_key.expose(), SECRET_AAD).map(Some),
    }
}

/// Decrypt a stored site secret.
///
/// # Errors
///
/// Returns `CryptoError::SecretDecrypt` on a wrong key, tampering, a
/// malformed ciphertext, or plaintext that is not UTF-8.
pub fn decrypt_secret(ciphertext: &Ciphertext, app_key: &SecretKey) -> Result<SecretText, CryptoError> {
    let plaintext = symmetric::open(ciphertext, app_key.expose(), SECRET_AAD)
        .map_err(|_| CryptoError::SecretDecrypt)?;
    let text = std::str::from_utf8(&plaintext).map_err(|_| CryptoError::SecretDecrypt)?;
    Ok(SecretText::new(text.to_owned()))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
