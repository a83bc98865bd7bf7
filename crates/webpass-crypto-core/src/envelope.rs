//! Envelope encryption of the application key.
//!
//! ```text
//! master password ──PBKDF2──► derived key ──wraps──► application key ──encrypts──► site secrets
//! ```
//!
//! Only the wrapped form of the application key is ever persisted. Changing
//! the master password means re-wrapping one key, never re-encrypting the
//! site secrets.

use crate::error::CryptoError;
use crate::memory::SecretKey;
use crate::symmetric::{self, Ciphertext};

/// AAD tag binding a ciphertext to the application-key envelope.
const ENVELOPE_AAD: &[u8] = b"webpass-envelope-app-key";

/// Wrap (authenticated-encrypt) the application key under a derived key.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AES-256-GCM operation fails.
pub fn wrap(app_key: &SecretKey, derived_key: &SecretKey) -> Result<Ciphertext, CryptoError> {
    symmetric::seal(app_key.expose(), derived_key.expose(), ENVELOPE_AAD)
}

/// Recover the application key from its envelope.
///
/// # Errors
///
/// Returns `CryptoError::KeyUnwrap` when the derived key is wrong, the
/// envelope was modified or is malformed, or the plaintext is not a
/// 256-bit key.
pub fn unwrap(wrapped: &Ciphertext, derived_key: &SecretKey) -> Result<SecretKey, CryptoError> {
    let plaintext = symmetric::open(wrapped, derived_key.expose(), ENVELOPE_AAD)
        .map_err(|_| CryptoError::KeyUnwrap)?;
    SecretKey::from_slice(&plaintext).map_err(|_| CryptoError::KeyUnwrap)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
