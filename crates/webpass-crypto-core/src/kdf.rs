//! PBKDF2-HMAC-SHA256 master-password key derivation.
//!
//! This module provides:
//! - [`derive`] — derive a 256-bit key from a password + salt
//! - [`generate_salt`] — fresh per-installation salt
//! - [`fingerprint`] — short BLAKE3 digest of a derived key
//! - [`KdfParams`] — serializable parameter set (stored in the vault record)
//!
//! The salt is generated once at vault initialisation and persisted next to
//! the iteration count, so two installations never share a derivation.

use crate::error::CryptoError;
use crate::memory::{SecretKey, KEY_LEN};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Salt length in bytes. Shorter salts are rejected.
pub const SALT_LEN: usize = 16;

/// Iteration count for new vaults.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Floor below which derivation is refused.
pub const MIN_ITERATIONS: u32 = 1_000;

/// Number of BLAKE3 output bytes rendered by [`fingerprint`].
const FINGERPRINT_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// PBKDF2 parameter set, stored in the vault record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Parameter set with an explicit iteration count.
    #[must_use]
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Derive a 256-bit key from a password and salt.
///
/// Deterministic: the same password, salt and parameters always produce the
/// same key. Any password length is accepted, including empty; the vault
/// layer decides what it allows.
///
/// # Errors
///
/// Returns `CryptoError::KeyDerivation` if the salt is shorter than
/// [`SALT_LEN`] or the iteration count is below [`MIN_ITERATIONS`].
pub fn derive(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<SecretKey, CryptoError> {
    if salt.len() < SALT_LEN {
        return Err(CryptoError::KeyDerivation(format!(
            "salt too short: {} bytes (minimum {SALT_LEN})",
            salt.len()
        )));
    }
    if params.iterations < MIN_ITERATIONS {
        return Err(CryptoError::KeyDerivation(format!(
            "iteration count too low: {} (minimum {MIN_ITERATIONS})",
            params.iterations
        )));
    }

    let mut output = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, params.iterations, &mut output);

    let key = SecretKey::new(output);
    output.zeroize();
    Ok(key)
}

/// Generate a random salt for a new vault.
#[must_use]
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Short lowercase-hex BLAKE3 fingerprint of a derived key.
///
/// Integrity/debug aid only. Never use it to decide whether a password is
/// correct.
#[must_use]
pub fn fingerprint(key: &SecretKey) -> String {
    let hash = blake3::hash(key.expose());
    data_encoding::HEXLOWER.encode(&hash.as_bytes()[..FINGERPRINT_LEN])
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
