//! Zeroizing containers for key material and decrypted secrets.
//!
//! - [`SecretKey`] — fixed 256-bit key (derived key, application key,
//!   session signing secret), erased on drop
//! - [`SecretText`] — a decrypted site secret, erased on drop
//!
//! Both mask their `Debug`/`Display` output so key bytes never reach logs.

use crate::error::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of every symmetric key handled by WebPass (256 bits).
pub const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// SecretKey
// ---------------------------------------------------------------------------

/// A 256-bit symmetric key, zeroized when dropped.
///
/// Intentionally not `Clone`: each holder owns exactly one copy and the
/// copy disappears with the operation that needed it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_LEN],
}

impl SecretKey {
    /// Take ownership of raw key bytes.
    ///
    /// `[u8; N]` is `Copy`, so the caller should zeroize its own array
    /// after handing it over.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generate a key from the operating system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::InvalidKeyMaterial(format!("CSPRNG fill failed: {e}")))?;
        let key = Self::new(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Copy key bytes out of a slice that must be exactly [`KEY_LEN`] long.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` on a length mismatch.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let mut array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKeyMaterial(format!(
                "invalid key length: {} bytes (expected {KEY_LEN})",
                bytes.len()
            ))
        })?;
        let key = Self::new(array);
        array.zeroize();
        Ok(key)
    }

    /// Expose the raw bytes for a cryptographic operation.
    #[must_use]
    pub const fn expose(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretText
// ---------------------------------------------------------------------------

/// A decrypted site secret.
pub struct SecretText {
    inner: SecretString,
}

impl SecretText {
    /// Wrap an owned plaintext string.
    #[must_use]
    pub fn new(text: String) -> Self {
        Self {
            inner: SecretString::from(text),
        }
    }

    /// Expose the plaintext. Keep the borrow short.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl fmt::Debug for SecretText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretText(***)")
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_keys_differ() {
        let a = SecretKey::random().expect("random should succeed");
        let b = SecretKey::random().expect("random should succeed");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn from_slice_accepts_exact_length() {
        let key = SecretKey::from_slice(&[0x11; KEY_LEN]).expect("32 bytes should be accepted");
        assert_eq!(key.expose(), &[0x11; KEY_LEN]);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        let err = SecretKey::from_slice(&[0u8; 31]).expect_err("31 bytes should be rejected");
        assert!(matches!(err, CryptoError::InvalidKeyMaterial(_)));
        assert!(SecretKey::from_slice(&[0u8; 33]).is_err());
    }

    #[test]
    fn key_debug_and_display_are_masked() {
        let key = SecretKey::new([0xFF; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SecretKey(***)");
        assert_eq!(format!("{key}"), "SecretKey(***)");
    }

    #[test]
    fn secret_text_exposes_plaintext_but_masks_debug() {
        let text = SecretText::new("hunter2".to_string());
        assert_eq!(text.expose(), "hunter2");
        let debug = format!("{text:?}");
        assert_eq!(debug, "SecretText(***)");
        assert!(!debug.contains("hunter2"));
    }
}
