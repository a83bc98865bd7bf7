//! AES-256-GCM authenticated encryption shared by the envelope and the
//! secret codec.
//!
//! - [`seal`] — encrypt with a random nonce, returning a [`Ciphertext`]
//! - [`open`] — authenticate and decrypt a [`Ciphertext`]
//!
//! Callers supply a domain-separation AAD so a ciphertext produced for one
//! purpose can never be opened as another.

use crate::error::CryptoError;
use crate::memory::KEY_LEN;
use data_encoding::BASE64URL_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Minimum valid decoded length: nonce + empty ciphertext + tag.
const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Authenticated ciphertext as stored in the vault file.
///
/// Wire format: unpadded URL-safe base64 of
/// `nonce (12 bytes) || ciphertext (variable) || tag (16 bytes)`.
/// Serialized in JSON as a bare string.
#[must_use = "encrypted data must be stored"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ciphertext(String);

impl Ciphertext {
    /// Wrap an already-encoded ciphertext string. Validation is deferred to
    /// [`open`], where a malformed value fails like a tampered one.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The encoded form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_sealed(sealed: &[u8]) -> Self {
        Self(BASE64URL_NOPAD.encode(sealed))
    }

    fn decode(&self) -> Result<Vec<u8>, AeadFailure> {
        let bytes = BASE64URL_NOPAD
            .decode(self.0.as_bytes())
            .map_err(|_| AeadFailure)?;
        if bytes.len() < MIN_SEALED_LEN {
            return Err(AeadFailure);
        }
        Ok(bytes)
    }
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque authentication failure. The envelope and secret codec translate
/// it into their own error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AeadFailure;

// ---------------------------------------------------------------------------
// Core encryption
// ---------------------------------------------------------------------------

fn aead_key(key: &[u8; KEY_LEN]) -> Result<aead::LessSafeKey, CryptoError> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `key` with a fresh random 96-bit nonce.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` if the AES-256-GCM operation fails.
pub fn seal(plaintext: &[u8], key: &[u8; KEY_LEN], aad: &[u8]) -> Result<Ciphertext, CryptoError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = Zeroizing::new(plaintext.to_vec());
    sealing_key
        .seal_in_place_append_tag(nonce, aead::Aad::from(aad), &mut *in_out)
        .map_err(|_| CryptoError::Encryption("AES-256-GCM encryption failed".into()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN.saturating_add(in_out.len()));
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&in_out);
    Ok(Ciphertext::from_sealed(&sealed))
}

/// Authenticate and decrypt a [`Ciphertext`].
///
/// The plaintext is returned in a buffer that zeroizes on drop.
///
/// # Errors
///
/// Returns [`AeadFailure`] when the encoding is malformed, the ciphertext is
/// too short, the key or AAD is wrong, or any byte was modified.
pub fn open(
    ciphertext: &Ciphertext,
    key: &[u8; KEY_LEN],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, AeadFailure> {
    let opening_key = aead_key(key).map_err(|_| AeadFailure)?;
    let mut sealed = ciphertext.decode()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut body = sealed.split_off(NONCE_LEN);
    let result = opening_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut body)
        .map(|plaintext| Zeroizing::new(plaintext.to_vec()));
    body.zeroize();
    result.map_err(|_| AeadFailure)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: [u8; KEY_LEN] = [0xAA; KEY_LEN];
    const WRONG_KEY: [u8; KEY_LEN] = [0xBB; KEY_LEN];
    const AAD: &[u8] = b"webpass-test";

    fn flip_byte(ct: &Ciphertext, index: usize) -> Ciphertext {
        let mut raw = BASE64URL_NOPAD.decode(ct.as_str().as_bytes()).unwrap();
        raw[index] ^= 0x01;
        Ciphertext::new(BASE64URL_NOPAD.encode(&raw))
    }

    #[test]
    fn seal_open_roundtrip() {
        let ct = seal(b"secret vault data", &TEST_KEY, AAD).expect("seal should succeed");
        let pt = open(&ct, &TEST_KEY, AAD).expect("open should succeed");
        assert_eq!(pt.as_slice(), b"secret vault data");
    }

    #[test]
    fn encoded_length_covers_nonce_and_tag() {
        let ct = seal(b"abc", &TEST_KEY, AAD).expect("seal should succeed");
        let raw = BASE64URL_NOPAD.decode(ct.as_str().as_bytes()).unwrap();
        assert_eq!(raw.len(), NONCE_LEN + 3 + TAG_LEN);
    }

    #[test]
    fn two_seals_differ() {
        let a = seal(b"same", &TEST_KEY, AAD).expect("seal should succeed");
        let b = seal(b"same", &TEST_KEY, AAD).expect("seal should succeed");
        assert_ne!(a, b, "random nonces must make ciphertexts differ");
    }

    #[test]
    fn wrong_key_fails() {
        let ct = seal(b"data", &TEST_KEY, AAD).expect("seal should succeed");
        assert_eq!(open(&ct, &WRONG_KEY, AAD).unwrap_err(), AeadFailure);
    }

    #[test]
    fn wrong_aad_fails() {
        let ct = seal(b"data", &TEST_KEY, AAD).expect("seal should succeed");
        assert!(open(&ct, &TEST_KEY, b"other-purpose").is_err());
    }

    #[test]
    fn tampered_nonce_body_and_tag_fail() {
        let ct = seal(b"data", &TEST_KEY, AAD).expect("seal should succeed");
        let last = NONCE_LEN + 4 + TAG_LEN - 1;
        for index in [0, NONCE_LEN, last] {
            assert!(open(&flip_byte(&ct, index), &TEST_KEY, AAD).is_err());
        }
    }

    #[test]
    fn malformed_encodings_fail() {
        assert!(open(&Ciphertext::new("not base64 !!"), &TEST_KEY, AAD).is_err());
        assert!(open(&Ciphertext::new(""), &TEST_KEY, AAD).is_err());
        let short = Ciphertext::new(BASE64URL_NOPAD.encode(&[0u8; MIN_SEALED_LEN - 1]));
        assert!(open(&short, &TEST_KEY, AAD).is_err());
    }

    #[test]
    fn ciphertext_serializes_as_bare_string() {
        let ct = seal(b"x", &TEST_KEY, AAD).expect("seal should succeed");
        let json = serde_json::to_string(&ct).unwrap();
        assert_eq!(json, format!("\"{}\"", ct.as_str()));
        let back: Ciphertext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ct);
    }
}
