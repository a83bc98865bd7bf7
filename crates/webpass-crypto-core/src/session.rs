//! Signed, time-stamped session tokens.
//!
//! A token is a capability: it carries the raw application key and lets
//! later invocations skip the password prompt until it expires.
//!
//! Wire format (each segment unpadded URL-safe base64):
//!
//! ```text
//! payload . issued_at . signature
//! payload    = application key (32 bytes)
//! issued_at  = UNIX seconds, big-endian u64
//! signature  = HMAC-SHA256(secret, "webpass-session-token" || 0x00 || payload "." issued_at)
//! ```
//!
//! The signing secret is passed in by the caller; nothing here reads global
//! configuration.

use crate::error::CryptoError;
use crate::memory::SecretKey;
use data_encoding::BASE64URL_NOPAD;
use ring::hmac;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

/// Domain separation prefix mixed into every signature.
const SIGNATURE_DOMAIN: &[u8] = b"webpass-session-token";

/// Segment separator.
const SEPARATOR: char = '.';

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An encoded session token, as written to the token file.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap token text read from storage. Surrounding whitespace (a trailing
    /// newline from an editor, for instance) is ignored.
    #[must_use]
    pub fn new(encoded: &str) -> Self {
        Self(encoded.trim().to_owned())
    }

    /// The encoded token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The payload segment is the application key, so keep tokens out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

/// Issues and verifies session tokens with one signing secret.
pub struct SessionSigner {
    key: hmac::Key,
}

impl fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSigner(***)")
    }
}

// ---------------------------------------------------------------------------
// Issue / verify
// ---------------------------------------------------------------------------

impl SessionSigner {
    /// Build a signer from a 256-bit signing secret.
    #[must_use]
    pub fn new(secret: &SecretKey) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.expose()),
        }
    }

    /// Issue a token for `app_key`, stamped with the current time.
    #[must_use]
    pub fn issue(&self, app_key: &SecretKey) -> Token {
        self.issue_at(app_key, unix_now())
    }

    /// Issue a token stamped with an explicit `issued_at` (UNIX seconds).
    #[must_use]
    pub fn issue_at(&self, app_key: &SecretKey, issued_at: u64) -> Token {
        let payload = BASE64URL_NOPAD.encode(app_key.expose());
        let stamp = BASE64URL_NOPAD.encode(&issued_at.to_be_bytes());
        let tag = hmac::sign(&self.key, &signing_input(&payload, &stamp));
        let signature = BASE64URL_NOPAD.encode(tag.as_ref());
        Token(format!("{payload}{SEPARATOR}{stamp}{SEPARATOR}{signature}"))
    }

    /// Verify a token against the current time.
    ///
    /// Returns the embedded application key, or `None` if the token is
    /// malformed, forged, or older than `max_age`.
    #[must_use]
    pub fn verify(&self, token: &Token, max_age: Duration) -> Option<SecretKey> {
        self.verify_at(token, max_age, unix_now())
    }

    /// [`verify`](Self::verify) with an explicit clock reading.
    #[must_use]
    pub fn verify_at(&self, token: &Token, max_age: Duration, now: u64) -> Option<SecretKey> {
        self.check_at(token, max_age, now).ok()
    }

    /// Full verification with a typed failure.
    ///
    /// A token aged exactly `max_age` is still valid.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::TokenInvalid`] on a malformed token, bad signature,
    ///   or an `issued_at` later than `now`
    /// - [`CryptoError::TokenExpired`] when `now - issued_at > max_age`
    pub fn check_at(
        &self,
        token: &Token,
        max_age: Duration,
        now: u64,
    ) -> Result<SecretKey, CryptoError> {
        let mut segments = token.as_str().split(SEPARATOR);
        let (Some(payload), Some(stamp), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(CryptoError::TokenInvalid);
        };

        let signature = BASE64URL_NOPAD
            .decode(signature.as_bytes())
            .map_err(|_| CryptoError::TokenInvalid)?;
        hmac::verify(&self.key, &signing_input(payload, stamp), &signature)
            .map_err(|_| CryptoError::TokenInvalid)?;

        let issued_at = decode_stamp(stamp)?;
        let age = now.checked_sub(issued_at).ok_or(CryptoError::TokenInvalid)?;
        if age > max_age.as_secs() {
            return Err(CryptoError::TokenExpired);
        }

        let mut key_bytes = BASE64URL_NOPAD
            .decode(payload.as_bytes())
            .map_err(|_| CryptoError::TokenInvalid)?;
        let key = SecretKey::from_slice(&key_bytes).map_err(|_| CryptoError::TokenInvalid);
        key_bytes.zeroize();
        key
    }
}

fn signing_input(payload: &str, stamp: &str) -> Vec<u8> {
    let mut input = Vec::with_capacity(
        SIGNATURE_DOMAIN
            .len()
            .saturating_add(payload.len())
            .saturating_add(stamp.len())
            .saturating_add(2),
    );
    input.extend_from_slice(SIGNATURE_DOMAIN);
    input.push(0);
    input.extend_from_slice(payload.as_bytes());
    input.push(b'.');
    input.extend_from_slice(stamp.as_bytes());
    input
}

fn decode_stamp(stamp: &str) -> Result<u64, CryptoError> {
    let bytes = BASE64URL_NOPAD
        .decode(stamp.as_bytes())
        .map_err(|_| CryptoError::TokenInvalid)?;
    let array: [u8; 8] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::TokenInvalid)?;
    Ok(u64::from_be_bytes(array))
}

/// Current UNIX time in seconds (0 if the clock is before the epoch).
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::KEY_LEN;

    const MAX_AGE: Duration = Duration::from_secs(10_800);
    const T0: u64 = 1_700_000_000;

    fn signer() -> SessionSigner {
        SessionSigner::new(&SecretKey::new([0x5A; KEY_LEN]))
    }

    fn app_key() -> SecretKey {
        SecretKey::new([0xC3; KEY_LEN])
    }

    #[test]
    fn fresh_token_verifies_to_the_same_key() {
        let token = signer().issue(&app_key());
        let key = signer().verify(&token, MAX_AGE).expect("fresh token must verify");
        assert_eq!(key.expose(), app_key().expose());
    }

    #[test]
    fn token_has_three_segments() {
        let token = signer().issue_at(&app_key(), T0);
        assert_eq!(token.as_str().split('.').count(), 3);
    }

    #[test]
    fn expiry_boundaries() {
        let s = signer();
        let token = s.issue_at(&app_key(), T0);
        let max = MAX_AGE.as_secs();
        assert!(s.verify_at(&token, MAX_AGE, T0 + max - 1).is_some());
        assert!(s.verify_at(&token, MAX_AGE, T0 + max).is_some());
        assert!(s.verify_at(&token, MAX_AGE, T0 + max + 1).is_none());
        assert!(matches!(
            s.check_at(&token, MAX_AGE, T0 + max + 1),
            Err(CryptoError::TokenExpired)
        ));
    }

    #[test]
    fn future_dated_token_is_invalid() {
        let s = signer();
        let token = s.issue_at(&app_key(), T0 + 60);
        assert!(matches!(
            s.check_at(&token, MAX_AGE, T0),
            Err(CryptoError::TokenInvalid)
        ));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let s = signer();
        let token = s.issue_at(&app_key(), T0);
        let (head, signature) = token.as_str().rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let forged = Token::new(&format!("{head}.{}", chars.into_iter().collect::<String>()));
        assert!(s.verify_at(&forged, MAX_AGE, T0).is_none());
    }

    #[test]
    fn tampered_timestamp_is_rejected() {
        let s = signer();
        let token = s.issue_at(&app_key(), T0);
        let parts: Vec<&str> = token.as_str().split('.').collect();
        let later = BASE64URL_NOPAD.encode(&(T0 + 1_000_000).to_be_bytes());
        let forged = Token::new(&format!("{}.{later}.{}", parts[0], parts[2]));
        assert!(matches!(
            s.check_at(&forged, MAX_AGE, T0 + 1_000_000),
            Err(CryptoError::TokenInvalid)
        ));
    }

    #[test]
    fn other_secret_cannot_verify() {
        let token = signer().issue_at(&app_key(), T0);
        let other = SessionSigner::new(&SecretKey::new([0x5B; KEY_LEN]));
        assert!(other.verify_at(&token, MAX_AGE, T0).is_none());
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let s = signer();
        for text in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert!(matches!(
                s.check_at(&Token::new(text), MAX_AGE, T0),
                Err(CryptoError::TokenInvalid)
            ));
        }
    }

    #[test]
    fn token_text_is_trimmed() {
        let s = signer();
        let token = s.issue_at(&app_key(), T0);
        let reread = Token::new(&format!("{}\n", token.as_str()));
        assert_eq!(reread, token);
    }

    #[test]
    fn debug_output_hides_token() {
        let token = signer().issue_at(&app_key(), T0);
        assert_eq!(format!("{token:?}"), "Token(***)");
        assert_eq!(format!("{:?}", signer()), "SessionSigner(***)");
    }
}
