//! Session-token and signing-secret files.
//!
//! - `{data_dir}/.session_token` — the current token, overwritten on every
//!   issuance
//! - `{data_dir}/session.key` — per-installation signing secret (hex),
//!   generated at `init`
//!
//! Both are written owner-only. Callers hold [`crate::lock::VaultLock`]
//! while writing.

use std::fs;
use std::path::{Path, PathBuf};

use webpass_crypto_core::{SecretKey, SessionSigner, Token};
use zeroize::Zeroizing;

use crate::config::Config;
use crate::error::VaultError;
use crate::store::write_private;

const TOKEN_FILE: &str = ".session_token";
const SIGNING_KEY_FILE: &str = "session.key";

/// Path of the token file.
#[must_use]
pub fn token_path(data_dir: &Path) -> PathBuf {
    data_dir.join(TOKEN_FILE)
}

/// Read the stored token. Any failure (missing, unreadable, empty) is
/// "no session" and yields `None`.
#[must_use]
pub fn read_token(data_dir: &Path) -> Option<Token> {
    let text = fs::read_to_string(token_path(data_dir)).ok()?;
    let token = Token::new(&text);
    (!token.as_str().is_empty()).then_some(token)
}

/// Replace the stored token.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the file cannot be written.
pub fn write_token(data_dir: &Path, token: &Token) -> Result<(), VaultError> {
    write_private(&token_path(data_dir), token.as_str().as_bytes())
}

/// Signer for verification only: never creates the key file.
///
/// `Ok(None)` when no secret is configured and `session.key` is missing or
/// unreadable; no token can be valid in that case.
///
/// # Errors
///
/// Returns [`VaultError::Config`] for a malformed configured secret.
pub fn existing_signer(config: &Config) -> Result<Option<SessionSigner>, VaultError> {
    if let Some(secret) = config.signing_secret_override()? {
        return Ok(Some(SessionSigner::new(&secret)));
    }
    Ok(read_signing_key(&config.data_dir).map(|secret| SessionSigner::new(&secret)))
}

/// Signer for issuing tokens, creating `session.key` if needed.
///
/// # Errors
///
/// Returns [`VaultError::Config`] for a malformed configured secret, or
/// [`VaultError::Io`] if a new key file cannot be written.
pub fn issuing_signer(config: &Config) -> Result<SessionSigner, VaultError> {
    if let Some(secret) = config.signing_secret_override()? {
        return Ok(SessionSigner::new(&secret));
    }
    let secret = match read_signing_key(&config.data_dir) {
        Some(secret) => secret,
        None => {
            tracing::warn!("session signing key missing or unreadable, generating a new one");
            rotate_signing_key(&config.data_dir)?
        }
    };
    Ok(SessionSigner::new(&secret))
}

/// Generate and store a fresh signing key. Outstanding tokens stop
/// verifying.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the key file cannot be written.
pub fn rotate_signing_key(data_dir: &Path) -> Result<SecretKey, VaultError> {
    let secret = SecretKey::random()?;
    let hex = Zeroizing::new(data_encoding::HEXLOWER.encode(secret.expose()));
    write_private(&data_dir.join(SIGNING_KEY_FILE), hex.as_bytes())?;
    Ok(secret)
}

fn read_signing_key(data_dir: &Path) -> Option<SecretKey> {
    let text = Zeroizing::new(fs::read_to_string(data_dir.join(SIGNING_KEY_FILE)).ok()?);
    let bytes = Zeroizing::new(
        data_encoding::HEXLOWER_PERMISSIVE
            .decode(text.trim().as_bytes())
            .ok()?,
    );
    SecretKey::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn missing_token_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_token(dir.path()).is_none());
    }

    #[test]
    fn empty_token_file_is_none() {
        let dir = TempDir::new().unwrap();
        fs::write(token_path(dir.path()), "\n").unwrap();
        assert!(read_token(dir.path()).is_none());
    }

    #[test]
    fn token_is_overwritten_not_appended() {
        let dir = TempDir::new().unwrap();
        write_token(dir.path(), &Token::new("first")).unwrap();
        write_token(dir.path(), &Token::new("second")).unwrap();
        assert_eq!(fs::read_to_string(token_path(dir.path())).unwrap(), "second");
    }

    #[test]
    fn existing_signer_does_not_create_key() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path());
        assert!(existing_signer(&config).unwrap().is_none());
        assert!(!dir.path().join(SIGNING_KEY_FILE).exists());
    }

    #[test]
    fn issuing_signer_creates_a_stable_key() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path());
        let app_key = SecretKey::random().unwrap();

        let token = issuing_signer(&config).unwrap().issue(&app_key);
        assert!(dir.path().join(SIGNING_KEY_FILE).exists());

        let verifier = existing_signer(&config).unwrap().expect("key now exists");
        let key = verifier.verify(&token, Duration::from_secs(60)).unwrap();
        assert_eq!(key.expose(), app_key.expose());
    }

    #[test]
    fn rotating_the_key_invalidates_tokens() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path());
        let token = issuing_signer(&config)
            .unwrap()
            .issue(&SecretKey::random().unwrap());
        rotate_signing_key(dir.path()).unwrap();
        let signer = existing_signer(&config).unwrap().unwrap();
        assert!(signer.verify(&token, Duration::from_secs(60)).is_none());
    }

    #[test]
    fn configured_secret_takes_precedence() {
        let dir = TempDir::new().unwrap();
        rotate_signing_key(dir.path()).unwrap();
        let mut config = Config::new(dir.path());
        config.session_signature_secret = Some("11".repeat(32));

        let app_key = SecretKey::random().unwrap();
        let token = issuing_signer(&config).unwrap().issue(&app_key);
        let explicit = SessionSigner::new(&SecretKey::new([0x11; 32]));
        assert!(explicit.verify(&token, Duration::from_secs(60)).is_some());
    }
}
