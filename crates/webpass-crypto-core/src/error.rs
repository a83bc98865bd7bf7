//! Cryptographic error types for `webpass-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed (PBKDF2 parameter validation, short salt).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Symmetric encryption failure (AES-256-GCM setup or sealing).
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The wrapped application key could not be recovered: wrong derived
    /// key, tampered envelope, or malformed ciphertext.
    #[error("application key unwrap failed")]
    KeyUnwrap,

    /// A stored site secret could not be decrypted: tampered ciphertext or
    /// wrong application key.
    #[error("secret decryption failed")]
    SecretDecrypt,

    /// Session token signature is valid but the token is older than the
    /// allowed age.
    #[error("session token expired")]
    TokenExpired,

    /// Session token is malformed, carries a bad signature, or is dated in
    /// the future.
    #[error("session token invalid")]
    TokenInvalid,

    /// Invalid key material (wrong length, corrupted bytes).
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Password verifier could not be produced.
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}
