//! Vault error types for `webpass-vault`.

use thiserror::Error;
use webpass_crypto_core::CryptoError;

/// Errors produced by vault operations.
///
/// Token failures are the only non-fatal kinds: callers fall back to the
/// password prompt when [`VaultError::is_session_error`] is true. Every
/// cryptographic failure is fatal and never degrades to a default value.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The master password does not match the stored verifier.
    #[error("authentication failed: wrong master password")]
    AuthenticationFailed,

    /// The application key envelope could not be opened.
    #[error("application key could not be unwrapped (wrong key or tampered vault)")]
    KeyUnwrap,

    /// A stored site secret could not be decrypted.
    #[error("stored secret could not be decrypted (wrong key or tampered vault)")]
    SecretDecrypt,

    /// The session token is older than the configured window.
    #[error("session expired")]
    TokenExpired,

    /// No usable session token (missing, corrupt, forged).
    #[error("no valid session")]
    TokenInvalid,

    /// The vault file does not exist yet.
    #[error("vault not initialized at {0} - run `webpass init` first")]
    VaultMissing(String),

    /// The vault file exists but is structurally invalid.
    #[error("vault file is corrupt: {0}")]
    VaultCorrupt(String),

    /// No site entry owns the given alias.
    #[error("alias not found: {0}")]
    AliasNotFound(String),

    /// The alias already belongs to another site.
    #[error("alias `{alias}` already belongs to {owner_url}")]
    AliasConflict {
        /// The contested alias.
        alias: String,
        /// URL of the entry that owns it.
        owner_url: String,
    },

    /// No site entry exists for the given URL.
    #[error("no site with URL {0}")]
    SiteNotFound(String),

    /// The alias no longer belongs to the site the caller confirmed.
    #[error("alias '{0}' now belongs to a different site - nothing deleted")]
    SiteChanged(String),

    /// `init` was called on an existing vault.
    #[error("vault already initialized at {0}")]
    AlreadyInitialized(String),

    /// Caller-supplied data was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file or environment override is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other cryptographic failure (delegated from crypto-core).
    #[error(transparent)]
    Crypto(CryptoError),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// `true` for failures that should trigger interactive re-authentication.
    #[must_use]
    pub const fn is_session_error(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::TokenInvalid)
    }
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyUnwrap => Self::KeyUnwrap,
            CryptoError::SecretDecrypt => Self::SecretDecrypt,
            CryptoError::TokenExpired => Self::TokenExpired,
            CryptoError::TokenInvalid => Self::TokenInvalid,
            other => Self::Crypto(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_errors_map_onto_vault_taxonomy() {
        assert!(matches!(VaultError::from(CryptoError::KeyUnwrap), VaultError::KeyUnwrap));
        assert!(matches!(
            VaultError::from(CryptoError::SecretDecrypt),
            VaultError::SecretDecrypt
        ));
        assert!(matches!(
            VaultError::from(CryptoError::KeyDerivation("x".into())),
            VaultError::Crypto(CryptoError::KeyDerivation(_))
        ));
    }

    #[test]
    fn only_token_errors_are_session_errors() {
        assert!(VaultError::from(CryptoError::TokenExpired).is_session_error());
        assert!(VaultError::from(CryptoError::TokenInvalid).is_session_error());
        assert!(!VaultError::AuthenticationFailed.is_session_error());
        assert!(!VaultError::KeyUnwrap.is_session_error());
    }
}
