//! Runtime configuration — plain JSON next to the vault, plus environment
//! overrides.
//!
//! Loaded once per invocation and threaded explicitly into the lifecycle
//! functions; nothing reads it from global state.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use webpass_crypto_core::{SecretKey, DEFAULT_ITERATIONS, KEY_LEN};

use crate::error::VaultError;

const CONFIG_FILE: &str = "config.json";

/// Data directory override.
pub const ENV_HOME: &str = "WEBPASS_HOME";
/// Session signing secret override (64 hex chars).
pub const ENV_SESSION_SECRET: &str = "WEBPASS_SESSION_SECRET";
/// Session window override, in seconds.
pub const ENV_SESSION_EXPIRATION: &str = "WEBPASS_SESSION_EXPIRATION_SECONDS";

/// Three hours.
pub const DEFAULT_SESSION_EXPIRATION_SECONDS: u64 = 10_800;

/// Vault configuration.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the vault, token, key and log files.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Hex-encoded 256-bit signing secret. When unset, the per-installation
    /// `session.key` generated at `init` is used.
    #[serde(default)]
    pub session_signature_secret: Option<String>,

    /// How long an issued session token stays valid.
    #[serde(default = "default_session_expiration")]
    pub session_expiration_seconds: u64,

    /// PBKDF2 iteration count for newly initialised vaults.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

const fn default_session_expiration() -> u64 {
    DEFAULT_SESSION_EXPIRATION_SECONDS
}
const fn default_kdf_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field(
                "session_signature_secret",
                &self.session_signature_secret.as_ref().map(|_| "***"),
            )
            .field("session_expiration_seconds", &self.session_expiration_seconds)
            .field("kdf_iterations", &self.kdf_iterations)
            .finish()
    }
}

impl Config {
    /// Defaults rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            session_signature_secret: None,
            session_expiration_seconds: DEFAULT_SESSION_EXPIRATION_SECONDS,
            kdf_iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Load `{data_dir}/config.json` and apply process environment
    /// overrides.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] if the file is not valid JSON or an
    /// override cannot be parsed.
    pub fn load(data_dir: &Path) -> Result<Self, VaultError> {
        Self::load_with_env(data_dir, |name| std::env::var(name).ok())
    }

    /// [`load`](Self::load) with an injectable environment lookup.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_with_env<F>(data_dir: &Path, env: F) -> Result<Self, VaultError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<Self>(&contents)
                .map_err(|e| VaultError::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::new(data_dir),
            Err(e) => return Err(e.into()),
        };
        config.data_dir = data_dir.to_path_buf();

        if let Some(secret) = env(ENV_SESSION_SECRET).filter(|s| !s.is_empty()) {
            config.session_signature_secret = Some(secret);
        }
        if let Some(raw) = env(ENV_SESSION_EXPIRATION) {
            config.session_expiration_seconds = raw.trim().parse().map_err(|_| {
                VaultError::Config(format!("{ENV_SESSION_EXPIRATION} is not a number: {raw}"))
            })?;
        }
        Ok(config)
    }

    /// Session token window.
    #[must_use]
    pub const fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_expiration_seconds)
    }

    /// Decode the configured signing secret, if any.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Config`] unless the value is exactly 64 hex
    /// characters.
    pub fn signing_secret_override(&self) -> Result<Option<SecretKey>, VaultError> {
        let Some(hex) = self.session_signature_secret.as_deref() else {
            return Ok(None);
        };
        let bytes = data_encoding::HEXLOWER_PERMISSIVE
            .decode(hex.trim().as_bytes())
            .map_err(|_| VaultError::Config("session_signature_secret is not hex".into()))?;
        let bytes = zeroize::Zeroizing::new(bytes);
        if bytes.len() != KEY_LEN {
            return Err(VaultError::Config(format!(
                "session_signature_secret must be {} hex characters",
                KEY_LEN.saturating_mul(2)
            )));
        }
        Ok(Some(SecretKey::from_slice(&bytes)?))
    }
}

/// Resolve the data directory: `$WEBPASS_HOME`, else the platform data
/// directory (`~/.local/share/webpass` on Linux).
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    std::env::var_os(ENV_HOME)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::data_dir().map(|d| d.join("webpass")))
}

// ── Tests ──────────────────────────────────────────────────────────
