//! Persisted vault document.
//!
//! ```json
//! {
//!   "version": 1,
//!   "kdf": { "salt": "<hex>", "iterations": 100000 },
//!   "password_verifier": "$argon2id$...",
//!   "wrapped_app_key": "<base64url>",
//!   "derived_key_fingerprint": "<hex>",
//!   "sites": { "<sha256(url)>": { "url": "...", "aliases": ["..."], "username": "...", "secret": "<base64url>" } }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use webpass_crypto_core::{Ciphertext, KdfParams, SALT_LEN};

use crate::error::VaultError;

/// Current on-disk format version.
pub const RECORD_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// SiteId
// ---------------------------------------------------------------------------

/// Content-addressed site identifier: lowercase hex SHA-256 of the
/// canonical URL.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    /// Compute the id for `url`. The canonical form is the URL with
    /// surrounding whitespace removed.
    #[must_use]
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(canonical_url(url).as_bytes());
        Self(data_encoding::HEXLOWER.encode(&digest))
    }

    /// The hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical form of a site URL.
#[must_use]
pub fn canonical_url(url: &str) -> &str {
    url.trim()
}

// ---------------------------------------------------------------------------
// SiteEntry
// ---------------------------------------------------------------------------

/// One stored site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    /// Canonical URL.
    pub url: String,
    /// Short names the site is looked up by. Never empty.
    pub aliases: BTreeSet<String>,
    /// Login name, stored in the clear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Site password encrypted under the application key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<Ciphertext>,
}

// ---------------------------------------------------------------------------
// VaultRecord
// ---------------------------------------------------------------------------

/// Key-derivation settings of one installation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfSection {
    /// Hex-encoded per-installation salt.
    pub salt: String,
    /// PBKDF2 iteration count.
    pub iterations: u32,
}

impl KdfSection {
    /// Build from raw salt bytes.
    #[must_use]
    pub fn new(salt: &[u8], params: &KdfParams) -> Self {
        Self {
            salt: data_encoding::HEXLOWER.encode(salt),
            iterations: params.iterations,
        }
    }

    /// Decoded salt.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultCorrupt`] if the salt is not hex or too
    /// short.
    pub fn salt_bytes(&self) -> Result<Vec<u8>, VaultError> {
        let salt = data_encoding::HEXLOWER_PERMISSIVE
            .decode(self.salt.as_bytes())
            .map_err(|_| VaultError::VaultCorrupt("kdf salt is not hex".into()))?;
        if salt.len() < SALT_LEN {
            return Err(VaultError::VaultCorrupt(format!(
                "kdf salt too short: {} bytes",
                salt.len()
            )));
        }
        Ok(salt)
    }

    /// Parameter set for the derivation.
    #[must_use]
    pub const fn params(&self) -> KdfParams {
        KdfParams::new(self.iterations)
    }
}

/// The whole vault file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Format version, currently [`RECORD_VERSION`].
    pub version: u32,
    /// Derivation salt and cost.
    pub kdf: KdfSection,
    /// Argon2id PHC string of the master password.
    pub password_verifier: String,
    /// Application key wrapped under the derived key.
    pub wrapped_app_key: Ciphertext,
    /// BLAKE3 fingerprint of the derived key. Informational only.
    pub derived_key_fingerprint: String,
    /// Stored sites keyed by [`SiteId`].
    #[serde(default)]
    pub sites: BTreeMap<SiteId, SiteEntry>,
}

impl VaultRecord {
    /// Structural checks run after parsing.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::VaultCorrupt`] describing the first violation.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.version != RECORD_VERSION {
            return Err(VaultError::VaultCorrupt(format!(
                "unsupported version {}",
                self.version
            )));
        }
        self.kdf.salt_bytes()?;
        if self.password_verifier.is_empty() {
            return Err(VaultError::VaultCorrupt("empty password verifier".into()));
        }
        for (id, entry) in &self.sites {
            if entry.aliases.is_empty() {
                return Err(VaultError::VaultCorrupt(format!(
                    "site {} has no aliases",
                    entry.url
                )));
            }
            if let Some(alias) = entry
                .aliases
                .iter()
                .find(|a| a.is_empty() || a.trim() != a.as_str())
            {
                return Err(VaultError::VaultCorrupt(format!(
                    "site {} has unusable alias {alias:?}",
                    entry.url
                )));
            }
            if *id != SiteId::from_url(&entry.url) {
                return Err(VaultError::VaultCorrupt(format!(
                    "site id {id} does not match URL {}",
                    entry.url
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
