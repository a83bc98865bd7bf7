//! Vault lifecycle — init, unlock, session resume, and the site commands.
//!
//! Key hierarchy:
//!
//! ```text
//! master password ─► verifier check ─► PBKDF2 ─► derived key ─► unwrap ─► application key
//!                                                                              │
//!                               session token (signed, time-limited) ◄─────────┤
//!                                                                              ▼
//!                                                                    site secrets (AES-256-GCM)
//! ```
//!
//! Mutations always take the interactive password path. Reads may use the
//! session token via [`Vault::app_key`].

use std::path::PathBuf;

use serde::Serialize;
use webpass_crypto_core::{
    decrypt_secret, derive, encrypt_secret, envelope, fingerprint, generate_salt, hash_password,
    validate, KdfParams, SecretKey, SecretText,
};

use crate::config::Config;
use crate::error::VaultError;
use crate::lock::VaultLock;
use crate::record::{KdfSection, SiteEntry, SiteId, VaultRecord, RECORD_VERSION};
use crate::session;
use crate::store::{SiteUpdate, VaultStore};

/// Vault file name inside the data directory.
const VAULT_FILE: &str = "vault.json";

// ---------------------------------------------------------------------------
// Request / Result types
// ---------------------------------------------------------------------------

/// Site fields as supplied by the user, secret still in plaintext.
#[derive(Default)]
pub struct SiteInput {
    /// Site URL.
    pub url: String,
    /// Aliases to attach.
    pub aliases: Vec<String>,
    /// Login name.
    pub username: Option<String>,
    /// Site password (plaintext, encrypted before storage).
    pub secret: Option<String>,
}

impl std::fmt::Debug for SiteInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteInput")
            .field("url", &self.url)
            .field("aliases", &self.aliases)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .finish()
    }
}

/// A site resolved by alias, with its secret decrypted.
#[derive(Debug)]
pub struct ResolvedSite {
    /// Content-addressed id.
    pub site_id: SiteId,
    /// URL to open.
    pub url: String,
    /// Stored username, if any.
    pub username: Option<String>,
    /// `None` when no secret is stored. Decryption failures are errors,
    /// never `None`.
    pub decrypted_secret: Option<SecretText>,
}

/// Listing row. Never includes secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSummary {
    /// Content-addressed id.
    pub site_id: SiteId,
    /// Site URL.
    pub url: String,
    /// Aliases, sorted.
    pub aliases: Vec<String>,
    /// Stored username, if any.
    pub username: Option<String>,
    /// Whether an encrypted secret is stored.
    pub has_secret: bool,
}

impl SiteSummary {
    fn from_entry(site_id: &SiteId, entry: &SiteEntry) -> Self {
        Self {
            site_id: site_id.clone(),
            url: entry.url.clone(),
            aliases: entry.aliases.iter().cloned().collect(),
            username: entry.username.clone(),
            has_secret: entry.secret.is_some(),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Handle on one installation's data directory.
#[derive(Debug)]
pub struct Vault {
    config: Config,
}

impl Vault {
    /// Bind to the directory named by `config`. Nothing is read yet.
    #[must_use]
    pub const fn open(config: Config) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Location of the vault file.
    #[must_use]
    pub fn vault_path(&self) -> PathBuf {
        self.config.data_dir.join(VAULT_FILE)
    }

    /// `true` once `init` has written the vault file.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.vault_path().exists()
    }

    /// Create a new vault protected by `password`.
    ///
    /// 1. Refuse if a vault file already exists
    /// 2. Generate a per-installation salt and derive the password key
    /// 3. Generate a random application key and wrap it
    /// 4. Store the Argon2id verifier and derived-key fingerprint
    /// 5. Generate a fresh session signing key and issue a first token
    ///
    /// # Errors
    ///
    /// - [`VaultError::AlreadyInitialized`] if the vault exists
    /// - [`VaultError::InvalidInput`] for an empty password
    /// - [`VaultError::Crypto`] / [`VaultError::Io`] on lower-level failures
    pub fn init(&self, password: &str) -> Result<(), VaultError> {
        if password.is_empty() {
            return Err(VaultError::InvalidInput(
                "master password must not be empty".into(),
            ));
        }

        let _lock = VaultLock::acquire(&self.config.data_dir)?;
        let path = self.vault_path();
        if path.exists() {
            return Err(VaultError::AlreadyInitialized(path.display().to_string()));
        }
        warn_if_shared(&self.config.data_dir);

        let salt = generate_salt();
        let params = KdfParams::new(self.config.kdf_iterations);
        let derived_key = derive(password.as_bytes(), &salt, &params)?;
        let app_key = SecretKey::random()?;

        let record = VaultRecord {
            version: RECORD_VERSION,
            kdf: KdfSection::new(&salt, &params),
            password_verifier: hash_password(password.as_bytes())?,
            wrapped_app_key: envelope::wrap(&app_key, &derived_key)?,
            derived_key_fingerprint: fingerprint(&derived_key),
            sites: std::collections::BTreeMap::new(),
        };
        VaultStore::new(path, record).persist()?;

        if self.config.session_signature_secret.is_none() {
            session::rotate_signing_key(&self.config.data_dir)?;
        }
        self.refresh_session(&app_key);

        tracing::info!(
            data_dir = %self.config.data_dir.display(),
            iterations = params.iterations,
            "vault initialized"
        );
        Ok(())
    }

    /// Interactive unlock: verify the password, recover the application key
    /// and refresh the session token.
    ///
    /// # Errors
    ///
    /// - [`VaultError::VaultMissing`] / [`VaultError::VaultCorrupt`] from loading
    /// - [`VaultError::AuthenticationFailed`] for a wrong password
    /// - [`VaultError::KeyUnwrap`] if the envelope does not open
    pub fn unlock(&self, password: &str) -> Result<SecretKey, VaultError> {
        let _lock = VaultLock::acquire(&self.config.data_dir)?;
        let store = VaultStore::load(&self.vault_path())?;
        let app_key = authenticate(store.record(), password)?;
        self.refresh_session(&app_key);
        tracing::info!("vault unlocked with master password");
        Ok(app_key)
    }

    /// Session fast path: recover the application key from the stored
    /// token without a password.
    ///
    /// # Errors
    ///
    /// - [`VaultError::VaultMissing`] if the vault was never initialized
    /// - [`VaultError::TokenInvalid`] if there is no usable token
    /// - [`VaultError::TokenExpired`] if the token is past its window
    pub fn resume(&self) -> Result<SecretKey, VaultError> {
        if !self.is_initialized() {
            return Err(VaultError::VaultMissing(
                self.vault_path().display().to_string(),
            ));
        }
        let token = session::read_token(&self.config.data_dir).ok_or(VaultError::TokenInvalid)?;
        let signer = session::existing_signer(&self.config)?.ok_or(VaultError::TokenInvalid)?;
        let app_key = signer.check_at(
            &token,
            self.config.session_max_age(),
            webpass_crypto_core::unix_now(),
        )?;
        tracing::debug!("session token accepted");
        Ok(app_key)
    }

    /// Application key via the token if possible, otherwise via `prompt`
    /// and [`unlock`](Self::unlock).
    ///
    /// # Errors
    ///
    /// Non-session errors from [`resume`](Self::resume), errors from
    /// `prompt`, and everything [`unlock`](Self::unlock) returns.
    pub fn app_key<F>(&self, prompt: F) -> Result<SecretKey, VaultError>
    where
        F: FnOnce() -> Result<String, VaultError>,
    {
        match self.resume() {
            Ok(key) => Ok(key),
            Err(err) if err.is_session_error() => {
                tracing::warn!(reason = %err, "falling back to master password");
                let password = zeroize::Zeroizing::new(prompt()?);
                self.unlock(&password)
            }
            Err(err) => Err(err),
        }
    }

    /// Add a site, or merge into the existing site with the same URL.
    ///
    /// # Errors
    ///
    /// Authentication errors as for [`unlock`](Self::unlock), plus
    /// [`VaultError::AliasConflict`] and [`VaultError::InvalidInput`] from
    /// the store.
    pub fn add(&self, password: &str, input: SiteInput) -> Result<SiteId, VaultError> {
        self.mutate(password, |store, app_key| {
            let update = encrypt_input(input, app_key)?;
            let id = store.add_or_update(update)?;
            tracing::info!(site_id = %id, "site added");
            Ok(id)
        })
    }

    /// Update an existing site. Supplied aliases are merged; omitted fields
    /// keep their stored values.
    ///
    /// # Errors
    ///
    /// [`VaultError::SiteNotFound`] if no site has this URL, otherwise as
    /// for [`add`](Self::add).
    pub fn update(&self, password: &str, input: SiteInput) -> Result<SiteId, VaultError> {
        self.mutate(password, |store, app_key| {
            if store.get_by_url(&input.url).is_none() {
                return Err(VaultError::SiteNotFound(input.url.trim().to_owned()));
            }
            let update = encrypt_input(input, app_key)?;
            let id = store.add_or_update(update)?;
            tracing::info!(site_id = %id, "site updated");
            Ok(id)
        })
    }

    /// Delete the **entire** site owning `alias`: all of its aliases,
    /// username and secret. Returns the removed entry so the caller can
    /// report exactly what went away.
    ///
    /// # Errors
    ///
    /// [`VaultError::AliasNotFound`] if no site owns `alias`, otherwise as
    /// for [`unlock`](Self::unlock).
    pub fn delete(&self, password: &str, alias: &str) -> Result<SiteEntry, VaultError> {
        self.delete_matching(password, alias, None)
    }

    /// [`delete`](Self::delete), but only if `alias` still resolves to
    /// `expected`, the site the caller previewed and confirmed.
    ///
    /// # Errors
    ///
    /// [`VaultError::SiteChanged`] if `alias` now belongs to another site,
    /// otherwise as for [`delete`](Self::delete).
    pub fn delete_confirmed(
        &self,
        password: &str,
        alias: &str,
        expected: &SiteId,
    ) -> Result<SiteEntry, VaultError> {
        self.delete_matching(password, alias, Some(expected))
    }

    fn delete_matching(
        &self,
        password: &str,
        alias: &str,
        expected: Option<&SiteId>,
    ) -> Result<SiteEntry, VaultError> {
        self.mutate(password, |store, _| {
            let owner = store
                .lookup_by_alias(alias)
                .ok_or_else(|| VaultError::AliasNotFound(alias.trim().to_owned()))?;
            if expected.is_some_and(|id| *id != owner) {
                return Err(VaultError::SiteChanged(alias.trim().to_owned()));
            }
            let (id, entry) = store
                .take(alias)
                .ok_or_else(|| VaultError::AliasNotFound(alias.trim().to_owned()))?;
            tracing::info!(site_id = %id, aliases = entry.aliases.len(), "site deleted");
            Ok(entry)
        })
    }

    /// Preview of what [`delete`](Self::delete) would remove. No key
    /// material needed.
    ///
    /// # Errors
    ///
    /// Load errors, or [`VaultError::AliasNotFound`].
    pub fn preview(&self, alias: &str) -> Result<SiteSummary, VaultError> {
        let store = VaultStore::load(&self.vault_path())?;
        store
            .entry_for_alias(alias)
            .map(|(id, entry)| SiteSummary::from_entry(&id, entry))
            .ok_or_else(|| VaultError::AliasNotFound(alias.trim().to_owned()))
    }

    /// Resolve `alias` and decrypt its secret.
    ///
    /// # Errors
    ///
    /// - [`VaultError::AliasNotFound`] if no site owns `alias`
    /// - [`VaultError::SecretDecrypt`] if a stored secret does not decrypt
    pub fn lookup(&self, app_key: &SecretKey, alias: &str) -> Result<ResolvedSite, VaultError> {
        let store = VaultStore::load(&self.vault_path())?;
        let (site_id, entry) = store
            .entry_for_alias(alias)
            .ok_or_else(|| VaultError::AliasNotFound(alias.trim().to_owned()))?;
        let decrypted_secret = entry
            .secret
            .as_ref()
            .map(|ct| decrypt_secret(ct, app_key))
            .transpose()?;
        Ok(ResolvedSite {
            site_id,
            url: entry.url.clone(),
            username: entry.username.clone(),
            decrypted_secret,
        })
    }

    /// Every stored site.
    ///
    /// # Errors
    ///
    /// Load errors.
    pub fn list(&self) -> Result<Vec<SiteSummary>, VaultError> {
        let store = VaultStore::load(&self.vault_path())?;
        Ok(store
            .sites()
            .map(|(id, entry)| SiteSummary::from_entry(id, entry))
            .collect())
    }

    /// Sites whose URL or aliases contain `term` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Load errors.
    pub fn search(&self, term: &str) -> Result<Vec<SiteSummary>, VaultError> {
        let store = VaultStore::load(&self.vault_path())?;
        Ok(store
            .search(term)
            .into_iter()
            .map(|(id, entry)| SiteSummary::from_entry(id, entry))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Locked load → authenticate → `op` → persist → refresh token.
    fn mutate<T, F>(&self, password: &str, op: F) -> Result<T, VaultError>
    where
        F: FnOnce(&mut VaultStore, &SecretKey) -> Result<T, VaultError>,
    {
        let _lock = VaultLock::acquire(&self.config.data_dir)?;
        let mut store = VaultStore::load(&self.vault_path())?;
        let app_key = authenticate(store.record(), password)?;
        let out = op(&mut store, &app_key)?;
        store.persist()?;
        self.refresh_session(&app_key);
        Ok(out)
    }

    /// Issue and store a fresh token. Caller holds the lock.
    ///
    /// The token only saves a password prompt, so a failure here is logged
    /// and the command that already succeeded still reports success.
    fn refresh_session(&self, app_key: &SecretKey) {
        let issued = session::issuing_signer(&self.config).and_then(|signer| {
            session::write_token(&self.config.data_dir, &signer.issue(app_key))
        });
        if let Err(err) = issued {
            tracing::warn!(error = %err, "session token not refreshed");
        }
    }
}

/// Verifier gate, then derive and unwrap.
fn authenticate(record: &VaultRecord, password: &str) -> Result<SecretKey, VaultError> {
    if !validate(password.as_bytes(), &record.password_verifier) {
        tracing::warn!("master password rejected");
        return Err(VaultError::AuthenticationFailed);
    }
    let salt = record.kdf.salt_bytes()?;
    let derived_key = derive(password.as_bytes(), &salt, &record.kdf.params())?;
    if fingerprint(&derived_key) != record.derived_key_fingerprint {
        tracing::debug!("derived key fingerprint differs from stored value");
    }
    envelope::unwrap(&record.wrapped_app_key, &derived_key).map_err(VaultError::from)
}

fn encrypt_input(input: SiteInput, app_key: &SecretKey) -> Result<SiteUpdate, VaultError> {
    let secret = zeroize::Zeroizing::new(input.secret);
    Ok(SiteUpdate {
        url: input.url,
        aliases: input.aliases,
        username: input.username,
        secret: encrypt_secret(secret.as_deref(), app_key)?,
    })
}

/// Existing directories are left alone; only note when others can read them.
fn warn_if_shared(dir: &std::path::Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = std::fs::metadata(dir) {
            let mode = meta.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                tracing::warn!(
                    data_dir = %dir.display(),
                    mode = %format!("{mode:o}"),
                    "data directory is accessible to other users"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use webpass_crypto_core::MIN_ITERATIONS;

    fn fresh() -> (tempfile::TempDir, Vault) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new(dir.path());
        config.kdf_iterations = MIN_ITERATIONS;
        (dir, Vault::open(config))
    }

    fn site(url: &str, aliases: &[&str], secret: Option<&str>) -> SiteInput {
        SiteInput {
            url: url.into(),
            aliases: aliases.iter().map(|a| (*a).to_owned()).collect(),
            username: None,
            secret: secret.map(str::to_owned),
        }
    }

    #[test]
    fn init_writes_vault_token_and_signing_key() {
        let (dir, vault) = fresh();
        vault.init("pw").unwrap();
        assert!(vault.is_initialized());
        assert!(dir.path().join("session.key").exists());
        assert!(session::read_token(dir.path()).is_some());
    }

    #[test]
    fn init_twice_is_refused() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        assert!(matches!(
            vault.init("pw"),
            Err(VaultError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn empty_password_is_rejected_at_init() {
        let (_dir, vault) = fresh();
        assert!(matches!(vault.init(""), Err(VaultError::InvalidInput(_))));
        assert!(!vault.is_initialized());
    }

    #[test]
    fn unlock_and_resume_agree_on_app_key() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        let unlocked = vault.unlock("pw").unwrap();
        let resumed = vault.resume().unwrap();
        assert_eq!(unlocked.expose(), resumed.expose());
    }

    #[test]
    fn resume_without_vault_reports_missing() {
        let (_dir, vault) = fresh();
        assert!(matches!(vault.resume(), Err(VaultError::VaultMissing(_))));
    }

    #[test]
    fn app_key_skips_prompt_when_token_is_valid() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        let key = vault
            .app_key(|| panic!("prompt must not be called"))
            .unwrap();
        assert_eq!(key.expose(), vault.unlock("pw").unwrap().expose());
    }

    #[test]
    fn app_key_prompts_when_token_is_gone() {
        let (dir, vault) = fresh();
        vault.init("pw").unwrap();
        std::fs::remove_file(session::token_path(dir.path())).unwrap();

        let mut prompted = false;
        vault
            .app_key(|| {
                prompted = true;
                Ok("pw".to_owned())
            })
            .unwrap();
        assert!(prompted);
        assert!(session::read_token(dir.path()).is_some());
    }

    #[test]
    fn mutations_reject_wrong_password() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        let err = vault
            .add("nope", site("https://example.com", &["ex"], None))
            .unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailed));
        assert!(vault.list().unwrap().is_empty());
    }

    #[test]
    fn update_requires_existing_site() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        let err = vault
            .update("pw", site("https://example.com", &["ex"], None))
            .unwrap_err();
        assert!(matches!(err, VaultError::SiteNotFound(_)));
    }

    #[test]
    fn update_keeps_secret_when_not_supplied() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        vault
            .add("pw", site("https://example.com", &["ex"], Some("s3cr3t")))
            .unwrap();
        vault
            .update("pw", site("https://example.com", &["example"], None))
            .unwrap();

        let key = vault.resume().unwrap();
        let resolved = vault.lookup(&key, "example").unwrap();
        assert_eq!(resolved.decrypted_secret.unwrap().expose(), "s3cr3t");
    }

    #[test]
    fn delete_returns_removed_site_and_preview_matches() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        vault
            .add("pw", site("https://example.com", &["ex", "example"], None))
            .unwrap();

        let preview = vault.preview("ex").unwrap();
        let removed = vault.delete("pw", "ex").unwrap();
        assert_eq!(preview.url, removed.url);
        assert_eq!(preview.aliases, vec!["ex".to_owned(), "example".to_owned()]);
        assert!(removed.aliases.iter().eq(preview.aliases.iter()));
        assert!(matches!(
            vault.preview("example"),
            Err(VaultError::AliasNotFound(_))
        ));
    }

    #[test]
    fn confirmed_delete_refuses_a_different_site() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        vault
            .add("pw", site("https://example.com", &["ex"], None))
            .unwrap();
        let previewed = vault.preview("ex").unwrap();

        // The alias moves to another site between preview and delete.
        vault.delete("pw", "ex").unwrap();
        vault
            .add("pw", site("https://other.test", &["ex"], None))
            .unwrap();

        let err = vault
            .delete_confirmed("pw", "ex", &previewed.site_id)
            .unwrap_err();
        assert!(matches!(err, VaultError::SiteChanged(a) if a == "ex"));
        assert_eq!(vault.list().unwrap().len(), 1);
    }

    #[test]
    fn confirmed_delete_removes_previewed_site() {
        let (_dir, vault) = fresh();
        vault.init("pw").unwrap();
        vault
            .add("pw", site("https://example.com", &["ex"], None))
            .unwrap();
        let previewed = vault.preview("ex").unwrap();
        let removed = vault
            .delete_confirmed("pw", "ex", &previewed.site_id)
            .unwrap();
        assert_eq!(removed.url, "https://example.com");
        assert!(vault.list().unwrap().is_empty());
    }

    #[test]
    fn site_input_debug_masks_secret() {
        let input = site("https://example.com", &["ex"], Some("s3cr3t"));
        let rendered = format!("{input:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(rendered.contains("***"));
    }
}
