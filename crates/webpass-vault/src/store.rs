//! Vault store — whole-file load/persist plus site-level mutations.
//!
//! Each invocation reloads the file; nothing is cached across processes.
//! Writes go to a `.tmp` sibling (mode 0600) and are renamed over the
//! target, so a crash never leaves a half-written vault.

use std::fs;
use std::path::{Path, PathBuf};

use webpass_crypto_core::Ciphertext;

use crate::error::VaultError;
use crate::record::{canonical_url, SiteEntry, SiteId, VaultRecord};

/// Changes requested for one site.
///
/// `None` (or an empty string) for `username`/`secret` keeps whatever is
/// stored.
#[derive(Debug, Clone, Default)]
pub struct SiteUpdate {
    /// Site URL; its canonical form determines the [`SiteId`].
    pub url: String,
    /// Aliases to add. Required when the site is new.
    pub aliases: Vec<String>,
    /// New username.
    pub username: Option<String>,
    /// New encrypted secret.
    pub secret: Option<Ciphertext>,
}

/// An open vault file.
#[derive(Debug)]
pub struct VaultStore {
    path: PathBuf,
    record: VaultRecord,
}

impl VaultStore {
    /// Wrap a freshly created record that has not been written yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, record: VaultRecord) -> Self {
        Self {
            path: path.into(),
            record,
        }
    }

    /// Read and validate the vault file.
    ///
    /// # Errors
    ///
    /// - [`VaultError::VaultMissing`] if the file does not exist
    /// - [`VaultError::VaultCorrupt`] if it is not a valid vault document
    /// - [`VaultError::Io`] for other read failures
    pub fn load(path: &Path) -> Result<Self, VaultError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VaultError::VaultMissing(path.display().to_string()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(VaultError::VaultCorrupt("file is not UTF-8".into()));
            }
            Err(e) => return Err(e.into()),
        };
        let record: VaultRecord =
            serde_json::from_str(&contents).map_err(|e| VaultError::VaultCorrupt(e.to_string()))?;
        record.validate()?;
        Ok(Self::new(path, record))
    }

    /// Rewrite the whole vault file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Io`] if the directory or file cannot be written.
    pub fn persist(&self) -> Result<(), VaultError> {
        let json = serde_json::to_string_pretty(&self.record)
            .map_err(|e| VaultError::VaultCorrupt(format!("serialization failed: {e}")))?;
        write_private(&self.path, json.as_bytes())
    }

    /// The underlying record.
    #[must_use]
    pub const fn record(&self) -> &VaultRecord {
        &self.record
    }

    /// Path of the vault file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -----------------------------------------------------------------------
    // Site operations
    // -----------------------------------------------------------------------

    /// Create a site or merge into the existing one with the same URL.
    ///
    /// Aliases are unioned. `username` and `secret` are overwritten only by
    /// new non-empty values; omission never erases what is stored. Repeating
    /// an identical call changes nothing.
    ///
    /// # Errors
    ///
    /// - [`VaultError::InvalidInput`] for an empty URL, a blank alias, or a
    ///   new site with no aliases
    /// - [`VaultError::AliasConflict`] if an alias belongs to another site;
    ///   the store is left untouched
    pub fn add_or_update(&mut self, update: SiteUpdate) -> Result<SiteId, VaultError> {
        let url = canonical_url(&update.url);
        if url.is_empty() {
            return Err(VaultError::InvalidInput("URL must not be empty".into()));
        }
        let aliases = normalize_aliases(&update.aliases)?;
        let id = SiteId::from_url(url);

        for alias in &aliases {
            if let Some(owner) = self.lookup_by_alias(alias) {
                if owner != id {
                    let owner_url = self
                        .record
                        .sites
                        .get(&owner)
                        .map(|e| e.url.clone())
                        .unwrap_or_default();
                    return Err(VaultError::AliasConflict {
                        alias: alias.clone(),
                        owner_url,
                    });
                }
            }
        }

        let username = update.username.filter(|u| !u.is_empty());
        if let Some(entry) = self.record.sites.get_mut(&id) {
            entry.aliases.extend(aliases);
            if username.is_some() {
                entry.username = username;
            }
            if update.secret.is_some() {
                entry.secret = update.secret;
            }
        } else {
            if aliases.is_empty() {
                return Err(VaultError::InvalidInput(
                    "a new site needs at least one alias".into(),
                ));
            }
            self.record.sites.insert(
                id.clone(),
                SiteEntry {
                    url: url.to_owned(),
                    aliases: aliases.into_iter().collect(),
                    username,
                    secret: update.secret,
                },
            );
        }
        Ok(id)
    }

    /// Resolve an alias to its site.
    ///
    /// Scans every entry in [`SiteId`] order; if a hand-edited file lists the
    /// same alias twice, the last entry scanned wins.
    #[must_use]
    pub fn lookup_by_alias(&self, alias: &str) -> Option<SiteId> {
        let alias = alias.trim();
        let mut found = None;
        for (id, entry) in &self.record.sites {
            if entry.aliases.contains(alias) {
                found = Some(id);
            }
        }
        found.cloned()
    }

    /// The entry a [`remove`](Self::remove) of `alias` would delete.
    #[must_use]
    pub fn entry_for_alias(&self, alias: &str) -> Option<(SiteId, &SiteEntry)> {
        let id = self.lookup_by_alias(alias)?;
        let entry = self.record.sites.get(&id)?;
        Some((id, entry))
    }

    /// Entry by id.
    #[must_use]
    pub fn get(&self, id: &SiteId) -> Option<&SiteEntry> {
        self.record.sites.get(id)
    }

    /// Entry by URL.
    #[must_use]
    pub fn get_by_url(&self, url: &str) -> Option<&SiteEntry> {
        self.get(&SiteId::from_url(url))
    }

    /// Delete the **whole** entry owning `alias`: every other alias, the
    /// username and the secret go with it. Returns what was removed.
    pub fn take(&mut self, alias: &str) -> Option<(SiteId, SiteEntry)> {
        let id = self.lookup_by_alias(alias)?;
        let entry = self.record.sites.remove(&id)?;
        Some((id, entry))
    }

    /// Whole-entry delete, see [`take`](Self::take). `true` if something was
    /// removed.
    pub fn remove(&mut self, alias: &str) -> bool {
        self.take(alias).is_some()
    }

    /// All entries in [`SiteId`] order.
    pub fn sites(&self) -> impl Iterator<Item = (&SiteId, &SiteEntry)> {
        self.record.sites.iter()
    }

    /// Entries whose URL or any alias contains `term`, case-insensitively.
    /// An empty term matches everything.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<(&SiteId, &SiteEntry)> {
        let needle = term.trim().to_lowercase();
        self.sites()
            .filter(|(_, entry)| {
                entry.url.to_lowercase().contains(&needle)
                    || entry
                        .aliases
                        .iter()
                        .any(|a| a.to_lowercase().contains(&needle))
            })
            .collect()
    }
}

fn normalize_aliases(raw: &[String]) -> Result<Vec<String>, VaultError> {
    let mut aliases = Vec::with_capacity(raw.len());
    for alias in raw {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(VaultError::InvalidInput("aliases must not be blank".into()));
        }
        if !aliases.iter().any(|a: &String| a == alias) {
            aliases.push(alias.to_owned());
        }
    }
    Ok(aliases)
}

/// Create `dir` (and missing parents) owner-only. A directory that already
/// exists keeps its permissions.
///
/// # Errors
///
/// Returns [`VaultError::Io`] if the directory cannot be created.
pub fn create_private_dir(dir: &Path) -> Result<(), VaultError> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)?;
    Ok(())
}

/// Atomically replace `path` with `contents`, owner-only permissions.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> Result<(), VaultError> {
    let dir = path
        .parent()
        .ok_or_else(|| VaultError::InvalidInput(format!("no parent for {}", path.display())))?;
    create_private_dir(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{file_name}.tmp"));

    fs::write(&tmp, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────
