//! `webpass-vault` — persistent vault and command lifecycle for WebPass.
//!
//! Wraps `webpass-crypto-core` with everything that touches disk: the JSON
//! vault file, configuration, session token and signing-key files, and the
//! advisory lock that serializes concurrent invocations.
//!
//! [`Vault`] is the entry point; the CLI never talks to the store directly.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod lock;
pub mod record;
pub mod session;
pub mod store;

pub use config::{default_data_dir, Config};
pub use error::VaultError;
pub use lifecycle::{ResolvedSite, SiteInput, SiteSummary, Vault};
pub use record::{SiteEntry, SiteId, VaultRecord};
pub use store::{SiteUpdate, VaultStore};
