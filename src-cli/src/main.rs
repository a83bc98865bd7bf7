//! webpass - Local password vault with alias-based site lookup
//!
//! Commands:
//! - init: Create the vault and choose a master password
//! - add: Store a site under one or more aliases
//! - update: Change username, secret or aliases of a stored site
//! - delete <ALIAS>: Remove the whole site owning ALIAS
//! - visit <ALIAS>: Open the site in the browser
//! - get <ALIAS>: Print the stored secret
//! - list: List stored sites (secrets hidden)
//! - search <TERM>: Find sites by URL or alias

#![cfg_attr(test, allow(clippy::unwrap_used))]

mod logging;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use webpass_vault::{default_data_dir, Config, SiteInput, SiteSummary, Vault, VaultError};
use zeroize::Zeroizing;

/// Master password for non-interactive use.
const PASSWORD_ENV: &str = "WEBPASS_PASSWORD";

#[derive(Parser)]
#[command(name = "webpass")]
#[command(about = "Local password vault - encrypted site secrets behind one master password")]
#[command(version)]
#[command(after_help = r"SESSIONS:
    A successful password entry starts a session (default 3 hours).
    Read commands reuse it; add, update and delete always ask again.

SECURITY:
    - Master password stretched with PBKDF2-HMAC-SHA256
    - Site secrets encrypted with AES-256-GCM under a random application key
    - Vault files are owner-only (0600)")]
struct Cli {
    /// Vault directory (defaults to $WEBPASS_HOME or the platform data dir)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Mirror all log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault
    Init,

    /// Store a site (merges into an existing site with the same URL)
    Add {
        /// Site URL
        #[arg(long)]
        url: String,
        /// Alias to reach the site by (repeatable)
        #[arg(long = "alias", required = true)]
        aliases: Vec<String>,
        /// Login name
        #[arg(long)]
        username: Option<String>,
        /// Site password (omit the value for a hidden prompt)
        #[arg(long, num_args = 0..=1, value_name = "PASSWORD")]
        site_password: Option<Option<String>>,
    },

    /// Update a stored site
    Update {
        /// URL of the stored site
        #[arg(long)]
        url: String,
        /// Extra alias (repeatable)
        #[arg(long = "alias")]
        aliases: Vec<String>,
        /// New login name
        #[arg(long)]
        username: Option<String>,
        /// New site password (omit the value for a hidden prompt)
        #[arg(long, num_args = 0..=1, value_name = "PASSWORD")]
        site_password: Option<Option<String>>,
    },

    /// Delete the site owning an alias, with all of its aliases
    Delete {
        /// Any alias of the site
        alias: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Open a site in the default browser
    Visit {
        /// Site alias
        alias: String,
        /// Also print the stored secret
        #[arg(long)]
        print: bool,
    },

    /// Print the stored secret for an alias
    Get {
        /// Site alias
        alias: String,
    },

    /// List stored sites
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Find sites whose URL or aliases contain TERM
    Search {
        /// Case-insensitive substring
        term: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir().context("Could not determine a data directory")?,
    };
    let _guard = logging::init(&data_dir, cli.verbose)?;

    let config = Config::load(&data_dir)?;
    let vault = Vault::open(config);

    let outcome = match cli.command {
        Commands::Init => cmd_init(&vault),
        Commands::Add {
            url,
            aliases,
            username,
            site_password,
        } => cmd_add(&vault, url, aliases, username, site_password),
        Commands::Update {
            url,
            aliases,
            username,
            site_password,
        } => cmd_update(&vault, url, aliases, username, site_password),
        Commands::Delete { alias, yes } => cmd_delete(&vault, &alias, yes),
        Commands::Visit { alias, print } => cmd_visit(&vault, &alias, print),
        Commands::Get { alias } => cmd_get(&vault, &alias),
        Commands::List { json } => cmd_list(&vault, json),
        Commands::Search { term } => cmd_search(&vault, &term),
    };

    if let Err(err) = &outcome {
        tracing::error!(error = %err, "command failed");
    }
    outcome
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Create the vault
fn cmd_init(vault: &Vault) -> Result<()> {
    if vault.is_initialized() {
        bail!(
            "Vault already initialized at {}",
            vault.vault_path().display()
        );
    }

    let password = new_master_password()?;
    vault.init(&password)?;

    println!("success: Vault initialized at {}", vault.vault_path().display());
    println!();
    println!("Store a site with: webpass add --url <URL> --alias <NAME>");
    Ok(())
}

/// Store a new site
fn cmd_add(
    vault: &Vault,
    url: String,
    aliases: Vec<String>,
    username: Option<String>,
    site_password: Option<Option<String>>,
) -> Result<()> {
    let input = SiteInput {
        url,
        aliases,
        username,
        secret: site_secret(site_password)?,
    };
    let password = master_password()?;
    let id = vault.add(&password, input)?;
    println!("success: Site stored ({id})");
    Ok(())
}

/// Update a stored site
fn cmd_update(
    vault: &Vault,
    url: String,
    aliases: Vec<String>,
    username: Option<String>,
    site_password: Option<Option<String>>,
) -> Result<()> {
    let input = SiteInput {
        url,
        aliases,
        username,
        secret: site_secret(site_password)?,
    };
    let password = master_password()?;
    let id = vault.update(&password, input)?;
    println!("success: Site updated ({id})");
    Ok(())
}

/// Delete the site owning `alias`
fn cmd_delete(vault: &Vault, alias: &str, yes: bool) -> Result<()> {
    let site = vault.preview(alias)?;

    if !yes {
        println!("This removes the whole site, not just the alias:");
        print_site(&site);
        if !confirm("Delete? [y/N] ")? {
            println!("Aborted");
            return Ok(());
        }
    }

    let password = master_password()?;
    let removed = vault.delete_confirmed(&password, alias, &site.site_id)?;
    println!(
        "success: Deleted {} ({} alias{})",
        removed.url,
        removed.aliases.len(),
        if removed.aliases.len() == 1 { "" } else { "es" }
    );
    Ok(())
}

/// Open the site in the browser
fn cmd_visit(vault: &Vault, alias: &str, print: bool) -> Result<()> {
    let key = vault.app_key(prompt_for_session)?;
    let site = vault.lookup(&key, alias)?;

    if let Some(username) = &site.username {
        println!("username: {username}");
    }
    if print {
        match &site.decrypted_secret {
            Some(secret) => println!("password: {}", secret.expose()),
            None => println!("password: (none stored)"),
        }
    }

    open::that(&site.url).with_context(|| format!("Failed to open {}", site.url))?;
    tracing::info!(site_id = %site.site_id, "opened site");
    Ok(())
}

/// Print the stored secret
fn cmd_get(vault: &Vault, alias: &str) -> Result<()> {
    let key = vault.app_key(prompt_for_session)?;
    let site = vault.lookup(&key, alias)?;
    let Some(secret) = site.decrypted_secret else {
        bail!("No password stored for '{alias}'");
    };
    println!("{}", secret.expose());
    Ok(())
}

/// List stored sites
fn cmd_list(vault: &Vault, json: bool) -> Result<()> {
    let sites = vault.list()?;
    print_sites(&sites, json)
}

/// Search stored sites
fn cmd_search(vault: &Vault, term: &str) -> Result<()> {
    let sites = vault.search(term)?;
    if sites.is_empty() {
        println!("No sites match '{term}'");
        return Ok(());
    }
    print_sites(&sites, false)
}

// ---------------------------------------------------------------------------
// Prompts and output
// ---------------------------------------------------------------------------

fn master_password() -> Result<Zeroizing<String>> {
    read_master_password().context("Failed to read master password")
}

fn read_master_password() -> io::Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Zeroizing::new(password));
    }
    rpassword::prompt_password("Master password: ").map(Zeroizing::new)
}

fn prompt_for_session() -> Result<String, VaultError> {
    let mut password = read_master_password()?;
    Ok(std::mem::take(&mut *password))
}

fn new_master_password() -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(Zeroizing::new(password));
    }
    let first = Zeroizing::new(
        rpassword::prompt_password("New master password: ")
            .context("Failed to read master password")?,
    );
    if first.is_empty() {
        bail!("Empty master password not allowed");
    }
    let second = Zeroizing::new(
        rpassword::prompt_password("Repeat master password: ")
            .context("Failed to read master password")?,
    );
    if *first != *second {
        bail!("Passwords do not match");
    }
    Ok(first)
}

/// `--site-password` given without a value prompts; absent means no change.
fn site_secret(flag: Option<Option<String>>) -> Result<Option<String>> {
    match flag {
        None => Ok(None),
        Some(Some(value)) => Ok(Some(value)),
        Some(None) => {
            let value = rpassword::prompt_password("Site password: ")
                .context("Failed to read site password")?;
            if value.is_empty() {
                bail!("Empty value not allowed");
            }
            Ok(Some(value))
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_sites(sites: &[SiteSummary], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(sites)?);
        return Ok(());
    }
    if sites.is_empty() {
        println!("No sites stored");
        return Ok(());
    }
    for site in sites {
        print_site(site);
    }
    Ok(())
}

fn print_site(site: &SiteSummary) {
    println!("{}", site.url);
    println!("  aliases:  {}", site.aliases.join(", "));
    if let Some(username) = &site.username {
        println!("  username: {username}");
    }
    println!(
        "  password: {}",
        if site.has_secret { "stored" } else { "none" }
    );
}
