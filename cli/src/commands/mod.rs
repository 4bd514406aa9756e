pub mod backup;
pub mod restore;
pub mod scan;
pub mod verify;
pub mod versions;

use crate::config::Config;
use crate::Cli;
use anyhow::{anyhow, Result};
use keepsafe_core::progress::SharedProgress;
use keepsafe_core::VersionManager;
use std::io::{self, Write};
use tracing::info;

/// Opens the backup root with the configured remote, if any.
pub async fn open_manager(cli: &Cli, config: &Config, progress: SharedProgress) -> Result<VersionManager> {
    let root = config.backup_root(cli.root.as_deref())?;
    info!("Using backup root {}", root.display());

    let mut manager = VersionManager::new(root).with_progress(progress);
    if let Some(remote) = config.remote_fetcher().await? {
        manager = manager.with_remote(remote);
    }
    Ok(manager)
}

/// Password from the flag or environment, else prompted on the terminal.
pub fn password(cli: &Cli, prompt: &str) -> Result<String> {
    if let Some(password) = &cli.password {
        return Ok(password.clone());
    }

    print!("{}: ", prompt);
    io::stdout().flush()?;
    let password = rpassword::read_password()?;
    if password.is_empty() {
        return Err(anyhow!("Password required"));
    }
    Ok(password)
}

pub fn print_samples(samples: &[String], total: usize) {
    if total == 0 {
        return;
    }
    println!("Errors: {}", total);
    for sample in samples {
        println!("  - {}", sample);
    }
    if total > samples.len() {
        println!("  ... {} more", total - samples.len());
    }
    println!("Full error details are in the log.");
}
