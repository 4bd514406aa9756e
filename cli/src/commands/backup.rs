use crate::config::Config;
use crate::progress::TerminalProgress;
use anyhow::{anyhow, Result};
use clap::Args;
use keepsafe_core::{BackupOptions, Salt, Scanner};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args)]
pub struct BackupCommand {
    #[arg(help = "Directory to back up")]
    source: PathBuf,

    #[arg(long, short, help = "Project name (defaults to the source directory name)")]
    project: Option<String>,

    #[arg(long, short, default_value = "", help = "Free-text comment stored in the manifest")]
    comment: String,

    #[arg(long, help = "Store payloads without compression")]
    no_compress: bool,

    #[arg(long, help = "Encrypt (prompts for a password unless one is given)")]
    encrypt: bool,

    #[arg(long, value_name = "HEX", conflicts_with = "reuse_salt", help = "Use this 16-byte salt")]
    salt: Option<Salt>,

    #[arg(long, help = "Reuse the salt of the project's latest encrypted version")]
    reuse_salt: bool,
}

impl BackupCommand {
    /// A salt only means something for an encrypted backup.
    fn check_salt_flags(&self, encrypting: bool) -> Result<()> {
        if !encrypting && (self.salt.is_some() || self.reuse_salt) {
            return Err(anyhow!(
                "--salt and --reuse-salt need encryption (--encrypt, --password or KEEPSAFE_PASSWORD)"
            ));
        }
        Ok(())
    }

    pub async fn run(&self, cli: &crate::Cli, config: &Config) -> Result<()> {
        let project = match &self.project {
            Some(project) => project.clone(),
            None => self
                .source
                .canonicalize()?
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("Cannot derive a project name from {}", self.source.display()))?,
        };

        let scan_progress = Arc::new(TerminalProgress::spinner(cli.quiet));
        let scan = Scanner::new(scan_progress.clone()).scan(&self.source).await?;
        scan_progress.finish(format!(
            "Found {} files ({:.2} MB)",
            scan.total_files,
            scan.total_size as f64 / 1024.0 / 1024.0
        ));

        let progress = Arc::new(TerminalProgress::bar(cli.quiet, scan.total_files as u64));
        let manager = super::open_manager(cli, config, progress.clone()).await?;

        let encrypting = self.encrypt || cli.password.is_some();
        self.check_salt_flags(encrypting)?;

        let password = if encrypting {
            Some(super::password(cli, "Enter backup password")?)
        } else {
            None
        };

        let salt = if self.reuse_salt {
            let salt = manager.latest_salt(&project).await?;
            if salt.is_none() {
                info!("No earlier encrypted version of {}; generating a new salt", project);
            }
            salt
        } else {
            self.salt
        };

        let compress = !self.no_compress && config.compress.unwrap_or(true);
        let mut options = BackupOptions::new(&self.source, &project)
            .with_comment(self.comment.clone())
            .with_compression(compress)
            .with_salt(salt);
        if let Some(password) = password {
            options = options.with_password(password);
        }

        let summary = manager.create_backup(&scan, &options).await?;
        progress.finish("Files processed");

        println!("Backup completed: {}/{}", project, summary.version);
        println!("Copied:   {}", summary.copied);
        println!("Deduplicated: {}", summary.skipped);
        if summary.errors > 0 {
            println!("Errors:   {} (see log)", summary.errors);
        }
        Ok(())
    }
}
