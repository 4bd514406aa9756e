use crate::config::Config;
use crate::progress::TerminalProgress;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use keepsafe_core::{Error, RestoreOptions};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct RestoreCommand {
    #[arg(help = "Project to restore")]
    project: String,

    #[arg(help = "Target directory; output goes to <target>/<project>_<version>")]
    target: PathBuf,

    #[arg(long, conflicts_with_all = ["latest", "date"], help = "Version name")]
    version: Option<String>,

    #[arg(long, conflicts_with = "date", help = "Restore the newest version (the default)")]
    latest: bool,

    #[arg(long, help = "Pick the latest version whose name contains this text")]
    date: Option<String>,

    #[arg(long, help = "Keep encrypted objects encrypted (forensic restore)")]
    raw_encrypted: bool,

    #[arg(long, help = "Keep compressed objects compressed (forensic restore)")]
    raw_compressed: bool,
}

impl RestoreCommand {
    pub async fn run(&self, cli: &crate::Cli, config: &Config) -> Result<()> {
        let progress = Arc::new(TerminalProgress::bar(cli.quiet, 0));
        let manager = super::open_manager(cli, config, progress.clone()).await?;

        let version = match &self.version {
            Some(version) => version.clone(),
            None => manager
                .latest_version(Some(&self.project), if self.latest { None } else { self.date.as_deref() })
                .await?
                .map(|v| v.name)
                .ok_or_else(|| anyhow!("No versions found for project {}", self.project))?,
        };

        let manifest = manager.load_manifest(&self.project, &version).await?;
        let decrypt = !self.raw_encrypted;
        let mut options = RestoreOptions::new(&self.project, &version, &self.target)
            .technical(decrypt, !self.raw_compressed);
        if manifest.is_encrypted() && decrypt {
            options = options.with_password(super::password(cli, "Enter backup password")?);
        }

        println!("Restoring {} ({})", self.project, manifest.summary());
        let summary = match manager.restore_version(&options).await {
            Ok(summary) => summary,
            Err(e @ Error::AuthenticationFailed { .. }) => {
                progress.finish("Aborted");
                return Err(e).context("Restore aborted: wrong password or damaged data");
            }
            Err(e) => return Err(e.into()),
        };
        progress.finish("Restore completed");

        println!("Restored: {} / {}", summary.restored, summary.total_files);
        for path in &summary.integrity_failures {
            println!("ALARM: {} is damaged (hash mismatch)", path);
        }
        super::print_samples(&summary.error_samples, summary.errors);
        println!("Location: {}", summary.output_dir.display());
        if !options.is_clean() {
            println!("Files were written in stored form with a .raw suffix");
        }
        Ok(())
    }
}
