use crate::config::Config;
use crate::progress::TerminalProgress;
use anyhow::{anyhow, Result};
use clap::Args;
use std::sync::Arc;

#[derive(Args)]
pub struct VerifyCommand {
    #[arg(help = "Project name")]
    project: String,

    #[arg(help = "Version name (defaults to the latest)")]
    version: Option<String>,
}

impl VerifyCommand {
    pub async fn run(&self, cli: &crate::Cli, config: &Config) -> Result<()> {
        let progress = Arc::new(TerminalProgress::bar(cli.quiet, 0));
        let manager = super::open_manager(cli, config, progress.clone()).await?;

        let version = match &self.version {
            Some(version) => version.clone(),
            None => manager
                .latest_version(Some(&self.project), None)
                .await?
                .map(|v| v.name)
                .ok_or_else(|| anyhow!("No versions found for project {}", self.project))?,
        };

        let manifest = manager.load_manifest(&self.project, &version).await?;
        let password = if manifest.is_encrypted() {
            Some(super::password(cli, "Enter backup password")?)
        } else {
            None
        };

        let summary = manager
            .verify_version(&self.project, &version, password.as_deref())
            .await?;
        progress.finish("Verification finished");

        println!("Verified: {} / {}", summary.verified, summary.total_files);
        for path in &summary.integrity_failures {
            println!("ALARM: {} is damaged (hash mismatch)", path);
        }
        super::print_samples(&summary.error_samples, summary.errors);

        if summary.is_clean() {
            Ok(())
        } else {
            Err(anyhow!("Version {}/{} failed verification", self.project, version))
        }
    }
}
