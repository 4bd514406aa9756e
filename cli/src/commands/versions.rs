use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use keepsafe_core::progress::no_progress;
use serde::Serialize;

#[derive(Args)]
pub struct VersionsCommand {
    #[arg(long, short, help = "Only this project")]
    project: Option<String>,

    #[arg(long, help = "Only versions whose name contains this text")]
    date: Option<String>,

    #[arg(long, default_value = "table", help = "Output format (table, json)")]
    format: String,
}

#[derive(Serialize)]
struct VersionRow {
    project: String,
    version: String,
    files: usize,
    encrypted: bool,
    compressed: bool,
    comment: String,
}

impl VersionsCommand {
    pub async fn run(&self, cli: &crate::Cli, config: &Config) -> Result<()> {
        let manager = super::open_manager(cli, config, no_progress()).await?;
        let versions = manager
            .list_versions(self.project.as_deref(), self.date.as_deref())
            .await?;

        let mut rows = Vec::with_capacity(versions.len());
        for version in versions {
            let manifest = manager.load_manifest(&version.project, &version.name).await?;
            rows.push(VersionRow {
                files: manifest.files.len(),
                encrypted: manifest.is_encrypted(),
                compressed: manifest.info.compression_enabled,
                comment: manifest.info.comment,
                project: version.project,
                version: version.name,
            });
        }

        match self.format.as_str() {
            "table" => {
                if rows.is_empty() {
                    println!("No versions found");
                    return Ok(());
                }
                println!(
                    "{:<20} {:<24} {:>6} {:<4} {:<4} {}",
                    "Project", "Version", "Files", "Enc", "Zip", "Comment"
                );
                println!("{:-<80}", "");
                for row in &rows {
                    println!(
                        "{:<20} {:<24} {:>6} {:<4} {:<4} {}",
                        row.project,
                        row.version,
                        row.files,
                        if row.encrypted { "yes" } else { "no" },
                        if row.compressed { "yes" } else { "no" },
                        row.comment
                    );
                }
            }
            "json" => println!("{}", serde_json::to_string_pretty(&rows)?),
            other => return Err(anyhow!("Unsupported format: {}", other)),
        }

        Ok(())
    }
}
