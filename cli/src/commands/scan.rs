use crate::progress::TerminalProgress;
use anyhow::Result;
use clap::Args;
use keepsafe_core::Scanner;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct ScanCommand {
    #[arg(help = "Directory to scan")]
    source: PathBuf,

    #[arg(long, help = "List every file with its hash")]
    list: bool,
}

impl ScanCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let progress = Arc::new(TerminalProgress::spinner(cli.quiet));
        let scan = Scanner::new(progress.clone()).scan(&self.source).await?;
        progress.finish(format!("Found {} files", scan.total_files));

        if self.list {
            for (path, hash) in scan.iter() {
                println!("{}  {}", hash, path.display());
            }
        }

        println!("Total files: {}", scan.total_files);
        println!("Total size: {:.2} MB", scan.total_size as f64 / 1024.0 / 1024.0);
        Ok(())
    }
}
