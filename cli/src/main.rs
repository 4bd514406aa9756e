mod commands;
mod config;
mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{
    backup::BackupCommand, restore::RestoreCommand, scan::ScanCommand, verify::VerifyCommand,
    versions::VersionsCommand,
};
use config::Config;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "keepsafe",
    about = "Deduplicating, encrypted personal backups",
    long_about = "Keepsafe stores every file once in a content-addressed object store, \
                  optionally compressed and encrypted, and keeps a manifest per backup version"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, env = "KEEPSAFE_ROOT", help = "Backup root directory")]
    root: Option<PathBuf>,

    #[arg(long, global = true, env = "KEEPSAFE_PASSWORD", hide_env_values = true, help = "Encryption password")]
    password: Option<String>,

    #[arg(long, global = true, help = "Config file (defaults to the user config directory)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Append the full log to this file")]
    log_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Scan a directory and report what a backup would contain")]
    Scan(ScanCommand),

    #[command(about = "Create a new backup version")]
    Backup(BackupCommand),

    #[command(about = "Restore a backup version")]
    Restore(RestoreCommand),

    #[command(about = "List backup versions")]
    Versions(VersionsCommand),

    #[command(about = "Check that every object of a version decodes to its recorded hash")]
    Verify(VerifyCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet, cli.log_file.as_ref())?;
    let config = Config::load(cli.config.as_deref())?;

    info!("Starting keepsafe");

    match cli.command {
        Commands::Scan(ref cmd) => cmd.run(&cli).await,
        Commands::Backup(ref cmd) => cmd.run(&cli, &config).await,
        Commands::Restore(ref cmd) => cmd.run(&cli, &config).await,
        Commands::Versions(ref cmd) => cmd.run(&cli, &config).await,
        Commands::Verify(ref cmd) => cmd.run(&cli, &config).await,
    }
}

fn init_tracing(verbose: bool, quiet: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "keepsafe={level},keepsafe_core={level},keepsafe_backends={level}"
        ))
    });

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Setting default subscriber failed")
}
