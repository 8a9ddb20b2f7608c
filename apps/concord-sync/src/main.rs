//! Convergence runner: directory and inventory in, helpdesk and
//! inventory out. Designed to run unattended from cron; `--dry-run`
//! plans without writing.

mod config;
mod pipeline;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use concord_core::PassSummary;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "concord-sync",
    version,
    about = "One-way convergence of assets and users across the directory, inventory and helpdesk"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Converge the helpdesk asset register on the inventory.
    Assets(SyncArgs),
    /// Converge helpdesk and inventory users on the directory.
    Users(SyncArgs),
    /// Run the asset pass, then the user passes.
    All(SyncArgs),
}

#[derive(Args, Clone, Copy)]
struct SyncArgs {
    /// Plan and log actions without applying any of them.
    #[arg(long)]
    dry_run: bool,

    /// Permit absence actions even when the authoritative snapshot is
    /// empty. Off by default so a failed source fetch can never empty
    /// a target.
    #[arg(long)]
    allow_teardown: bool,
}

fn report(summary: &PassSummary) {
    tracing::info!(
        system = summary.system,
        authoritative = summary.authoritative,
        target = summary.target,
        planned = summary.planned,
        created = summary.stats.created,
        updated = summary.stats.updated,
        disabled = summary.stats.disabled,
        removed = summary.stats.removed,
        failed = summary.stats.failed,
        dry_run = summary.dry_run,
        "pass complete"
    );
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });

    let mut summaries = Vec::new();
    let result = match cli.command {
        Command::Assets(args) => pipeline::sync_assets(&config, args.dry_run, args.allow_teardown)
            .await
            .map(|summary| summaries.push(summary)),
        Command::Users(args) => pipeline::sync_users(&config, args.dry_run, args.allow_teardown)
            .await
            .map(|passes| summaries.extend(passes)),
        Command::All(args) => {
            match pipeline::sync_assets(&config, args.dry_run, args.allow_teardown).await {
                Ok(summary) => {
                    summaries.push(summary);
                    pipeline::sync_users(&config, args.dry_run, args.allow_teardown)
                        .await
                        .map(|passes| summaries.extend(passes))
                }
                Err(e) => Err(e),
            }
        }
    };

    for summary in &summaries {
        report(summary);
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "pass aborted");
        eprintln!("Sync failed: {e}");
        std::process::exit(1);
    }

    let failed: usize = summaries.iter().map(|s| s.stats.failed).sum();
    if failed > 0 {
        tracing::warn!(failed, "some actions failed, see log for details");
        std::process::exit(2);
    }
}
