use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use jobsift_adapters::AdapterRegistry;
use jobsift_core::Tier;
use jobsift_sync::{recent_history, SyncConfig, SyncPipeline};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Parser)]
#[command(name = "jobsift")]
#[command(about = "Collect fresh entry-level US job postings into per-tier CSV stores")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape, filter and append new postings (default).
    Run(RunArgs),
    /// Show recent per-tier run counts.
    History(HistoryArgs),
    /// List the ATS tags that have an adapter.
    Adapters,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Run a single tier, e.g. `2` or `"Tier 2"`.
    #[arg(long)]
    tier: Option<Tier>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Skip the apply-link liveness probe.
    #[arg(long)]
    no_verify_links: bool,
    /// Companies scraped in parallel within a tier.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Print the run summary as JSON on stdout instead of per-tier lines.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    #[arg(long)]
    tier: Option<Tier>,
    #[arg(long, default_value_t = 20)]
    limit: usize,
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(env_filter);
    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let mut config = SyncConfig::from_env();
            if let Some(dir) = args.data_dir {
                config.data_dir = dir;
            }
            if args.no_verify_links {
                config.verify_apply_links = false;
            }
            if let Some(concurrency) = args.concurrency {
                config.concurrency = concurrency;
            }

            let summary = SyncPipeline::new(config)?.run_once(args.tier).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                if !summary.is_success() {
                    return Ok(ExitCode::FAILURE);
                }
                return Ok(ExitCode::SUCCESS);
            }
            for stats in &summary.tiers {
                println!(
                    "{}: scraped={} accepted={} added={} duplicates={} failed={} skipped={}",
                    stats.tier,
                    stats.scraped,
                    stats.accepted,
                    stats.added,
                    stats.duplicates,
                    stats.failed_companies,
                    stats.skipped_companies
                );
            }
            for failure in &summary.failed_tiers {
                eprintln!("{}: FAILED: {}", failure.tier, failure.error);
            }
            println!("run complete: run_id={}", summary.run_id);
            if !summary.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::History(args) => {
            let mut config = SyncConfig::from_env();
            if let Some(dir) = args.data_dir {
                config.data_dir = dir;
            }
            let rows = recent_history(&config, args.tier, args.limit).await?;
            if rows.is_empty() {
                eprintln!("no runs recorded in {}", config.data_dir.display());
            }
            for row in rows {
                println!(
                    "{}  {}  scraped={} accepted={} added={}",
                    row.timestamp, row.tier, row.scraped, row.accepted, row.added
                );
            }
        }
        Commands::Adapters => {
            for tag in AdapterRegistry::builtin().tags() {
                println!("{tag}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_is_the_default_and_accepts_json() {
        let cli = Cli::try_parse_from(["jobsift", "run", "--tier", "2", "--json"]).expect("parse");
        match cli.command {
            Some(Commands::Run(args)) => {
                assert!(args.json);
                assert_eq!(args.tier, Some(Tier(2)));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        let cli = Cli::try_parse_from(["jobsift"]).expect("parse");
        assert!(cli.command.is_none());
    }
}
