//! CLI tool for dispatching due publications
//!
//! This binary can be invoked by cron to publish everything whose scheduled
//! time has passed.
//!
//! Usage:
//!   dispatch-publications [--config <path>] [--dry-run] [--verbose]
//!
//! Options:
//!   --config      Path to configuration file (default: search path)
//!   --dry-run     List due publications without claiming them
//!   --verbose     Enable verbose output
//!
//! Example cron entry (run every minute):
//!   * * * * * /usr/local/bin/dispatch-publications --config /etc/campaign-hub/config.yaml

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use campaign_hub::{
    db,
    services::{audit, build_publisher, PublicationDispatcher},
    utils::init_logging,
    AppConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut dry_run = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("--config requires a path");
                    std::process::exit(2);
                }
            }
            "--dry-run" => {
                dry_run = true;
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = AppConfig::load_from(config_path).context("Failed to load configuration")?;
    let _log_guard = init_logging(&config.logging, verbose.then_some("debug"));

    info!("Campaign Hub - Publication Dispatcher");

    let pool = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    match audit::flush(&pool).await {
        Ok(0) => {}
        Ok(n) => info!("Flushed {} orphaned audit records", n),
        Err(e) => warn!("Failed to flush orphaned audit records: {:#}", e),
    }

    let publisher = build_publisher(&config).context("Failed to configure publisher")?;
    let dispatcher = PublicationDispatcher::new(pool, publisher.clone(), config.dispatcher.clone());
    let now = Utc::now();

    if dry_run {
        info!("Dry run mode - showing what would be dispatched");
        let due = dispatcher.list_due(now).await?;
        if due.is_empty() {
            println!("No publications due");
        } else {
            println!("Publications due ({}):", due.len());
            for publication in due {
                println!(
                    "  - {} (account: {}, scheduled: {})",
                    publication.id,
                    publication.social_account_id,
                    publication
                        .scheduled_at
                        .map(|at| at.to_rfc3339())
                        .unwrap_or_default()
                );
            }
        }
        return Ok(());
    }

    info!("Dispatching due publications via {}", publisher.name());
    let result = dispatcher.dispatch_due(now).await?;

    if result.claimed == 0 && result.recovered_stale == 0 {
        info!("No publications were due");
    } else {
        info!(
            "Processed {} publications: {} published, {} failed, {} stale claims failed in {}ms",
            result.claimed,
            result.published,
            result.failed,
            result.recovered_stale,
            result.duration_ms
        );

        for outcome in &result.outcomes {
            match outcome.error {
                None => info!(
                    "  [OK] Publication {} ({})",
                    outcome.publication_id,
                    outcome.external_post_id.as_deref().unwrap_or("-")
                ),
                Some(ref e) => error!("  [FAIL] Publication {}: {}", outcome.publication_id, e),
            }
        }
    }

    if result.lost_claims > 0 {
        warn!("{} claims were lost to another dispatcher", result.lost_claims);
    }
    if result.record_errors > 0 {
        error!(
            "{} outcomes could not be recorded and remain in publishing",
            result.record_errors
        );
    }

    if result.has_failures() {
        drop(_log_guard);
        std::process::exit(1);
    }

    Ok(())
}

fn print_help() {
    println!("Campaign Hub - Publication Dispatcher");
    println!();
    println!("Usage:");
    println!("  dispatch-publications [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <path>       Path to configuration file");
    println!("  --dry-run             List due publications without claiming them");
    println!("  -v, --verbose         Enable verbose output");
    println!("  -h, --help            Show this help message");
    println!();
    println!("Example cron entries:");
    println!("  # Run every minute");
    println!(
        "  * * * * * /usr/local/bin/dispatch-publications --config /etc/campaign-hub/config.yaml"
    );
    println!();
    println!("  # Run every 5 minutes");
    println!("  */5 * * * * /usr/local/bin/dispatch-publications --config /etc/campaign-hub/config.yaml");
}
