//! Search-Harvest main entry point
//!
//! This is the command-line interface for the Search-Harvest collector.

use anyhow::Context;
use clap::Parser;
use search_harvest::clock::SystemClock;
use search_harvest::config::{load_config, load_config_with_hash, Config};
use search_harvest::crawler::{harvest, Harvester};
use search_harvest::{HarvestError, HttpSearchClient, SearchClient};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Search-Harvest: an incremental collector for a rate-limited search API
///
/// Search-Harvest polls the search endpoint for records newer than the last
/// harvested one, appends them to a CSV log, and rotates that log into
/// monthly archives.
#[derive(Parser, Debug)]
#[command(name = "search-harvest")]
#[command(version)]
#[command(about = "An incremental collector for a rate-limited search API", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "harvest.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the first query without harvesting
    #[arg(long, conflicts_with_all = ["check_quota", "rotate"])]
    dry_run: bool,

    /// Query the remaining call budget once and exit
    #[arg(long, conflicts_with_all = ["dry_run", "rotate"])]
    check_quota: bool,

    /// Rotate the active log into the archive of its month and exit
    #[arg(long, conflicts_with_all = ["dry_run", "check_quota"])]
    rotate: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging destination comes from the config, so peek at it before setup
    let log_file = load_config(&cli.config)
        .ok()
        .and_then(|config| config.log.filename);
    if let Err(e) = setup_logging(cli.verbose, cli.quiet, log_file.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        std::process::exit(1);
    }

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(HarvestError::from(e).exit_code());
        }
    };

    // Handle different modes
    let result = if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.check_quota {
        handle_check_quota(&config).await
    } else if cli.rotate {
        handle_rotate(&config)
    } else {
        handle_harvest(config).await
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        let code = e
            .downcast_ref::<HarvestError>()
            .map(HarvestError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log file configured, output goes there without ANSI colors.
fn setup_logging(verbose: u8, quiet: bool, log_file: Option<&str>) -> std::io::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("search_harvest=info,warn"),
            1 => EnvFilter::new("search_harvest=debug,info"),
            2 => EnvFilter::new("search_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.init(),
    }

    Ok(())
}

/// Handles the --dry-run mode: validates config and shows the first query
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Search-Harvest Dry Run ===\n");

    println!("Search:");
    println!("  Base URL: {}", config.search.base_url);
    println!("  Base query: {}", config.search.base_query);
    println!("  Most recent id: {}", config.search.most_recent_id);
    println!("  Sleep interval: {}s", config.search.sleep_interval);
    println!("  Idle interval: {}s", config.search.idle_interval);

    println!("\nOutput:");
    println!("  Data file: {}", config.output.data_file);
    println!("  Archive directory: {}", config.output.data_dir);
    println!("  Rotation enabled: {}", config.output.rotation_enabled);
    println!("  UTC offset: {:+}h", config.output.utc_offset_hours);
    if let Some(path) = &config.output.checkpoint_path {
        println!("  Checkpoint: {}", path);
    }

    let harvester = build_harvester(config)?;
    let state = harvester.state();
    println!("\nCrawl state:");
    println!("  since_id: {}", state.cursor.since_id);
    println!("  Active period: {}", state.rotation.active_period);
    println!("  First query: {}", harvester.current_query());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --check-quota mode: probes the quota once
async fn handle_check_quota(config: &Config) -> anyhow::Result<()> {
    let client = HttpSearchClient::new(&config.search.base_url, &config.search.bearer_token)
        .map_err(HarvestError::from)?;

    let quota = client
        .check_quota()
        .await
        .map_err(HarvestError::from)
        .context("quota check failed")?;

    println!("Remaining calls: {}", quota.remaining);
    match quota.reset_at {
        Some(reset_at) => println!("Resets at: {}", reset_at.to_rfc3339()),
        None => println!("Resets at: unknown"),
    }

    Ok(())
}

/// Handles the --rotate mode: rotates the active log into the current month
fn handle_rotate(config: &Config) -> anyhow::Result<()> {
    let mut harvester = build_harvester(config)?;
    let next = harvester.current_period();

    match harvester.rotate_to(next)? {
        Some(report) => {
            println!("✓ Archived {} lines to {}", report.archived, report.archive_path.display());
            println!("  {} lines kept in {}", report.carried, config.output.data_file);
            println!("  Previous log kept in {}", report.backup_path.display());
            if report.dropped > 0 {
                println!("  {} lines matched neither month (kept in the backup only)", report.dropped);
            }
        }
        None => println!(
            "Nothing to rotate: active period is already {}",
            harvester.state().rotation.active_period
        ),
    }

    Ok(())
}

/// Handles the main harvest loop
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} into {}",
        config.search.base_query,
        config.output.data_file
    );

    harvest(config).await?;
    Ok(())
}

fn build_harvester(config: &Config) -> Result<Harvester<HttpSearchClient>, HarvestError> {
    let client = HttpSearchClient::new(&config.search.base_url, &config.search.bearer_token)?;
    Harvester::from_config(config, client, Arc::new(SystemClock))
}
