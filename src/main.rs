//! Bushel main entry point
//!
//! This is the command-line interface for the Bushel directory archiver.

use bushel::config::{load_config_with_hash, Config};
use bushel::crawler::crawl;
use bushel::output::{load_statistics, print_statistics, print_summary};
use bushel::storage::open_storage;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Bushel: archives Tor directory documents
///
/// Bushel starts from the current consensus, follows every reference to
/// server and extra-info descriptors, verifies each document's digest, and
/// stores every unique document once in a content-addressed archive.
#[derive(Parser, Debug)]
#[command(name = "bushel")]
#[command(version)]
#[command(about = "Reference-driven archiver for Tor directory documents", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the archive index and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bushel=info,warn"),
            1 => EnvFilter::new("bushel=debug,info"),
            2 => EnvFilter::new("bushel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Bushel Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrent fetches: {}", config.crawler.max_concurrent_fetches);
    println!("  Retry attempts: {}", config.crawler.max_retry_attempts);
    println!(
        "  Retry backoff: {}ms doubling, capped at {}ms",
        config.crawler.retry_backoff_base, config.crawler.retry_backoff_cap
    );
    match config.crawler.run_deadline {
        Some(secs) => println!("  Run deadline: {}s", secs),
        None => println!("  Run deadline: none"),
    }
    println!("  Drain cutoff: {}s", config.crawler.drain_cutoff);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nArchive:");
    println!("  Content store: {}", config.archive.root().display());
    println!("  Index: {}", config.archive.index_path().display());

    println!(
        "\nDirectory Endpoints ({}, timeout {}s):",
        config.directory.endpoints.len(),
        config.directory.timeout
    );
    for endpoint in &config.directory.endpoints {
        println!("  - {}", endpoint);
    }

    println!("\nVote Authorities ({}):", config.directory.authorities.len());
    for authority in &config.directory.authorities {
        println!("  - {}", authority);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the archive index
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let index_path = config.archive.index_path();
    println!("Index: {}\n", index_path.display());

    let storage = open_storage(&index_path)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Crawling via {} directory endpoints with {} workers",
        config.directory.endpoints.len(),
        config.crawler.max_concurrent_fetches
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight fetches");
                cancel.cancel();
            }
        });
    }

    match crawl(config, config_hash, cancel).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
