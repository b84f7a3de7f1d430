//! Tidewalk main entry point
//!
//! This is the command-line interface for the Tidewalk bounded-domain crawler.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tidewalk::config::{content_hash, load_config_with_hash, validate, Config, OutputFormat};
use tidewalk::output::{
    load_latest_statistics, print_report, print_statistics, write_markdown_summary, CrawlReport,
    FsSink, Sink,
};
use tidewalk::storage::{open_storage, record_report, SqliteSink, SqliteStorage, Storage};
use tidewalk::CrawlEngine;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Tidewalk: a bounded-domain web crawler
///
/// Tidewalk fetches every reachable page on the origin of a seed URL,
/// downloads same-origin assets, records external references and saves
/// everything with a navigable index.
#[derive(Parser, Debug)]
#[command(name = "tidewalk")]
#[command(version)]
#[command(about = "A bounded-domain web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seed URL; overrides the configuration file
    #[arg(long)]
    seed: Option<String>,

    /// Ignore robots.txt (unsafe; only for sites you control)
    #[arg(long)]
    bypass_robots: bool,

    /// Output directory for the files sink; overrides the configuration file
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics for the latest run in the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_effective_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    let code = handle_crawl(config, &config_hash).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidewalk=info,warn"),
            1 => EnvFilter::new("tidewalk=debug,info"),
            2 => EnvFilter::new("tidewalk=trace,debug"),
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

/// Loads the configuration file (if any), applies CLI overrides and validates
fn load_effective_config(cli: &Cli) -> anyhow::Result<(Config, String)> {
    let (mut config, hash) = match (&cli.config, &cli.seed) {
        (Some(path), _) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        (None, Some(seed)) => (Config::with_seed(seed.clone()), content_hash(seed)),
        (None, None) => bail!("Either a configuration file or --seed is required"),
    };

    if let Some(seed) = &cli.seed {
        config.seed = seed.clone();
    }
    if cli.bypass_robots {
        config.robots.bypass = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }

    validate(&config).context("Invalid configuration")?;
    Ok((config, hash))
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Tidewalk Dry Run ===\n");

    println!("Seed: {}", config.seed);

    println!("\nCrawler Configuration:");
    println!("  Batch size: {}", config.crawler.batch_size);
    println!("  Workers: {}", config.crawler.effective_workers());
    println!("  Delay between fetches: {}ms", config.crawler.delay_ms);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!(
        "  Render attempts: {} (backoff {}ms)",
        config.crawler.max_render_attempts, config.crawler.render_backoff_ms
    );
    match config.crawler.max_pages {
        0 => println!("  Max pages: unbounded"),
        n => println!("  Max pages: {}", n),
    }

    println!("\nScope:");
    println!("  Asset extensions: {}", config.scope.asset_extensions.join(", "));
    if config.scope.follow_external {
        println!(
            "  External pages: followed (up to {})",
            config.scope.max_external_pages
        );
    } else {
        println!("  External pages: recorded only");
    }

    println!("\nRobots:");
    println!("  User agent: {}", config.robots.user_agent);
    println!(
        "  robots.txt: {}",
        if config.robots.bypass { "BYPASSED" } else { "respected" }
    );

    println!("\nOutput:");
    match config.output.format {
        OutputFormat::Files => println!("  Directory: {}", config.output.directory.display()),
        OutputFormat::Sqlite => println!("  Database: {}", config.output.database_path.display()),
    }
    if let Some(path) = &config.output.summary_path {
        println!("  Summary: {}", path.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics for the latest stored run
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path.display());

    let storage = open_storage(&config.output.database_path)?;
    println!("Runs recorded: {}\n", storage.list_runs()?.len());
    match load_latest_statistics(&storage)? {
        Some(stats) => print_statistics(&stats),
        None => println!("No runs recorded yet."),
    }

    Ok(())
}

/// Handles the main crawl operation and returns the process exit code
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<i32> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let (sink, history): (Arc<dyn Sink>, Option<(Arc<Mutex<SqliteStorage>>, i64)>) =
        match config.output.format {
            OutputFormat::Files => (Arc::new(FsSink::new(&config.output.directory)), None),
            OutputFormat::Sqlite => {
                let mut storage = open_storage(&config.output.database_path)?;
                let run_id = storage.create_run(&config.seed, config_hash)?;
                tracing::info!("Recording run {} in {}", run_id, config.output.database_path.display());

                let storage = Arc::new(Mutex::new(storage));
                (
                    Arc::new(SqliteSink::new(storage.clone(), run_id)),
                    Some((storage, run_id)),
                )
            }
        };

    let engine = CrawlEngine::from_config(&config, sink)?;
    let report = match engine.run(cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            if let Some((storage, run_id)) = &history {
                let mut storage = storage.lock().unwrap_or_else(|p| p.into_inner());
                if let Err(mark_err) = storage.mark_failed(*run_id, &e.to_string()) {
                    tracing::warn!("Could not mark run {} as failed: {}", run_id, mark_err);
                }
            }
            return Err(e.into());
        }
    };

    if let Some((storage, run_id)) = &history {
        let mut storage = storage.lock().unwrap_or_else(|p| p.into_inner());
        record_report(&mut *storage, *run_id, &report)?;
    }

    write_summary(&config, &report).await?;
    print_report(&report);

    Ok(report.outcome.exit_code())
}

/// Cancels the run on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            cancel.cancel();
        }
    });
}

async fn write_summary(config: &Config, report: &CrawlReport) -> anyhow::Result<()> {
    if let Some(path) = &config.output.summary_path {
        write_markdown_summary(report, path)
            .await
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        println!("✓ Summary written to: {}", path.display());
    }
    Ok(())
}
