//! Sitesnap main entry point
//!
//! This is the command-line interface for building cached website snapshots.

use anyhow::{bail, Context};
use clap::Parser;
use sitesnap::config::{load_config_with_hash, resolve_resources, Config, ResolvedResource};
use sitesnap::crawler::{CommandRenderer, Crawler};
use sitesnap::{CacheManager, SnapshotStatus};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

/// Sitesnap: cached markdown snapshots of websites
///
/// Sitesnap crawls each configured website resource while respecting
/// robots.txt, converts its pages to markdown, and keeps the result in a
/// snapshot directory that is reused until its TTL expires.
#[derive(Parser, Debug)]
#[command(name = "sitesnap")]
#[command(version)]
#[command(about = "Cached markdown snapshots of websites", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Only load the named resource (repeatable)
    #[arg(short, long = "resource", value_name = "NAME")]
    resources: Vec<String>,

    /// Re-crawl even if the snapshot is still fresh
    #[arg(long)]
    force: bool,

    /// Validate config and show what would be loaded without crawling
    #[arg(long, conflicts_with = "force")]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let resources = select_resources(resolve_resources(&config)?, &cli.resources)?;
    if resources.is_empty() {
        bail!("No [[resource]] entries to load in {}", cli.config.display());
    }

    if cli.dry_run {
        handle_dry_run(&config, &resources);
        return Ok(());
    }

    handle_load(&config, resources, cli.force).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitesnap=info,warn"),
            1 => EnvFilter::new("sitesnap=debug,info"),
            2 => EnvFilter::new("sitesnap=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Keeps only the resources named on the command line (all if none named)
fn select_resources(resources: Vec<ResolvedResource>, names: &[String]) -> anyhow::Result<Vec<ResolvedResource>> {
    if names.is_empty() {
        return Ok(resources);
    }

    for name in names {
        if !resources.iter().any(|r| r.name.eq_ignore_ascii_case(name)) {
            bail!("Unknown resource '{}'", name);
        }
    }
    Ok(resources
        .into_iter()
        .filter(|r| names.iter().any(|n| r.name.eq_ignore_ascii_case(n)))
        .collect())
}

/// Handles the --dry-run mode: shows what would be loaded
fn handle_dry_run(config: &Config, resources: &[ResolvedResource]) {
    println!("=== Sitesnap Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Robots agent: {}", config.crawler.robots_agent);
    println!(
        "  Timeouts: robots {}s, sitemap {}s, page {}s",
        config.crawler.robots_timeout_secs, config.crawler.sitemap_timeout_secs, config.crawler.page_timeout_secs
    );
    println!("  Resources dir: {}", config.storage.resources_dir.display());
    if config.render.command.is_empty() {
        println!("  Render fallback: disabled");
    } else {
        println!("  Render fallback: {}", config.render.command.join(" "));
    }

    println!("\nResources ({}):", resources.len());
    for resource in resources {
        println!("  - {} [{}]", resource.name, resource.key);
        println!("    * url: {}", resource.target.start_url);
        println!(
            "    * max pages {}, max depth {}, ttl {}h",
            resource.target.max_pages, resource.target.max_depth, resource.target.ttl_hours
        );
    }

    println!("\n✓ Configuration is valid");
}

/// Loads every resource concurrently and prints where each snapshot lives
async fn handle_load(config: &Config, resources: Vec<ResolvedResource>, force: bool) -> anyhow::Result<()> {
    let mut crawler = Crawler::new(config.crawl_settings())?;
    if let Some(renderer) = CommandRenderer::from_command(&config.render.command) {
        tracing::info!("Render fallback enabled: {}", config.render.command.join(" "));
        crawler =
            crawler.with_renderer(Arc::new(renderer.with_timeout(Duration::from_secs(config.render.timeout_secs))));
    }
    let crawler = Arc::new(crawler);
    let manager = Arc::new(CacheManager::new(config.storage.resources_dir.clone(), Arc::clone(&crawler)));

    let total = resources.len();
    let mut tasks = JoinSet::new();
    for resource in resources {
        let manager = Arc::clone(&manager);
        tasks.spawn(async move {
            let result = manager.ensure_snapshot(&resource.key, &resource.target, force).await;
            (resource.name, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        let (name, result) = joined.context("Resource load task panicked")?;
        match result {
            Ok(handle) => {
                let status = match handle.status {
                    SnapshotStatus::Fresh => "fresh",
                    SnapshotStatus::Refreshed => "refreshed",
                    SnapshotStatus::Stale => "stale",
                };
                println!(
                    "{}\t{}\t{} pages\t{}",
                    name,
                    status,
                    handle.manifest.page_count,
                    handle.path.display()
                );
            }
            Err(e) => {
                failures += 1;
                tracing::error!("Failed to load resource '{}': {}", name, e);
            }
        }
    }

    crawler.close().await;

    if failures > 0 {
        bail!("{} of {} resources failed to load", failures, total);
    }
    Ok(())
}
