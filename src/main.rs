//! Folio Harvest main entry point
//!
//! This is the command-line interface for the Folio Harvest publication
//! harvester.

use anyhow::{bail, Context};
use clap::Parser;
use folio_harvest::config::{load_config_with_hash, Config, SourceConfig};
use folio_harvest::crawler::{CrawlOptions, Coordinator};
use folio_harvest::output::{
    generate_markdown_report, load_statistics, print_statistics, print_summary, CrawlSummary,
};
use folio_harvest::storage::SqliteStorage;
use folio_harvest::HarvestError;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

/// Folio Harvest: a configurable publication harvester
///
/// Walks the paginated listings of the configured sources, extracts article
/// fields through CSS selectors, enriches items from their own pages and
/// stores deduplicated content with an auditable session per run.
#[derive(Parser, Debug)]
#[command(name = "folio-harvest")]
#[command(version)]
#[command(about = "A configurable publication harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Crawl only this source id (repeatable; default: every source)
    #[arg(long = "source", value_name = "ID")]
    sources: Vec<String>,

    /// Stop each source after this many listing pages
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// Detail pages open at once
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=50))]
    concurrency: Option<u32>,

    /// Revisit items whose URL is already stored
    #[arg(long)]
    no_skip_existing: bool,

    /// Keep paginating when a whole page was already stored
    #[arg(long)]
    no_stop_on_duplicates: bool,

    /// Write a markdown run report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

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

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let sources = select_sources(&config, &cli.sources)?;

    if cli.dry_run {
        handle_dry_run(&config, &sources);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&cli, &config, config_hash, &sources).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("folio_harvest=info,warn"),
            1 => EnvFilter::new("folio_harvest=debug,info"),
            2 => EnvFilter::new("folio_harvest=trace,debug"),
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

/// Resolves `--source` ids; no ids selects every configured source
fn select_sources<'a>(config: &'a Config, ids: &[String]) -> Result<Vec<&'a SourceConfig>, HarvestError> {
    if ids.is_empty() {
        return Ok(config.sources.iter().collect());
    }
    ids.iter()
        .map(|id| {
            config
                .source(id)
                .ok_or_else(|| HarvestError::UnknownSource(id.clone()))
        })
        .collect()
}

fn build_options(cli: &Cli, config: &Config) -> CrawlOptions {
    let mut options = CrawlOptions::from_config(&config.crawler);
    if let Some(max_pages) = cli.max_pages {
        options.max_pages = Some(max_pages);
    }
    if let Some(concurrency) = cli.concurrency {
        options.content_concurrency = concurrency as usize;
    }
    if cli.no_skip_existing {
        options.skip_existing_urls = false;
    }
    if cli.no_stop_on_duplicates {
        options.stop_on_all_duplicates = false;
    }
    options
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, sources: &[&SourceConfig]) {
    println!("=== Folio Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Browser engine: {}", config.crawler.browser_engine);
    println!("  Content concurrency: {}", config.crawler.content_concurrency);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Skip existing URLs: {}", config.crawler.skip_existing_urls);
    println!(
        "  Stop on all duplicates: {}",
        config.crawler.stop_on_all_duplicates
    );

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Content: {}", config.output.content_dir);

    println!("\nSources ({}):", sources.len());
    for source in sources {
        println!("  - {} ({})", source.id, source.name);
        println!("    Listing: {}", source.listing_url);
        println!("    Container: {}", source.container_selector);
        let listing: Vec<&str> = source.listing_fields.keys().map(String::as_str).collect();
        println!("    Listing fields: {}", listing.join(", "));
        if source.has_detail_fields() {
            let detail: Vec<&str> = source.detail_fields.keys().map(String::as_str).collect();
            println!(
                "    Detail fields ({}): {}",
                source.detail_container(),
                detail.join(", ")
            );
        }
        match source.next_button_selector() {
            Some(selector) => println!("    Next button: {}", selector),
            None => println!("    Next button: none (single page)"),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    cli: &Cli,
    config: &Config,
    config_hash: String,
    sources: &[&SourceConfig],
) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::from_config(config, Some(config_hash))?;

    let shutdown = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight work");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let mut summaries: Vec<CrawlSummary> = Vec::with_capacity(sources.len());
    let mut failures = 0;

    for source in sources {
        if coordinator.shutdown_handle().load(Ordering::SeqCst) {
            tracing::info!("Skipping remaining sources after interrupt");
            break;
        }

        match coordinator.run(source, build_options(cli, config)).await {
            Ok(result) => {
                if !cli.quiet {
                    print_summary(&result.summary);
                }
                summaries.push(result.summary);
            }
            Err(e) => {
                tracing::error!("Crawl of '{}' failed: {}", source.id, e);
                failures += 1;
            }
        }
    }

    if let Some(path) = &cli.report {
        generate_markdown_report(&summaries, path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    coordinator.into_storage().close()?;

    if failures > 0 {
        bail!("{} of {} source(s) failed", failures, sources.len());
    }
    Ok(())
}
