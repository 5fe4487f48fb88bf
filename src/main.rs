//! DocScoop main entry point
//!
//! This is the command-line interface for the DocScoop document harvester.

use anyhow::Context;
use clap::Parser;
use docscoop::classify::GeminiClassifier;
use docscoop::config::{load_config_with_hash, validate, validate_seed, Config};
use docscoop::crawler::DocumentRules;
use docscoop::extract::BuiltinExtractor;
use docscoop::harvest::{HarvestSettings, Harvester};
use docscoop::identity::{launch_tor, IdentityProvider, TorIdentityProvider};
use docscoop::output::{self, CsvSink, MarkdownSink, ReportSink, SqliteSink};
use docscoop::transport::{ClientOptions, ReqwestFetch, RetryPolicy, Transport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// DocScoop: find sensitive documents exposed on a website
///
/// DocScoop crawls a site from the given URL, downloads every linked
/// document, extracts its text and asks a language model whether the
/// content looks sensitive. Traffic can be routed through Tor.
#[derive(Parser, Debug)]
#[command(name = "docscoop")]
#[command(version)]
#[command(about = "Harvest and classify documents exposed on a website", long_about = None)]
struct Cli {
    /// Seed URL; its host bounds the crawl
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum link depth from the seed
    #[arg(short, long, value_name = "N")]
    depth: Option<u32>,

    /// Per-request timeout for pages and documents
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Write one CSV row per document
    #[arg(short, long, value_name = "CSV")]
    output: Option<PathBuf>,

    /// Write a markdown summary
    #[arg(long, value_name = "MD")]
    summary: Option<PathBuf>,

    /// Record the run in a SQLite database
    #[arg(long, value_name = "DB")]
    database: Option<PathBuf>,

    /// Extra document extensions to harvest
    #[arg(long, value_name = "EXT", value_delimiter = ',')]
    include_ext: Vec<String>,

    /// Extensions to skip
    #[arg(long, value_name = "EXT", value_delimiter = ',')]
    exclude_ext: Vec<String>,

    /// Tasks in flight at once
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Attempts per request
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Stop queueing pages after this many
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Stop fetching new pages after this long
    #[arg(long, value_name = "SECS")]
    max_duration: Option<u64>,

    /// Route all traffic through Tor
    #[arg(short, long)]
    anonymous: bool,

    /// Start a private tor process (implies --anonymous)
    #[arg(short, long)]
    launch_tor: bool,

    /// Tor SOCKS port
    #[arg(long, value_name = "N")]
    tor_port: Option<u16>,

    /// Tor control port
    #[arg(long, value_name = "N")]
    control_port: Option<u16>,

    /// Increase logging verbosity (-v, -vv, -vvv); -v also prints rationales
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors and skip the console summary
    #[arg(short, long, conflicts_with = "verbose")]
    silent: bool,

    /// Validate the configuration and show the plan without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.silent);

    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, silent: bool) {
    let filter = if silent {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docscoop=info,warn"),
            1 => EnvFilter::new("docscoop=debug,info"),
            2 => EnvFilter::new("docscoop=trace,debug"),
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let seed = validate_seed(&cli.url)?;

    // Load and validate configuration
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("cannot load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };
    apply_overrides(&mut config, &cli);
    validate(&config)?;

    if cli.dry_run {
        print_dry_run(&config, &seed);
        return Ok(());
    }

    let classifier = GeminiClassifier::from_env(&config.classifier)
        .context("the classifier needs an API key")?;

    let options = ClientOptions::from_config(&config.crawler);

    let tor_process = if config.anonymity.launch {
        tracing::info!("Launching tor ({})", config.anonymity.tor_binary);
        Some(launch_tor(&config.anonymity).await?)
    } else {
        None
    };

    let identity: Option<Arc<dyn IdentityProvider>> = if config.anonymity.enabled {
        let provider = TorIdentityProvider::connect(&config.anonymity, options.clone())
            .await
            .context("anonymity was requested but Tor is not usable")?;
        Some(Arc::new(provider))
    } else {
        tracing::warn!("Anonymity is off; requests go out directly");
        None
    };

    let transport = Transport::new(
        Arc::new(ReqwestFetch::new(&options)?),
        identity,
        RetryPolicy::new(config.crawler.max_retries, config.crawler.retry_backoff()),
        config.crawler.max_body_bytes,
    );

    let harvester = Harvester::new(
        HarvestSettings::from_config(&config.crawler),
        DocumentRules::from_config(&config.documents),
        Arc::new(transport),
        Arc::new(BuiltinExtractor::from_config(&config.extraction)),
        Arc::new(classifier),
    );

    let report = harvester.run(&seed).await;

    if let Some(process) = tor_process {
        process.shutdown().await;
    }

    let sinks = build_sinks(&config, config_hash);
    let failed = output::write_all(&report, &sinks);
    if failed > 0 {
        tracing::warn!("{} of {} outputs could not be written", failed, sinks.len());
    }

    if !cli.silent {
        output::print_summary(&report, cli.verbose > 0);
    }

    Ok(())
}

/// Applies command-line flags on top of the file configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(timeout) = cli.timeout {
        config.crawler.page_timeout_secs = timeout;
        config.crawler.document_timeout_secs = timeout;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(retries) = cli.max_retries {
        config.crawler.max_retries = retries;
    }
    if cli.max_pages.is_some() {
        config.crawler.max_pages = cli.max_pages;
    }
    if cli.max_duration.is_some() {
        config.crawler.max_duration_secs = cli.max_duration;
    }

    config.documents.include_extensions(&cli.include_ext);
    config.documents.exclude_extensions(&cli.exclude_ext);

    if cli.anonymous || cli.launch_tor {
        config.anonymity.enabled = true;
    }
    if cli.launch_tor {
        config.anonymity.launch = true;
    }
    if let Some(port) = cli.tor_port {
        config.anonymity.socks_endpoint = with_port(&config.anonymity.socks_endpoint, port);
    }
    if let Some(port) = cli.control_port {
        config.anonymity.control_endpoint = with_port(&config.anonymity.control_endpoint, port);
    }

    if cli.output.is_some() {
        config.output.csv_path = cli.output.clone();
    }
    if cli.summary.is_some() {
        config.output.summary_path = cli.summary.clone();
    }
    if cli.database.is_some() {
        config.output.database_path = cli.database.clone();
    }
}

/// Replaces the port of a host:port endpoint
fn with_port(endpoint: &str, port: u16) -> String {
    let host = endpoint
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(endpoint);
    format!("{}:{}", host, port)
}

fn build_sinks(config: &Config, config_hash: Option<String>) -> Vec<Box<dyn ReportSink>> {
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if let Some(path) = &config.output.csv_path {
        sinks.push(Box::new(CsvSink::new(path)));
    }
    if let Some(path) = &config.output.summary_path {
        sinks.push(Box::new(MarkdownSink::new(path, config_hash.clone())));
    }
    if let Some(path) = &config.output.database_path {
        sinks.push(Box::new(SqliteSink::new(path, config_hash)));
    }
    sinks
}

/// Handles the --dry-run mode: shows what would be crawled
fn print_dry_run(config: &Config, seed: &url::Url) {
    println!("=== DocScoop Dry Run ===\n");

    println!("Seed: {}", seed);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!(
        "  Timeouts: {}s pages, {}s documents",
        config.crawler.page_timeout_secs, config.crawler.document_timeout_secs
    );
    println!("  Max retries: {}", config.crawler.max_retries);
    if let Some(pages) = config.crawler.max_pages {
        println!("  Max pages: {}", pages);
    }
    if let Some(secs) = config.crawler.max_duration_secs {
        println!("  Max duration: {}s", secs);
    }

    println!("\nDocuments:");
    println!(
        "  Include: {}",
        config.documents.include.iter().cloned().collect::<Vec<_>>().join(", ")
    );
    println!(
        "  Exclude: {}",
        config.documents.exclude.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    println!("\nAnonymity:");
    if config.anonymity.enabled {
        println!("  Tor SOCKS: {}", config.anonymity.socks_endpoint);
        println!("  Tor control: {}", config.anonymity.control_endpoint);
        println!("  Launch tor: {}", config.anonymity.launch);
    } else {
        println!("  Off (direct connections)");
    }

    println!("\nClassifier:");
    println!("  Model: {}", config.classifier.model);
    println!(
        "  API key ({}): {}",
        config.classifier.api_key_env,
        if std::env::var_os(&config.classifier.api_key_env).is_some() {
            "set"
        } else {
            "MISSING"
        }
    );

    println!("\nOutput:");
    let show = |path: &Option<PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!("  CSV: {}", show(&config.output.csv_path));
    println!("  Summary: {}", show(&config.output.summary_path));
    println!("  Database: {}", show(&config.output.database_path));

    println!("\n✓ Configuration is valid");
}
