//! SlackPulse - weekly Slack activity digest
//!
//! A CLI tool that reads a workspace's channels, message history and
//! member directory over a trailing window, counts activity per member
//! and per channel, and posts a summary back to Slack.
//!
//! Exit codes:
//!   0 - Run completed (individual API failures are logged, not fatal)
//!   1 - Invalid arguments or configuration

mod analysis;
mod cli;
mod config;
mod digest;
mod models;
mod publisher;
mod report;
mod slack;
mod trend;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use digest::{Delivery, DigestSettings};
use publisher::PublishOutcome;
use slack::{SlackClient, SlackClientConfig};
use trend::TrendStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("SlackPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_digest(args).await {
        error!("Digest failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .slackpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", DEFAULT_CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the window, rankings and trend file.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run one digest. Only configuration problems are returned as errors.
async fn run_digest(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let client = SlackClient::new(SlackClientConfig {
        api_base: config.slack.api_base.clone(),
        token: args.token.clone().unwrap_or_default(),
        timeout_seconds: config.slack.timeout_seconds,
        page_size: config.slack.page_size,
    })?;

    let settings = DigestSettings::from_config(&config, Utc::now());
    let store = config
        .trend
        .enabled
        .then(|| TrendStore::new(config.trend.state_file.clone()));

    if !args.quiet {
        println!("📥 Collecting Slack activity for {}", settings.window.label());
        println!("   Window: {} days", config.digest.window_days);
        println!("   Channels: {:?}", settings.membership);
        match store {
            Some(ref store) => println!("   Trend file: {}", store.path().display()),
            None => println!("   Trend tracking: disabled"),
        }
    }

    let delivery = match args.channel.as_deref() {
        Some(destination) if !args.dry_run => Delivery::Post { destination },
        _ => Delivery::DryRun,
    };

    let run = digest::execute(&client, &settings, store.as_ref(), delivery, !args.quiet).await;

    if delivery == Delivery::DryRun {
        let output = match args.format {
            OutputFormat::Text => run.digest.text(),
            OutputFormat::Json => serde_json::to_string_pretty(&run.digest.summary())
                .context("Failed to serialize digest summary")?,
        };
        println!("{}", output);
        return Ok(());
    }

    let summary = run.digest.summary();
    if !args.quiet {
        println!("\n📊 Digest Summary:");
        println!("   Total messages: {}", summary.total_messages);
        println!("   Active members: {}", summary.active_members);
        if !summary.unreadable_channels.is_empty() {
            println!("   Unreadable channels: {}", summary.unreadable_channels.len());
        }
    }

    match run.published {
        Some(PublishOutcome::Posted { .. }) => {
            if !args.quiet {
                println!("\n✅ Report sent to Slack.");
            }
        }
        Some(PublishOutcome::Failed { ref reason }) => {
            eprintln!("\n⚠️  Report was not delivered: {}", reason);
        }
        None => {}
    }

    if store.is_some() && !run.trend_saved {
        warn!("Trend record was not updated this run");
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
