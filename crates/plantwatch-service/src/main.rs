use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use plantwatch_client::DeviceClient;
use plantwatch_service::cleanup::CleanupTask;
use plantwatch_service::config::{
    Config, default_cleanup_marker_path, default_config_path, default_monitor_settings_path,
};
use plantwatch_service::coordinator::Coordinator;
use plantwatch_service::monitor::SensorMonitor;
use plantwatch_service::notify::{LogNotifier, Notifier};
use plantwatch_service::repository::Repository;
use plantwatch_store::{ReadingQuery, Store, summarize};
use plantwatch_types::Thresholds;

#[derive(Parser)]
#[command(name = "plantwatch")]
#[command(author, version, about = "Plant environment monitor", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device base URL, overriding the configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Database file path, overriding the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the polling service until interrupted
    Run,

    /// Fetch and print the current reading
    Read {
        /// Also persist the reading
        #[arg(short, long)]
        save: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print stored readings
    History {
        /// Only readings from the last N hours
        #[arg(long)]
        hours: Option<u64>,

        /// Maximum number of readings (0 for all)
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Export stored readings to a CSV file
    Export {
        /// File name stem for the export
        #[arg(long, default_value = "plant_data")]
        stem: String,
    },

    /// Delete stored readings
    Purge {
        /// Delete readings older than N days
        #[arg(long, conflicts_with_all = ["all", "duplicates"])]
        older_than_days: Option<u32>,

        /// Delete everything
        #[arg(long)]
        all: bool,

        /// Delete duplicate rows only
        #[arg(long)]
        duplicates: bool,
    },

    /// Print storage statistics
    Stats {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Push new alert thresholds to the device
    SetThreshold {
        /// Temperature threshold in °C (alert above)
        #[arg(long)]
        temperature: i32,

        /// Light threshold (alert below)
        #[arg(long)]
        light: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(base_url) = &cli.base_url {
        config.device.base_url = base_url.clone();
    }
    if let Some(database) = &cli.database {
        config.storage.path = database.clone();
    }
    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Run => run_service(&config).await,
        Commands::Read { save, format } => read_once(&config, save, &format).await,
        Commands::History {
            hours,
            limit,
            format,
        } => print_history(&config, hours, limit, &format).await,
        Commands::Export { stem } => export(&config, &stem).await,
        Commands::Purge {
            older_than_days,
            all,
            duplicates,
        } => purge(&config, older_than_days, all, duplicates).await,
        Commands::Stats { format } => print_stats(&config, &format).await,
        Commands::SetThreshold { temperature, light } => {
            set_threshold(&config, temperature, light).await
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Config::load_default().with_context(|| {
            format!(
                "failed to load configuration from {}",
                default_config_path().display()
            )
        }),
    }
}

fn build_repository(config: &Config) -> Result<Arc<Repository>> {
    let client = DeviceClient::new(&config.device.base_url)?;
    let store = Store::open(&config.storage.path)
        .with_context(|| format!("failed to open database {}", config.storage.path.display()))?;
    Ok(Arc::new(Repository::new(
        Box::new(client),
        store,
        config.storage.export_dir.clone(),
    )))
}

fn build_notifier() -> Box<dyn Notifier> {
    #[cfg(feature = "notifications")]
    {
        Box::new(plantwatch_service::notify::DesktopNotifier)
    }
    #[cfg(not(feature = "notifications"))]
    {
        Box::new(LogNotifier)
    }
}

async fn run_service(config: &Config) -> Result<()> {
    let repository = build_repository(config)?;
    let monitor = SensorMonitor::with_settings_file(
        build_notifier(),
        default_monitor_settings_path(),
    );
    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&repository),
        Arc::new(Mutex::new(monitor)),
        config.polling.clone(),
    ));
    let cleanup = Arc::new(CleanupTask::new(
        Arc::clone(&repository),
        config.cleanup.clone(),
        default_cleanup_marker_path(),
    ));

    coordinator.start();
    cleanup.start();
    tracing::info!(
        base_url = %config.device.base_url,
        interval_secs = config.polling.update_interval_secs,
        "plantwatch running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    coordinator.stop();
    cleanup.stop();
    tracing::info!("shutting down");
    Ok(())
}

async fn read_once(config: &Config, save: bool, format: &str) -> Result<()> {
    let repository = build_repository(config)?;

    let reading = if save {
        repository.fetch_and_persist().await?
    } else {
        repository.fetch_only().await?
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&reading)?),
        _ => {
            println!("Temperature: {:.1} °C", reading.temperature);
            println!("Humidity:    {:.1} %", reading.humidity);
            println!("Light:       {}", reading.light);
            println!("Soil:        {}", reading.soil);
        }
    }
    Ok(())
}

async fn print_history(
    config: &Config,
    hours: Option<u64>,
    limit: u32,
    format: &str,
) -> Result<()> {
    let repository = build_repository(config)?;

    let mut query = ReadingQuery::new();
    if let Some(hours) = hours {
        query = query.since(OffsetDateTime::now_utc() - Duration::hours(hours as i64));
    }
    if limit > 0 {
        query = query.limit(limit);
    }

    let readings = repository.history(&query).await?;
    if readings.is_empty() {
        println!("No stored readings.");
        return Ok(());
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&readings)?),
        _ => {
            for r in &readings {
                println!(
                    "{}  {:.1} °C  {:.1} %  light {}  soil {}",
                    r.timestamp, r.temperature, r.humidity, r.light, r.soil
                );
            }
            println!("{} readings", readings.len());
        }
    }
    Ok(())
}

async fn export(config: &Config, stem: &str) -> Result<()> {
    let repository = build_repository(config)?;

    let readings = repository.history(&ReadingQuery::new().oldest_first()).await?;
    let summary = summarize(&readings);
    let path = repository.export(stem).await?;

    println!("Exported {} readings to {}", summary.total_records, path.display());
    println!("Range: {}", summary.date_range);
    Ok(())
}

async fn purge(
    config: &Config,
    older_than_days: Option<u32>,
    all: bool,
    duplicates: bool,
) -> Result<()> {
    let repository = build_repository(config)?;

    let removed = if let Some(days) = older_than_days {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(i64::from(days));
        repository.purge_older_than(cutoff).await?
    } else if all {
        repository.purge_all().await?
    } else if duplicates {
        repository.dedupe().await?
    } else {
        bail!("specify --older-than-days, --all or --duplicates");
    };

    println!("Removed {} readings", removed);
    Ok(())
}

async fn print_stats(config: &Config, format: &str) -> Result<()> {
    let repository = build_repository(config)?;
    let stats = repository.statistics().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => {
            println!("Readings:   {}", stats.total);
            match (&stats.oldest, &stats.newest) {
                (Some(oldest), Some(newest)) => {
                    println!("Oldest:     {}", oldest);
                    println!("Newest:     {}", newest);
                }
                _ => println!("Range:      (empty)"),
            }
            println!("Duplicates: {}", stats.duplicates);
        }
    }
    Ok(())
}

async fn set_threshold(config: &Config, temperature: i32, light: i32) -> Result<()> {
    let repository = build_repository(config)?;

    repository
        .push_thresholds(temperature, light)
        .await
        .context("device rejected the new thresholds")?;

    // Mirror to the local monitor settings so the service picks them up
    // on its next start.
    let mut monitor = SensorMonitor::with_settings_file(
        Box::new(LogNotifier),
        default_monitor_settings_path(),
    );
    monitor.set_thresholds(Thresholds { temperature, light });

    println!("Thresholds set: temperature > {temperature} °C, light < {light}");
    Ok(())
}
