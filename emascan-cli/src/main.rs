//! EmaScan CLI: NSE EMA breakout scanner.
//!
//! Commands:
//! - `run`: one scan cycle now (`--manual` announces completion)
//! - `schedule`: run a cycle every trading day at the configured time
//! - `monitor`: check open trades against today's prices only
//! - `universe`: print the instruments a cycle would scan

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use emascan_core::config::{ScannerConfig, UniverseSource};
use emascan_core::data::{
    CircuitBreaker, FileUniverse, Nifty500Universe, NseProvider, PriceSource, UniverseProvider,
};
use emascan_core::notify::{announce, LogNotifier, Notifier, TelegramNotifier};
use emascan_core::store::SignalTable;
use emascan_runner::{
    init_tracing, manual_completion_message, run_scheduled, scheduled_message, CycleDriver,
    DailySchedule,
};

const DEFAULT_CONFIG: &str = "emascan.toml";

#[derive(Parser)]
#[command(name = "emascan", about = "EmaScan: NSE EMA breakout scanner")]
struct Cli {
    /// Path to a TOML config file. Defaults to ./emascan.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan cycle now.
    Run {
        /// Announce completion on the notification channel.
        #[arg(long, default_value_t = false)]
        manual: bool,
    },
    /// Run a scan cycle every day at the configured time.
    Schedule,
    /// Check open trades without scanning.
    Monitor,
    /// Print the instrument universe.
    Universe,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let _log_guard = init_tracing(&config.logging)?;

    let driver = build_driver(&config)?;
    match cli.command {
        Commands::Run { manual } => run_cycle_cmd(&driver, &config, manual),
        Commands::Schedule => run_schedule_cmd(&driver, &config),
        Commands::Monitor => run_monitor_cmd(&driver, &config),
        Commands::Universe => {
            for symbol in driver.instruments()? {
                println!("{symbol}");
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScannerConfig> {
    let mut config = match path {
        Some(path) => ScannerConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            ScannerConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("loading config {DEFAULT_CONFIG}"))?
        }
        None => ScannerConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_driver(config: &ScannerConfig) -> Result<CycleDriver> {
    let timeout = config.scan.fetch_timeout();

    let universe: Arc<dyn UniverseProvider> = match config.universe.source {
        UniverseSource::Nifty500 => Arc::new(Nifty500Universe::new(timeout)?),
        UniverseSource::File => {
            let path = config
                .universe
                .path
                .clone()
                .context("universe.path is required for a file universe")?;
            Arc::new(FileUniverse::new(path))
        }
    };

    let breaker = Arc::new(CircuitBreaker::default_provider());
    let source: Arc<dyn PriceSource> =
        Arc::new(NseProvider::new(breaker, timeout, config.scan.max_retries)?);

    let notifier: Arc<dyn Notifier> = match config.telegram.credentials() {
        Some((token, chat_id)) => Arc::new(TelegramNotifier::new(token, chat_id, timeout)?),
        None => {
            tracing::warn!("telegram credentials not set; announcements go to the log");
            Arc::new(LogNotifier)
        }
    };

    Ok(CycleDriver::new(
        universe,
        source,
        notifier,
        config.strategy.clone(),
        config.scan.clone(),
        SignalTable::new(&config.tables.signal_log),
        SignalTable::new(&config.tables.open_trades),
    ))
}

/// Current wall-clock time in the exchange zone.
fn exchange_now(config: &ScannerConfig) -> Result<NaiveDateTime> {
    let tz = config.schedule.tz()?;
    Ok(Utc::now().with_timezone(&tz).naive_local())
}

fn run_cycle_cmd(driver: &CycleDriver, config: &ScannerConfig, manual: bool) -> Result<()> {
    let report = driver
        .run_cycle(exchange_now(config)?, None)
        .context("scan cycle failed")?;

    println!(
        "Scanned {} instruments ({} failed): {} signals, {} trades resolved, {} open",
        report.instruments_total,
        report.instruments_failed,
        report.signals.len(),
        report.resolutions.len(),
        report.retained,
    );
    if manual {
        announce(
            driver.notifier(),
            &manual_completion_message(driver.params().ema_short),
        );
    }
    Ok(())
}

fn run_schedule_cmd(driver: &CycleDriver, config: &ScannerConfig) -> Result<()> {
    let schedule = DailySchedule::from_config(&config.schedule)?;
    let instruments = driver
        .instruments()
        .context("universe check failed at startup")?;
    tracing::info!(
        instruments = instruments.len(),
        time = %config.schedule.time,
        timezone = %config.schedule.timezone,
        "scheduler starting"
    );
    announce(
        driver.notifier(),
        &scheduled_message(driver.params().ema_short),
    );

    let cancel = AtomicBool::new(false);
    run_scheduled(driver, &schedule, config.schedule.poll_interval(), &cancel);
    Ok(())
}

fn run_monitor_cmd(driver: &CycleDriver, config: &ScannerConfig) -> Result<()> {
    let report = driver
        .run_monitor(exchange_now(config)?)
        .context("monitor pass failed")?;
    println!(
        "Checked {} trades: {} resolved, {} open ({} without a price today)",
        report.checked,
        report.resolutions.len(),
        report.retained,
        report.unpriced,
    );
    Ok(())
}
