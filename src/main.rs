use anyhow::{Context, Result};
use chrono::Local;
use file_shifter::models::DEFAULT_CONFIG_FILE;
use file_shifter::{resolve_triggers, Config, CopyEngine, DailyLog, Platform, Scheduler, Trigger};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    initialize_logging()?;
    // Installed before the first cycle so an early interrupt still exits cleanly
    let signals = ShutdownSignals::install()?;
    load_environment_variables();

    let log = DailyLog::in_working_directory()?;
    fs::create_dir_all(log.directory())
        .with_context(|| format!("Failed to create log directory: {:?}", log.directory()))?;

    run_daemon(log, signals).await;
    Ok(())
}

/// Initialize console logging; `RUST_LOG` overrides the default `info`
fn initialize_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Load a `.env` file so its variables can be referenced from `source_folders`
fn load_environment_variables() {
    if dotenvy::dotenv().is_err() {
        info!("No .env file found, using system environment variables");
    }
}

async fn run_daemon(log: DailyLog, signals: ShutdownSignals) {
    info!("Starting file shifter");
    log.record(&["Service started...".to_string()]);

    let platform = Platform::current();
    let config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let engine = CopyEngine::new(log.clone());

    run_cycle(engine.clone(), config_path.clone(), platform, None).await;

    // Schedule flags are read once per process start
    let triggers = match Config::load(&config_path, platform) {
        Ok(config) => resolve_triggers(&config.schedule),
        Err(e) => {
            warn!("Could not read schedule from config ({}), using default schedule", e);
            vec![Trigger::Hourly]
        }
    };

    let mut scheduler = Scheduler::new(triggers, Local::now().naive_local());
    let registered: Vec<String> = scheduler
        .triggers()
        .map(|trigger| format!("Scheduled copy job {}", trigger))
        .collect();
    log.record(&registered);

    scheduler
        .run(
            |trigger| run_cycle(engine.clone(), config_path.clone(), platform, Some(trigger)),
            signals.recv(),
        )
        .await;

    info!("Stopping...");
    log.record(&["Stopping...".to_string()]);
}

/// One copy cycle on the blocking pool, awaited to completion
async fn run_cycle(engine: CopyEngine, config_path: PathBuf, platform: Platform, trigger: Option<Trigger>) {
    let result = tokio::task::spawn_blocking(move || engine.run_from_file(&config_path, platform)).await;

    match result {
        Ok(Some(summary)) => match trigger {
            Some(trigger) => info!("Copy job ({}) copied {} files", trigger, summary.total_copied),
            None => info!("Initial copy job copied {} files", summary.total_copied),
        },
        Ok(None) => warn!("Copy cycle skipped, config could not be loaded"),
        Err(e) => error!("Copy cycle task failed: {}", e),
    }
}

/// SIGINT (Ctrl+C) and, on Unix, SIGTERM listeners.
///
/// Handlers are registered when this is built, so signals arriving during
/// the startup cycle are held until the scheduler loop looks at them.
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?,
            terminate: signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?,
        })
    }

    #[cfg(windows)]
    fn install() -> Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c().context("Failed to install Ctrl+C handler")?,
        })
    }

    #[cfg(unix)]
    async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Received SIGINT (Ctrl+C)"),
            _ = self.terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(windows)]
    async fn recv(mut self) {
        self.ctrl_c.recv().await;
        info!("Received Ctrl+C");
    }
}
