use crate::logging::{DailyLog, LogStream};
use crate::models::{Config, DestinationSpec, Platform};
use crate::utils::{
    copy_with_metadata, ensure_directory, existing_entry_names, list_matching_files, remove_file,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Outcome of one (source, destination) pair
#[derive(Debug, Clone, Default)]
pub struct PairReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub copied: usize,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
}

/// Outcome of one full cycle
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub total_copied: usize,
    pub pairs: Vec<PairReport>,
    pub missing_sources: Vec<PathBuf>,
}

impl CycleSummary {
    pub fn error_count(&self) -> usize {
        self.pairs.iter().map(|pair| pair.errors.len()).sum()
    }
}

/// Messages for the two streams, kept in emission order
#[derive(Debug, Default)]
struct CycleLog {
    activity: Vec<String>,
    debug: Vec<String>,
}

impl CycleLog {
    fn activity(&mut self, message: String) {
        self.debug.push(message.clone());
        self.activity.push(message);
    }

    fn detail(&mut self, message: String) {
        self.debug.push(message);
    }
}

/// Runs copy cycles and records them in the daily logs
#[derive(Debug, Clone)]
pub struct CopyEngine {
    log: DailyLog,
}

impl CopyEngine {
    pub fn new(log: DailyLog) -> Self {
        Self { log }
    }

    pub fn run(&self, config: &Config) -> CycleSummary {
        info!("Starting copy cycle...");

        let mut cycle_log = CycleLog::default();
        let summary = run_cycle(config, &mut cycle_log);

        self.flush(&cycle_log);
        info!(
            "Copy cycle completed. Copied: {}, Errors: {}",
            summary.total_copied,
            summary.error_count()
        );
        summary
    }

    /// Load `config_path` fresh and run one cycle. A config that cannot be
    /// loaded is recorded in both logs and the cycle is skipped.
    pub fn run_from_file(&self, config_path: &Path, platform: Platform) -> Option<CycleSummary> {
        match Config::load(config_path, platform) {
            Ok(config) => Some(self.run(&config)),
            Err(e) => {
                error!("Failed to load config {}: {}", config_path.display(), e);
                self.log.record(&[format!("Error loading config: {}", e)]);
                None
            }
        }
    }

    fn flush(&self, cycle_log: &CycleLog) {
        for (stream, messages) in [
            (LogStream::Activity, &cycle_log.activity),
            (LogStream::Debug, &cycle_log.debug),
        ] {
            if let Err(e) = self.log.write(stream, messages) {
                warn!("Failed to write {:?} log: {:#}", stream, e);
            }
        }
    }
}

fn run_cycle(config: &Config, cycle_log: &mut CycleLog) -> CycleSummary {
    let mut summary = CycleSummary::default();

    for source in &config.source_folders {
        if !source.exists() {
            warn!("Source folder {} does not exist", source.display());
            cycle_log.activity(format!("Source folder '{}' does not exist", source.display()));
            summary.missing_sources.push(source.clone());
            continue;
        }

        for destination in &config.destination_folders {
            let report = copy_pair(source, destination, cycle_log);
            summary.total_copied += report.copied;
            summary.pairs.push(report);
        }
    }

    cycle_log.activity(format!("Total files copied: {}", summary.total_copied));
    summary
}

fn copy_pair(source: &Path, destination: &DestinationSpec, cycle_log: &mut CycleLog) -> PairReport {
    let dest_dir = &destination.path;
    let mut report = PairReport {
        source: source.to_path_buf(),
        destination: dest_dir.clone(),
        ..PairReport::default()
    };

    match ensure_directory(dest_dir) {
        Ok(true) => report.note(cycle_log, format!("Created folder '{}'", dest_dir.display())),
        Ok(false) => {}
        // Still attempted as a target; each copy then fails on its own
        Err(e) => report.fail(
            cycle_log,
            format!("Error creating folder '{}': {}", dest_dir.display(), e),
        ),
    }

    let mut existing = existing_entry_names(dest_dir).unwrap_or_else(|e| {
        debug!("Treating destination as empty: {}", e);
        Default::default()
    });

    let candidates = match list_matching_files(
        source,
        &destination.file_extensions,
        destination.pattern.as_ref(),
    ) {
        Ok(files) => files,
        Err(e) => {
            report.fail(cycle_log, format!("Error listing '{}': {}", source.display(), e));
            return report;
        }
    };

    if candidates.is_empty() {
        report.note(
            cycle_log,
            format!(
                "No files found in '{}' for destination '{}'",
                source.display(),
                destination.name
            ),
        );
    }

    for file_path in candidates {
        let Some(file_name) = file_path.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };
        if existing.contains(&file_name) {
            continue;
        }

        let dest_path = dest_dir.join(&file_name);
        if let Err(e) = copy_with_metadata(&file_path, &dest_path) {
            report.fail(cycle_log, e.to_string());
            continue;
        }

        existing.insert(file_name);
        report.copied += 1;
        cycle_log.detail(format!(
            "Copied '{}' to '{}'",
            file_path.display(),
            dest_path.display()
        ));

        if destination.delete_after_copy {
            match remove_file(&file_path) {
                Ok(()) => cycle_log.detail(format!("Deleted '{}'", file_path.display())),
                Err(e) => report.fail(cycle_log, e.to_string()),
            }
        }
    }

    cycle_log.detail(format!(
        "Copied {} files from '{}' to '{}'",
        report.copied,
        source.display(),
        dest_dir.display()
    ));
    report.note(
        cycle_log,
        format!(
            "Copied {} files from {} to {}",
            report.copied,
            source.display(),
            dest_dir.display()
        ),
    );
    report
}

impl PairReport {
    fn note(&mut self, cycle_log: &mut CycleLog, message: String) {
        info!("{}", message);
        cycle_log.activity(message.clone());
        self.messages.push(message);
    }

    fn fail(&mut self, cycle_log: &mut CycleLog, message: String) {
        error!("{}", message);
        cycle_log.activity(message.clone());
        self.errors.push(message);
    }
}
