use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory holding both log streams, relative to the working directory
pub const LOG_FOLDER: &str = "Logs";

const LOG_FILE_PREFIX: &str = "log_";
const DEBUG_LOG_FILE_PREFIX: &str = "debug_";
const LOG_FILE_EXTENSION: &str = ".log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The two parallel log streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    /// Per-cycle summaries and totals
    Activity,
    /// Activity content plus per-file detail
    Debug,
}

impl LogStream {
    fn file_name(self, date: NaiveDate) -> String {
        let day = date.format("%Y-%m-%d");
        match self {
            LogStream::Activity => format!("{LOG_FILE_PREFIX}{day}_regular{LOG_FILE_EXTENSION}"),
            LogStream::Debug => format!("{DEBUG_LOG_FILE_PREFIX}{day}_debug{LOG_FILE_EXTENSION}"),
        }
    }
}

/// Date-stamped activity and debug logs inside one directory.
///
/// File names are derived from the date of each write, so a process that
/// runs across midnight continues in the new day's files.
#[derive(Debug, Clone)]
pub struct DailyLog {
    directory: PathBuf,
}

impl DailyLog {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// `Logs/` under the current working directory
    pub fn in_working_directory() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
        Ok(Self::new(cwd.join(LOG_FOLDER)))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, stream: LogStream, date: NaiveDate) -> PathBuf {
        self.directory.join(stream.file_name(date))
    }

    pub fn write(&self, stream: LogStream, messages: &[String]) -> Result<()> {
        self.write_at(stream, messages, Local::now())
    }

    pub fn write_at(
        &self,
        stream: LogStream,
        messages: &[String],
        now: DateTime<Local>,
    ) -> Result<()> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create log directory: {:?}", self.directory))?;
        append(self.path_for(stream, now.date_naive()), messages, now)
    }

    /// Write the same messages to both streams
    pub fn write_both(&self, messages: &[String]) -> Result<()> {
        let now = Local::now();
        self.write_at(LogStream::Activity, messages, now)?;
        self.write_at(LogStream::Debug, messages, now)
    }

    /// Like [`DailyLog::write_both`] but failures only go to tracing
    pub fn record(&self, messages: &[String]) {
        if let Err(e) = self.write_both(messages) {
            tracing::warn!("Failed to write log files: {:#}", e);
        }
    }
}

/// Append one timestamped line per message to `path`
pub fn append<P: AsRef<Path>>(path: P, messages: &[String], now: DateTime<Local>) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;

    let stamp = now.format(TIMESTAMP_FORMAT).to_string();
    let mut buffer = String::new();
    for message in messages {
        buffer.push_str(&stamp);
        buffer.push(' ');
        buffer.push_str(message);
        buffer.push('\n');
    }

    file.write_all(buffer.as_bytes())
        .with_context(|| format!("Failed to write log file: {:?}", path))
}
