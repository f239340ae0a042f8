use crate::error::ConfigError;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Drive root joined onto destination paths on the Windows family
const WINDOWS_DRIVE_ROOT: &str = "C:";

/// Host platform family, used to anchor destination paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// How several active schedule flags are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPolicy {
    /// Every active flag registers its own trigger
    #[default]
    Combined,
    /// Only the first active flag counts (interval, then daily, then hourly)
    Exclusive,
}

/// Schedule flags as written in the config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval_minutes: Option<u32>,
    pub daily_at: Option<String>,
    pub hourly: bool,
    pub policy: TriggerPolicy,
}

/// One configured destination folder
#[derive(Debug, Clone)]
pub struct DestinationSpec {
    pub name: String,
    pub path: PathBuf,
    pub file_extensions: Vec<String>,
    pub delete_after_copy: bool,
    pub pattern: Option<Regex>,
}

/// Configuration for one copy cycle
#[derive(Debug, Clone)]
pub struct Config {
    pub source_folders: Vec<PathBuf>,
    pub destination_folders: Vec<DestinationSpec>,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    source_folders: Option<Vec<String>>,
    destination_folders: Option<Map<String, Value>>,
    #[serde(default)]
    scheduled_every_15_minutes: bool,
    scheduled_interval_minutes: Option<u32>,
    scheduled_on_time: Option<String>,
    #[serde(default)]
    scheduled_every_hour: bool,
    #[serde(default)]
    trigger_policy: TriggerPolicy,
}

#[derive(Debug, Deserialize)]
struct RawDestination {
    path: String,
    file_extensions: Vec<String>,
    delete_after_copy: bool,
    pattern: Option<String>,
}

impl Config {
    /// Read and normalize the config file at `path`
    pub fn load<P: AsRef<Path>>(path: P, platform: Platform) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        Self::from_json_str(&data, platform)
    }

    pub fn from_json_str(data: &str, platform: Platform) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(data)?;
        let lookup = |name: &str| env::var(name).ok();

        let source_folders = raw
            .source_folders
            .ok_or(ConfigError::MissingKey("source_folders"))?
            .iter()
            .map(|folder| PathBuf::from(expand_vars_with(folder, platform, lookup)))
            .collect();

        let destination_folders = raw
            .destination_folders
            .ok_or(ConfigError::MissingKey("destination_folders"))?
            .into_iter()
            .map(|(name, value)| resolve_destination(name, value, platform))
            .collect::<Result<Vec<_>, _>>()?;

        let interval_minutes = raw
            .scheduled_interval_minutes
            .filter(|minutes| *minutes > 0)
            .or(raw.scheduled_every_15_minutes.then_some(15));

        Ok(Config {
            source_folders,
            destination_folders,
            schedule: ScheduleConfig {
                interval_minutes,
                daily_at: raw.scheduled_on_time,
                hourly: raw.scheduled_every_hour,
                policy: raw.trigger_policy,
            },
        })
    }
}

fn resolve_destination(
    name: String,
    value: Value,
    platform: Platform,
) -> Result<DestinationSpec, ConfigError> {
    let raw: RawDestination = serde_json::from_value(value)?;

    let pattern = match raw.pattern.filter(|p| !p.is_empty()) {
        Some(pattern) => Some(Regex::new(&pattern).map_err(|source| {
            ConfigError::InvalidPattern {
                destination: name.clone(),
                pattern: pattern.clone(),
                source,
            }
        })?),
        None => None,
    };

    Ok(DestinationSpec {
        path: anchor_to_root(&raw.path, platform),
        name,
        file_extensions: raw.file_extensions,
        delete_after_copy: raw.delete_after_copy,
        pattern,
    })
}

/// Join the platform root onto a configured destination path.
///
/// Unix: an absolute path is kept, anything else gets a leading `/`.
/// Windows: a path with a drive (or UNC prefix) is kept, anything else is
/// appended to `C:` without inserting a separator, so `foo` becomes the
/// drive-relative `C:foo` while `\foo` becomes `C:\foo`.
pub fn anchor_to_root(raw: &str, platform: Platform) -> PathBuf {
    let anchored = match platform {
        Platform::Unix if raw.starts_with('/') => raw.to_string(),
        Platform::Unix => format!("/{raw}"),
        Platform::Windows if has_drive(raw) || raw.starts_with(r"\\") => raw.to_string(),
        Platform::Windows => format!("{WINDOWS_DRIVE_ROOT}{raw}"),
    };
    PathBuf::from(anchored)
}

fn has_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Expand `$NAME` and `${NAME}` references, plus `%NAME%` on the Windows family.
/// References to unset variables are left as written.
pub fn expand_vars_with<F>(input: &str, platform: Platform, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    static UNIX_VARS: OnceLock<Regex> = OnceLock::new();
    static WINDOWS_VARS: OnceLock<Regex> = OnceLock::new();

    let re = match platform {
        Platform::Unix => UNIX_VARS.get_or_init(|| {
            Regex::new(r"\$(\w+)|\$\{([^}]*)\}").expect("variable pattern is valid")
        }),
        Platform::Windows => WINDOWS_VARS.get_or_init(|| {
            Regex::new(r"\$(\w+)|\$\{([^}]*)\}|%([^%]+)%").expect("variable pattern is valid")
        }),
    };

    re.replace_all(input, |caps: &Captures| {
        let name = (1..=3)
            .filter_map(|i| caps.get(i))
            .map(|m| m.as_str())
            .next()
            .unwrap_or_default();
        lookup(name).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
