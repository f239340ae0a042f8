use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be loaded for a cycle
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing required config key '{0}'")]
    MissingKey(&'static str),

    #[error("invalid pattern '{pattern}' for destination '{destination}': {source}")]
    InvalidPattern {
        destination: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A source or destination directory is unusable
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read directory {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {}: {source}", .path.display())]
    Uncreatable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Copy or delete of a single file failed
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("Error copying '{}' to '{}': {source}", .source_path.display(), .destination.display())]
    Copy {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error deleting '{}': {source}", .path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
