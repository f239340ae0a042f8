pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use error::{ConfigError, DirectoryError, FileOperationError};
pub use logging::{DailyLog, LogStream};
pub use models::{Config, DestinationSpec, Platform, ScheduleConfig, TriggerPolicy};
pub use services::{resolve_triggers, CopyEngine, CycleSummary, PairReport, Scheduler, Trigger};
