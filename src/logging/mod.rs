pub mod daily_log;

pub use daily_log::{append, DailyLog, LogStream, LOG_FOLDER};
