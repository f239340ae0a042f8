pub mod config;

pub use config::{
    anchor_to_root, expand_vars_with, Config, DestinationSpec, Platform, ScheduleConfig,
    TriggerPolicy, DEFAULT_CONFIG_FILE,
};
