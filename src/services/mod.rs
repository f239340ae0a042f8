pub mod copy_engine;
pub mod scheduler;

pub use copy_engine::{CopyEngine, CycleSummary, PairReport};
pub use scheduler::{
    parse_daily_time, resolve_triggers, Scheduler, SchedulerState, Trigger, TICK,
};
