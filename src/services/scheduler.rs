use crate::models::{ScheduleConfig, TriggerPolicy};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use std::fmt;
use std::future::Future;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Poll interval of the control loop
pub const TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// A recurring point in time at which a cycle starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every `minutes`, on minute boundaries
    Interval { minutes: u32 },
    /// Once a day at a local wall-clock time
    Daily(NaiveTime),
    /// At the top of every hour
    Hourly,
}

impl Trigger {
    /// First fire time strictly after `now`
    pub fn next_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        match *self {
            Trigger::Interval { minutes } => {
                let minute_start = truncate(now, now.time().with_second(0));
                minute_start + Duration::minutes(i64::from(minutes.max(1)))
            }
            Trigger::Hourly => {
                let hour_start = truncate(now, NaiveTime::from_hms_opt(now.hour(), 0, 0));
                hour_start + Duration::hours(1)
            }
            Trigger::Daily(at) => {
                let today = now.date().and_time(at);
                if today > now {
                    today
                } else {
                    today + Duration::days(1)
                }
            }
        }
    }
}

fn truncate(now: NaiveDateTime, time: Option<NaiveTime>) -> NaiveDateTime {
    let time = time
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(|| now.time());
    now.date().and_time(time)
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval { minutes } => write!(f, "every {} minutes", minutes),
            Trigger::Daily(at) => write!(f, "daily at {}", at.format("%H:%M")),
            Trigger::Hourly => write!(f, "every hour"),
        }
    }
}

/// Parse `HH:MM` with 0 <= HH < 24 and 0 <= MM < 60
pub fn parse_daily_time(value: &str) -> Option<NaiveTime> {
    let (hour, minute) = value.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    if hour < 24 && minute < 60 {
        NaiveTime::from_hms_opt(hour, minute, 0)
    } else {
        None
    }
}

/// Turn the schedule flags into the set of triggers to register.
///
/// Precedence is interval, then daily, then hourly. With no usable flag the
/// hourly trigger is registered.
pub fn resolve_triggers(schedule: &ScheduleConfig) -> Vec<Trigger> {
    let mut triggers = Vec::new();

    if let Some(minutes) = schedule.interval_minutes {
        triggers.push(Trigger::Interval { minutes });
    }

    if let Some(value) = &schedule.daily_at {
        match parse_daily_time(value) {
            Some(at) => triggers.push(Trigger::Daily(at)),
            None => warn!(
                "Invalid scheduled time format in config file: {:?}. Using default schedule.",
                value
            ),
        }
    }

    if schedule.hourly {
        triggers.push(Trigger::Hourly);
    }

    if schedule.policy == TriggerPolicy::Exclusive {
        triggers.truncate(1);
    }

    if triggers.is_empty() {
        triggers.push(Trigger::Hourly);
    }

    triggers
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone)]
struct ScheduledTrigger {
    trigger: Trigger,
    next_due: NaiveDateTime,
}

/// Single-loop scheduler; at most one cycle runs at a time
#[derive(Debug)]
pub struct Scheduler {
    entries: Vec<ScheduledTrigger>,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(triggers: Vec<Trigger>, now: NaiveDateTime) -> Self {
        let entries = triggers
            .into_iter()
            .map(|trigger| ScheduledTrigger {
                next_due: trigger.next_after(now),
                trigger,
            })
            .collect();

        Self {
            entries,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn triggers(&self) -> impl Iterator<Item = Trigger> + '_ {
        self.entries.iter().map(|entry| entry.trigger)
    }

    pub fn next_due_time(&self, index: usize) -> Option<NaiveDateTime> {
        self.entries.get(index).map(|entry| entry.next_due)
    }

    /// Index of the first trigger due at `now`; `None` while a cycle runs
    pub fn due(&self, now: NaiveDateTime) -> Option<usize> {
        if self.state == SchedulerState::Running {
            return None;
        }
        self.entries.iter().position(|entry| entry.next_due <= now)
    }

    pub fn begin(&mut self, index: usize) -> Option<Trigger> {
        let trigger = self.entries.get(index)?.trigger;
        self.state = SchedulerState::Running;
        Some(trigger)
    }

    /// Mark the running cycle finished and reschedule its trigger from
    /// `finished_at`, dropping any periods missed meanwhile.
    pub fn complete(&mut self, index: usize, finished_at: NaiveDateTime) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.next_due = entry.trigger.next_after(finished_at);
            debug!("Next run {} at {}", entry.trigger, entry.next_due);
        }
        self.state = SchedulerState::Idle;
    }

    /// Poll for due triggers until `shutdown` resolves.
    ///
    /// Shutdown is only observed between cycles and wins over due triggers.
    pub async fn run<F, Fut, S>(&mut self, mut cycle: F, shutdown: S)
    where
        F: FnMut(Trigger) -> Fut,
        Fut: Future<Output = ()>,
        S: Future<Output = ()>,
    {
        for entry in &self.entries {
            info!("Scheduled copy job {}, first run at {}", entry.trigger, entry.next_due);
        }

        tokio::pin!(shutdown);
        let mut ticker = time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    return;
                }
                _ = ticker.tick() => {}
            }

            while let Some(index) = self.due(Local::now().naive_local()) {
                let Some(trigger) = self.begin(index) else {
                    break;
                };
                info!("Running scheduled copy job ({})", trigger);
                cycle(trigger).await;
                self.complete(index, Local::now().naive_local());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn dt(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_interval_aligns_to_minute() {
        let trigger = Trigger::Interval { minutes: 15 };
        assert_eq!(trigger.next_after(dt(10, 7, 30)), dt(10, 22, 0));
        assert_eq!(trigger.next_after(dt(23, 50, 0)), dt(23, 50, 0) + Duration::minutes(15));
    }

    #[test]
    fn test_hourly_aligns_to_top_of_hour() {
        assert_eq!(Trigger::Hourly.next_after(dt(10, 7, 30)), dt(11, 0, 0));
        assert_eq!(Trigger::Hourly.next_after(dt(10, 0, 0)), dt(11, 0, 0));
    }

    #[test]
    fn test_daily_today_or_tomorrow() {
        let trigger = Trigger::Daily(time(7, 30));
        assert_eq!(trigger.next_after(dt(6, 0, 0)), dt(7, 30, 0));
        assert_eq!(
            trigger.next_after(dt(7, 30, 0)),
            dt(7, 30, 0) + Duration::days(1)
        );
    }

    #[test]
    fn test_parse_daily_time() {
        assert_eq!(parse_daily_time("07:30"), Some(time(7, 30)));
        assert_eq!(parse_daily_time("0:0"), Some(time(0, 0)));
        assert_eq!(parse_daily_time("24:00"), None);
        assert_eq!(parse_daily_time("12:60"), None);
        assert_eq!(parse_daily_time("noon"), None);
        assert_eq!(parse_daily_time("12"), None);
    }

    #[test]
    fn test_resolve_default_is_hourly() {
        assert_eq!(resolve_triggers(&ScheduleConfig::default()), vec![Trigger::Hourly]);

        let invalid = ScheduleConfig {
            daily_at: Some("25:99".to_string()),
            ..ScheduleConfig::default()
        };
        assert_eq!(resolve_triggers(&invalid), vec![Trigger::Hourly]);
    }

    #[test]
    fn test_resolve_combined_and_exclusive() {
        let mut schedule = ScheduleConfig {
            interval_minutes: Some(15),
            daily_at: Some("07:30".to_string()),
            hourly: true,
            policy: TriggerPolicy::Combined,
        };
        assert_eq!(
            resolve_triggers(&schedule),
            vec![
                Trigger::Interval { minutes: 15 },
                Trigger::Daily(time(7, 30)),
                Trigger::Hourly
            ]
        );

        schedule.policy = TriggerPolicy::Exclusive;
        assert_eq!(resolve_triggers(&schedule), vec![Trigger::Interval { minutes: 15 }]);

        schedule.interval_minutes = None;
        assert_eq!(resolve_triggers(&schedule), vec![Trigger::Daily(time(7, 30))]);
    }

    #[test]
    fn test_no_new_cycle_while_running() {
        let mut scheduler = Scheduler::new(vec![Trigger::Hourly], dt(10, 30, 0));
        assert_eq!(scheduler.due(dt(10, 59, 59)), None);

        let index = scheduler.due(dt(11, 0, 0)).unwrap();
        scheduler.begin(index);
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.due(dt(12, 0, 0)), None);

        scheduler.complete(index, dt(11, 0, 5));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.next_due_time(index), Some(dt(12, 0, 0)));
    }

    #[test]
    fn test_missed_periods_collapse_into_one_fire() {
        let mut scheduler = Scheduler::new(vec![Trigger::Interval { minutes: 15 }], dt(10, 0, 0));

        // a long cycle overran several periods
        let index = scheduler.due(dt(11, 3, 0)).unwrap();
        scheduler.begin(index);
        scheduler.complete(index, dt(11, 3, 10));

        assert_eq!(scheduler.due(dt(11, 3, 11)), None);
        assert_eq!(scheduler.next_due_time(index), Some(dt(11, 18, 0)));
    }

    #[tokio::test]
    async fn test_run_fires_each_due_trigger_once_then_stops() {
        let past = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut scheduler = Scheduler::new(vec![Trigger::Hourly, Trigger::Interval { minutes: 5 }], past);

        let fired = Cell::new(Vec::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut tx = Some(tx);

        scheduler
            .run(
                |trigger| {
                    let mut seen = fired.take();
                    seen.push(trigger);
                    fired.set(seen);
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(());
                    }
                    async {}
                },
                async {
                    let _ = rx.await;
                },
            )
            .await;

        assert_eq!(
            fired.take(),
            vec![Trigger::Hourly, Trigger::Interval { minutes: 5 }]
        );
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_run_returns_on_pending_shutdown_without_firing() {
        let past = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut scheduler = Scheduler::new(vec![Trigger::Hourly], past);
        let fired = Cell::new(0);

        scheduler
            .run(
                |_| {
                    fired.set(fired.get() + 1);
                    async {}
                },
                std::future::ready(()),
            )
            .await;

        assert_eq!(fired.get(), 0);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.due(Local::now().naive_local()).is_some());
    }
}
