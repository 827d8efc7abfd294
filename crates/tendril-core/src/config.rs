//! Configuration for stores and schedulers.
//!
//! Both structs deserialize from partial JSON (missing fields take the
//! defaults), so they can sit inside a larger application config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interval value: finish the current cycle, then stop.
pub const STOP_AFTER_CYCLE: i64 = 0;

/// Interval value: run the action exactly once more, then stop.
pub const RUN_ONCE: i64 = -1;

/// Interval value: stop now. Any value below `RUN_ONCE` behaves the same.
pub const STOP_NOW: i64 = i32::MIN as i64;

/// What a signed interval asks the scheduler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalCommand {
    Every(Duration),
    StopAfterCycle,
    RunOnce,
    StopNow,
}

impl IntervalCommand {
    pub fn from_ms(ms: i64) -> Self {
        match ms {
            ms if ms > 0 => IntervalCommand::Every(Duration::from_millis(ms as u64)),
            STOP_AFTER_CYCLE => IntervalCommand::StopAfterCycle,
            RUN_ONCE => IntervalCommand::RunOnce,
            _ => IntervalCommand::StopNow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How often `dispose` checks whether the in-flight cycle has finished.
    pub dispose_poll_ms: u64,

    /// Prefix of the worker thread name; the scheduler id is appended.
    pub thread_name: String,
}

impl SchedulerConfig {
    pub fn dispose_poll(&self) -> Duration {
        Duration::from_millis(self.dispose_poll_ms.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispose_poll_ms: 10,
            thread_name: "tendril-recurring".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Period of the background purge; `0` disables it. Same sentinels as
    /// `RecurringActionScheduler::set_interval`.
    pub purge_interval_ms: i64,

    /// Keep the last payload so `renotify` can replay it.
    pub cache_last_payload: bool,

    /// Used when a purge scheduler is created.
    pub scheduler: SchedulerConfig,
}

impl StoreConfig {
    pub fn with_purge_interval(mut self, ms: i64) -> Self {
        self.purge_interval_ms = ms;
        self
    }

    pub fn with_cached_payload(mut self) -> Self {
        self.cache_last_payload = true;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            purge_interval_ms: STOP_AFTER_CYCLE,
            cache_last_payload: false,
            scheduler: SchedulerConfig::default(),
        }
    }
}
