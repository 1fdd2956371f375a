use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::ConfigError;
use crate::query::parse_duration;

/// Schedule as written in the config file
///
/// ```json
/// { "interval": "5 minutes" }
/// { "daily": ["08:00", "17:30"] }
/// "manual"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleSpec {
    /// Fixed rate, as duration text
    Interval(String),
    /// UTC times of day, `HH:MM` or `HH:MM:SS`
    Daily(Vec<String>),
    /// Only the first tick is automatic; later ones are armed by the task
    Manual,
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        ScheduleSpec::Interval("1 minute".to_string())
    }
}

/// Validated schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulePolicy {
    Interval(Duration),
    /// Sorted, deduplicated
    Daily(Vec<NaiveTime>),
    Manual,
}

impl SchedulePolicy {
    pub fn from_spec(spec: &ScheduleSpec) -> Result<Self, ConfigError> {
        match spec {
            ScheduleSpec::Interval(text) => {
                let every = parse_duration(text)?
                    .to_std()
                    .map_err(|_| ConfigError::InvalidSchedule(format!("negative interval '{}'", text)))?;
                if every.is_zero() {
                    return Err(ConfigError::InvalidSchedule(
                        "interval must be greater than zero".to_string(),
                    ));
                }
                Ok(SchedulePolicy::Interval(every))
            }
            ScheduleSpec::Daily(times) => {
                if times.is_empty() {
                    return Err(ConfigError::InvalidSchedule(
                        "daily schedule needs at least one time".to_string(),
                    ));
                }
                let mut parsed = times
                    .iter()
                    .map(|t| parse_time_of_day(t))
                    .collect::<Result<Vec<_>, _>>()?;
                parsed.sort();
                parsed.dedup();
                Ok(SchedulePolicy::Daily(parsed))
            }
            ScheduleSpec::Manual => Ok(SchedulePolicy::Manual),
        }
    }
}

fn parse_time_of_day(text: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text.trim(), "%H:%M"))
        .map_err(|_| ConfigError::InvalidSchedule(format!("invalid time of day '{}'", text)))
}

/// Roughly 30 years past `now`; stands in for deadlines an `Instant` can't hold
pub fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86400 * 365 * 30)
}

/// `now + after`, saturating at [`far_future`]
pub fn deadline_after(now: Instant, after: Duration) -> Instant {
    now.checked_add(after)
        .map(|deadline| deadline.min(far_future(now)))
        .unwrap_or_else(|| far_future(now))
}

/// Next fixed-rate slot after a tick that started at `last_start`.
///
/// If the tick ran past one or more slots those are skipped; the second
/// value is how many were skipped.
pub fn next_interval_deadline(last_start: Instant, now: Instant, every: Duration) -> (Instant, u32) {
    let elapsed = now.saturating_duration_since(last_start);
    if elapsed <= every {
        return (deadline_after(last_start, every), 0);
    }
    let periods = (elapsed.as_nanos() / every.as_nanos()).min(u32::MAX as u128 - 1) as u32;
    let offset = every.checked_mul(periods + 1).unwrap_or(Duration::MAX);
    (deadline_after(last_start, offset), periods)
}

/// Time until the next listed time of day strictly after `now`.
///
/// `times` must be sorted and non-empty.
pub fn next_daily_delay(now: DateTime<Utc>, times: &[NaiveTime]) -> chrono::Duration {
    let today = now.date_naive();
    let current = now.time();

    let next = match times.iter().find(|t| **t > current) {
        Some(t) => today.and_time(*t),
        None => match (today.succ_opt(), times.first()) {
            (Some(tomorrow), Some(t)) => tomorrow.and_time(*t),
            _ => return chrono::Duration::zero(),
        },
    };
    next.and_utc() - now
}
