//! Alert configuration types

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::notify::NotificationBinding;
use crate::query::{
    max_time_window, parse_duration, IndexPattern, QueryOptions, MAX_TIME_WINDOW_DAYS,
};
use crate::scheduler::ScheduleSpec;

/// Alert definition as found in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlertConfig {
    /// Registered source to query
    pub source: String,
    /// Full-text keyword hits must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Look-back window as duration text, e.g. "10 minutes".
    /// At most [`MAX_TIME_WINDOW_DAYS`] days.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// Result size cap sent to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_results_to: Option<usize>,
    /// Breach when the hit count goes above this
    pub limit: u64,
    /// Notifiers to wire to this alert's events
    #[serde(default)]
    pub notifications: Vec<NotificationBinding>,
    /// When to poll; interval or daily
    #[serde(default)]
    pub schedule: ScheduleSpec,
    /// Daily index naming
    #[serde(default)]
    pub index: IndexPattern,
}

impl AlertConfig {
    /// Create a new alert config polling `source` every minute
    pub fn new(source: impl Into<String>, limit: u64) -> Self {
        Self {
            source: source.into(),
            query: None,
            time: None,
            limit_results_to: None,
            limit,
            notifications: Vec::new(),
            schedule: ScheduleSpec::default(),
            index: IndexPattern::default(),
        }
    }

    /// Set the keyword
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Set the look-back window
    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    /// Cap the backend result size
    pub fn with_limit_results_to(mut self, size: usize) -> Self {
        self.limit_results_to = Some(size);
        self
    }

    /// Add notification binding
    pub fn with_notification(mut self, binding: NotificationBinding) -> Self {
        self.notifications.push(binding);
        self
    }

    /// Set the schedule
    pub fn with_schedule(mut self, schedule: ScheduleSpec) -> Self {
        self.schedule = schedule;
        self
    }

    /// Resolve the query part of the config, parsing the time window
    pub fn query_options(&self) -> Result<QueryOptions, ConfigError> {
        self.index.validate()?;
        let time_window = self.time.as_deref().map(parse_duration).transpose()?;
        if let (Some(text), Some(window)) = (&self.time, time_window) {
            if window > max_time_window() {
                return Err(ConfigError::InvalidDuration {
                    value: text.clone(),
                    reason: format!("longer than the {} day maximum", MAX_TIME_WINDOW_DAYS),
                });
            }
        }

        Ok(QueryOptions {
            keyword: self.query.clone(),
            time_window,
            limit_results_to: self.limit_results_to,
            index: self.index.clone(),
        })
    }
}
