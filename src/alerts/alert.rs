//! Alert lifecycle: configure, initialise, poll, stop

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;

use super::checker::AlertChecker;
use super::config::AlertConfig;
use super::AlertError;
use crate::config::ConfigError;
use crate::context::AlertContext;
use crate::events::SubscriptionId;
use crate::scheduler::{SchedulePolicy, ScheduleHandle, ScheduleSpec, Scheduler, Task};

/// Where an alert is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    Unconfigured,
    Configured,
    Running,
    Stopped,
}

impl fmt::Display for AlertPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertPhase::Unconfigured => "unconfigured",
            AlertPhase::Configured => "configured",
            AlertPhase::Running => "running",
            AlertPhase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// A named, scheduled poll of one source with a threshold.
///
/// Events are published on the bus under the alert's name.
pub struct Alert {
    name: String,
    ctx: AlertContext,
    phase: AlertPhase,
    config: Option<AlertConfig>,
    checker: Option<Arc<AlertChecker>>,
    scheduler: Option<Scheduler>,
    subscriptions: Vec<SubscriptionId>,
}

impl Alert {
    pub fn new(name: impl Into<String>, ctx: AlertContext) -> Self {
        Self {
            name: name.into(),
            ctx,
            phase: AlertPhase::Unconfigured,
            config: None,
            checker: None,
            scheduler: None,
            subscriptions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    pub fn config(&self) -> Option<&AlertConfig> {
        self.config.as_ref()
    }

    /// Validate and store the config, resolve the source and subscribe
    /// the notifications.
    ///
    /// On error the alert stays unconfigured and nothing is subscribed.
    pub fn configure(&mut self, config: AlertConfig) -> Result<(), AlertError> {
        self.expect_phase(AlertPhase::Unconfigured)?;

        let options = config.query_options()?;
        // Polls never re-arm themselves, so a manual alert would run once
        if config.schedule == ScheduleSpec::Manual {
            return Err(ConfigError::InvalidSchedule(
                "alerts need an interval or daily schedule".to_string(),
            )
            .into());
        }
        SchedulePolicy::from_spec(&config.schedule)?;
        let source = self
            .ctx
            .sources
            .get(&config.source)
            .ok_or_else(|| ConfigError::UnknownSource(config.source.clone()))?;

        self.subscriptions = self
            .ctx
            .dispatcher()
            .register_alert_notifications(&self.name, &config.notifications)?;

        self.checker = Some(Arc::new(AlertChecker::new(
            self.name.clone(),
            options,
            config.limit,
            source,
            Arc::clone(&self.ctx.bus),
            Arc::clone(&self.ctx.clock),
        )));
        self.config = Some(config);
        self.phase = AlertPhase::Configured;

        tracing::debug!(alert = %self.name, "Alert configured");
        Ok(())
    }

    /// Make sure the source is up, then start polling.
    ///
    /// Returns after the first poll has completed.
    pub async fn initialise(&mut self) -> Result<(), AlertError> {
        self.expect_phase(AlertPhase::Configured)?;
        let (Some(checker), Some(spec)) = (
            self.checker.clone(),
            self.config.as_ref().map(|c| c.schedule.clone()),
        ) else {
            return Err(self.invalid_state(AlertPhase::Configured));
        };

        checker
            .source()
            .ensure_initialised()
            .await
            .map_err(|e| AlertError::Connection {
                source_name: checker.source().name().to_string(),
                message: e.to_string(),
            })?;

        let poller = Arc::clone(&checker);
        let task: Task = Arc::new(move |_handle: ScheduleHandle| {
            let poller = Arc::clone(&poller);
            async move {
                poller.check().await;
            }
            .boxed()
        });

        let scheduler =
            Scheduler::from_config(self.name.clone(), &spec, task, Arc::clone(&self.ctx.clock))?;
        checker.activate();
        self.phase = AlertPhase::Running;

        tracing::info!(
            alert = %self.name,
            source = %checker.source().name(),
            policy = ?scheduler.policy(),
            "Alert running"
        );
        scheduler.start().await;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Stop polling and notifying. Safe to call in any phase, any number of times.
    ///
    /// Returns true if the alert was running.
    pub fn stop(&mut self) -> bool {
        if self.phase == AlertPhase::Stopped {
            return false;
        }

        if let Some(checker) = &self.checker {
            checker.deactivate();
        }
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        if !self.subscriptions.is_empty() {
            self.ctx.dispatcher().unregister(&self.subscriptions);
            self.subscriptions.clear();
        }

        let was_running = self.phase == AlertPhase::Running;
        if was_running {
            tracing::info!(alert = %self.name, "Alert stopped");
        } else {
            tracing::debug!(alert = %self.name, previous = %self.phase, "Alert discarded");
        }
        self.phase = AlertPhase::Stopped;
        was_running
    }

    fn expect_phase(&self, expected: AlertPhase) -> Result<(), AlertError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(self.invalid_state(expected))
        }
    }

    fn invalid_state(&self, expected: AlertPhase) -> AlertError {
        AlertError::InvalidState {
            alert: self.name.clone(),
            expected,
            actual: self.phase,
        }
    }
}

impl Drop for Alert {
    fn drop(&mut self) {
        self.stop();
    }
}
