//! Minute-boundary timer scheduler.
//!
//! Fires `timer_daily` and `timer_weekly` automations. Each tick
//! evaluates the current UTC wall-clock minute; the deterministic event
//! id (`timer_{automation}_{YYYYMMDDHHMM}`) collapses any number of
//! ticks observed at the same minute onto a single execution.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::domain::errors::DomainResult;
use crate::domain::models::TriggerEvent;
use crate::domain::ports::AutomationRepository;
use crate::services::admitter::ExecutionAdmitter;
use crate::services::catalog::Catalog;

/// Outcome of one scheduler tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub matched: usize,
    pub created: usize,
    pub skipped: usize,
    pub malformed: usize,
}

pub struct TimerScheduler {
    automations: Arc<dyn AutomationRepository>,
    admitter: Arc<ExecutionAdmitter>,
    catalog: &'static Catalog,
}

impl TimerScheduler {
    pub fn new(automations: Arc<dyn AutomationRepository>, admitter: Arc<ExecutionAdmitter>) -> Self {
        Self {
            automations,
            admitter,
            catalog: Catalog::builtin(),
        }
    }

    /// Process the wall-clock minute containing `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> DomainResult<TickSummary> {
        let minute = truncate_to_minute(now);
        let action_names = self.catalog.timer_action_names();
        let automations = self.automations.list_active_by_actions(&action_names).await?;

        let mut summary = TickSummary::default();
        for automation in automations {
            match timer_matches(&automation.action_name, &automation.action_config, minute) {
                Err(reason) => {
                    // Malformed configs are logged and skipped; a bad
                    // automation must never take down the tick.
                    summary.malformed += 1;
                    tracing::warn!(
                        automation_id = %automation.id,
                        action = %automation.action_name,
                        reason = %reason,
                        "Skipping timer automation with malformed config"
                    );
                }
                Ok(false) => {}
                Ok(true) => {
                    summary.matched += 1;
                    let event_id =
                        format!("timer_{}_{}", automation.id, minute.format("%Y%m%d%H%M"));
                    let trigger_data = json!({
                        "service": "timer",
                        "action": automation.action_name,
                        "triggered_at": minute.to_rfc3339(),
                    });
                    let (_, created) = self
                        .admitter
                        .admit(TriggerEvent::new(automation.id, event_id, trigger_data))
                        .await?;
                    if created {
                        summary.created += 1;
                    } else {
                        summary.skipped += 1;
                    }
                }
            }
        }

        tracing::debug!(
            minute = %minute.format("%Y-%m-%dT%H:%M"),
            matched = summary.matched,
            created = summary.created,
            skipped = summary.skipped,
            "Scheduler tick complete"
        );
        Ok(summary)
    }

    /// Run ticks at every minute boundary until `shutdown` flips.
    ///
    /// A minute missed while the process is down is lost; timers are not
    /// replayed on restart.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let now = Utc::now();
            let next_minute = truncate_to_minute(now) + chrono::Duration::minutes(1);
            let wait = (next_minute - now)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(1));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }

            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!(error = %e, "Scheduler tick failed");
            }
        }
        tracing::info!("Timer scheduler stopped");
    }
}

/// Whether a timer automation's config matches the given minute.
///
/// Days are numbered 0=Monday..6=Sunday. Returns `Err` for configs
/// missing keys or out of range.
pub fn timer_matches(
    action_name: &str,
    config: &Value,
    minute: DateTime<Utc>,
) -> Result<bool, String> {
    let hour = require_range(config, "hour", 0, 23)?;
    let min = require_range(config, "minute", 0, 59)?;

    match action_name {
        "timer_daily" => Ok(hour == minute.hour() as i64 && min == minute.minute() as i64),
        "timer_weekly" => {
            let dow = require_range(config, "day_of_week", 0, 6)?;
            let today = minute.date_naive().weekday().num_days_from_monday() as i64;
            Ok(dow == today && hour == minute.hour() as i64 && min == minute.minute() as i64)
        }
        other => Err(format!("'{other}' is not a timer action")),
    }
}

fn require_range(config: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let value = config
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("missing or non-integer '{key}'"))?;
    if value < min || value > max {
        return Err(format!("'{key}' out of range: {value}"));
    }
    Ok(value)
}

fn truncate_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
