use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use indexpilot_indexing::IndexingService;
use indexpilot_store::{
    IndexingSchedule, RunOutcome, ScheduleKind, ScheduleStatus, ScheduleStore,
};

use crate::error::{Result, SchedulerError};
use crate::executor::run_actions;
use crate::report::{RunStatus, ScheduleResult, TickReport};
use crate::window::should_run_cron;

/// Scheduler knobs, resolved from configuration once at startup.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub tick_interval: Duration,
    pub window_minutes: i64,
    pub claim_timeout: chrono::Duration,
    pub day_offset: FixedOffset,
}

impl EngineOptions {
    pub fn from_config(cfg: &indexpilot_core::config::SchedulerConfig) -> Result<Self> {
        if cfg.tick_interval_secs == 0 {
            return Err(SchedulerError::Config(
                "tick_interval_secs must be at least 1".to_string(),
            ));
        }
        // A negative window matches nothing and silently disables every
        // cron schedule.
        if cfg.window_minutes < 0 {
            return Err(SchedulerError::Config(format!(
                "window_minutes must not be negative (got {})",
                cfg.window_minutes
            )));
        }
        Ok(Self {
            tick_interval: Duration::from_secs(cfg.tick_interval_secs),
            window_minutes: cfg.window_minutes,
            claim_timeout: chrono::Duration::seconds(cfg.claim_timeout_secs as i64),
            day_offset: cfg
                .day_offset()
                .map_err(|e| SchedulerError::Config(e.to_string()))?,
        })
    }
}

/// Core scheduler: selects due schedules each tick and drives them through
/// claim, execution, and outcome recording.
pub struct SchedulerEngine {
    store: Arc<ScheduleStore>,
    service: Arc<dyn IndexingService>,
    opts: EngineOptions,
}

impl SchedulerEngine {
    pub fn new(
        store: Arc<ScheduleStore>,
        service: Arc<dyn IndexingService>,
        opts: EngineOptions,
    ) -> Self {
        Self {
            store,
            service,
            opts,
        }
    }

    /// Run one complete pass over the runnable schedule set.
    ///
    /// Only selector failures abort the tick. Everything downstream is
    /// isolated per schedule and shows up in the returned report instead.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut due = self.store.due_cron()?;
        due.extend(self.store.due_manual(now)?);
        debug!(candidates = due.len(), "tick selection complete");

        let mut results = Vec::new();
        for schedule in due {
            if let Some(result) = self.process(schedule, now).await {
                results.push(result);
            }
        }
        Ok(TickReport {
            processed: results.len(),
            results,
        })
    }

    /// Main loop. Ticks on a fixed cadence until `shutdown` broadcasts `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            service = self.service.name(),
            interval_secs = self.opts.tick_interval.as_secs(),
            "scheduler engine started"
        );

        // The first tick fires immediately, so a fresh daemon sweeps any
        // overdue manual schedules right away.
        let mut interval = tokio::time::interval(self.opts.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_tick(Utc::now()).await {
                        Ok(report) if report.processed > 0 => {
                            info!(processed = report.processed, "tick complete");
                        }
                        Ok(_) => debug!("tick complete; nothing due"),
                        Err(e) => error!("tick failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Drive one schedule through match, claim, execute, record.
    ///
    /// Returns `None` when nothing was attempted: the window did not match,
    /// the claim was lost, or the schedule was finished or disabled by the
    /// time the post-claim re-check saw it.
    async fn process(&self, schedule: IndexingSchedule, now: DateTime<Utc>) -> Option<ScheduleResult> {
        // Window match before claiming keeps the common no-op tick free of
        // writes.
        if schedule.kind == ScheduleKind::Cron {
            match self.cron_due(&schedule, now) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(schedule_id = %schedule.id, "outside window or already ran today");
                    return None;
                }
                Err(reason) => return Some(self.record_failure(&schedule, now, reason)),
            }
        }

        let stale_before = now - self.opts.claim_timeout;
        match self.store.claim(&schedule.id, now, stale_before) {
            Ok(true) => {}
            Ok(false) => {
                debug!(schedule_id = %schedule.id, "claim lost; another tick holds this schedule");
                return None;
            }
            Err(e) => {
                return Some(self.record_failure(&schedule, now, format!("claim failed: {e}")))
            }
        }

        // Re-check on fresh state: a competing tick may have finished and
        // released this schedule between our selection and our claim.
        let fresh = match self.store.get(&schedule.id) {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!(schedule_id = %schedule.id, "schedule vanished after claim");
                return None;
            }
            Err(e) => {
                return Some(self.record_failure(&schedule, now, format!("reload failed: {e}")))
            }
        };
        let still_due = match fresh.kind {
            ScheduleKind::Manual => !fresh.status.is_terminal(),
            // A disable flip landing between selection and our claim wins
            // over the claim.
            ScheduleKind::Cron => {
                fresh.enabled
                    && match self.cron_due(&fresh, now) {
                        Ok(due) => due,
                        Err(reason) => return Some(self.record_failure(&fresh, now, reason)),
                    }
            }
        };
        if !still_due {
            debug!(schedule_id = %fresh.id, "no longer due after claim; skipping");
            if let Err(e) = self.store.release(&fresh.id) {
                warn!(schedule_id = %fresh.id, "release failed: {e}");
            }
            return None;
        }

        info!(
            schedule_id = %fresh.id,
            project_id = %fresh.project_id,
            kind = %fresh.kind,
            actions = fresh.actions.len(),
            "executing schedule"
        );
        let mut outcome = run_actions(self.service.as_ref(), &fresh).await;

        let new_status = match fresh.kind {
            ScheduleKind::Manual => Some(if outcome.is_success() {
                ScheduleStatus::Completed
            } else {
                ScheduleStatus::Failed
            }),
            ScheduleKind::Cron => None,
        };
        if let Err(e) = self.store.record_run(&fresh.id, now, &outcome, new_status) {
            error!(schedule_id = %fresh.id, "failed to record run outcome: {e}");
            outcome.errors.push(format!("record failed: {e}"));
            return Some(ScheduleResult {
                schedule_id: fresh.id,
                project_id: fresh.project_id,
                status: RunStatus::Error,
                outcome,
            });
        }

        let status = if outcome.is_success() {
            RunStatus::Ok
        } else {
            RunStatus::Error
        };
        info!(
            schedule_id = %fresh.id,
            succeeded = outcome.actions.len(),
            failed = outcome.errors.len(),
            "schedule processed"
        );
        Some(ScheduleResult {
            schedule_id: fresh.id,
            project_id: fresh.project_id,
            status,
            outcome,
        })
    }

    fn cron_due(&self, schedule: &IndexingSchedule, now: DateTime<Utc>) -> std::result::Result<bool, String> {
        let cron_time = schedule
            .cron_time
            .as_deref()
            .ok_or_else(|| "cron schedule has no cron_time".to_string())?;
        should_run_cron(
            cron_time,
            schedule.last_run_at,
            now,
            self.opts.day_offset,
            self.opts.window_minutes,
        )
    }

    /// Record a failure that happened outside action execution. The outcome
    /// is still written so the attempt stays visible and the once-per-day
    /// bookkeeping holds.
    fn record_failure(
        &self,
        schedule: &IndexingSchedule,
        now: DateTime<Utc>,
        reason: String,
    ) -> ScheduleResult {
        warn!(schedule_id = %schedule.id, %reason, "schedule-level failure");
        let outcome = RunOutcome::failure(reason);
        let new_status = match schedule.kind {
            ScheduleKind::Manual => Some(ScheduleStatus::Failed),
            ScheduleKind::Cron => None,
        };
        if let Err(e) = self.store.record_run(&schedule.id, now, &outcome, new_status) {
            error!(schedule_id = %schedule.id, "failed to record schedule failure: {e}");
        }
        ScheduleResult {
            schedule_id: schedule.id.clone(),
            project_id: schedule.project_id.clone(),
            status: RunStatus::Error,
            outcome,
        }
    }
}
