use serde::Serialize;

use indexpilot_store::RunOutcome;

/// What one tick actually attempted.
///
/// Schedules that missed their window or lost the claim race are not
/// attempts; they are logged at debug level and left out of the report.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub processed: usize,
    pub results: Vec<ScheduleResult>,
}

/// Outcome of one schedule's attempt within a tick.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResult {
    pub schedule_id: String,
    pub project_id: String,
    pub status: RunStatus,
    /// The recorded outcome: successful actions plus per-action error
    /// strings (or a single synthetic entry for schedule-level failures).
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}
