use chrono::{DateTime, Utc};
use indexpilot_indexing::ActionKind;
use serde::{Deserialize, Serialize};

/// Whether a schedule recurs daily or fires exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Cron,
    Manual,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleKind::Cron => write!(f, "cron"),
            ScheduleKind::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cron" => Ok(ScheduleKind::Cron),
            "manual" => Ok(ScheduleKind::Manual),
            other => Err(format!("unknown schedule kind: {other}")),
        }
    }
}

/// Lifecycle state of a schedule.
///
/// Cron schedules stay `active` for their whole life; pausing them is done
/// through the `enabled` flag, not the status. Manual schedules move from
/// `pending` to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Active,
    Pending,
    Completed,
    Failed,
}

impl ScheduleStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScheduleStatus::Completed | ScheduleStatus::Failed)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleStatus::Active => write!(f, "active"),
            ScheduleStatus::Pending => write!(f, "pending"),
            ScheduleStatus::Completed => write!(f, "completed"),
            ScheduleStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(ScheduleStatus::Active),
            "pending" => Ok(ScheduleStatus::Pending),
            "completed" => Ok(ScheduleStatus::Completed),
            "failed" => Ok(ScheduleStatus::Failed),
            other => Err(format!("unknown schedule status: {other}")),
        }
    }
}

/// One successfully executed action and the payload the service returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Serialised as `type`; `kind` in Rust because of the keyword.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub result: serde_json::Value,
}

/// Outcome of one execution attempt, persisted on the schedule after every
/// run, successful or not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Successful actions, in execution order.
    pub actions: Vec<ActionRecord>,
    /// One `"{action}: {message}"` entry per failed action. A failure that
    /// happened outside action execution adds a single synthetic entry.
    pub errors: Vec<String>,
}

impl RunOutcome {
    /// An outcome that carries nothing but a synthetic error entry.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            errors: vec![message.into()],
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A persisted schedule record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingSchedule {
    pub id: String,
    pub project_id: String,
    pub kind: ScheduleKind,
    /// Daily wall-clock target `"HH:MM"`. Cron schedules only.
    pub cron_time: Option<String>,
    /// Absolute due time. Manual schedules only.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Gates cron selection. Manual schedules run regardless of this flag.
    pub enabled: bool,
    pub status: ScheduleStatus,
    /// Ordered action list; order is preserved and duplicates are allowed.
    pub actions: Vec<ActionKind>,
    /// Per-action URL batch cap.
    pub max_urls: u32,
    /// Claim marker: set while some tick is executing this schedule.
    pub running_since: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_result: Option<RunOutcome>,
    pub created_at: String,
    pub updated_at: String,
}

/// Creation request for [`crate::ScheduleStore::create`].
///
/// Build one with [`NewSchedule::cron`] or [`NewSchedule::manual`]; the
/// store validates the rest on insert.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub project_id: String,
    pub kind: ScheduleKind,
    pub cron_time: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub actions: Vec<ActionKind>,
    /// Falls back to the configured default when `None`.
    pub max_urls: Option<u32>,
}

impl NewSchedule {
    pub fn cron(
        project_id: impl Into<String>,
        cron_time: impl Into<String>,
        actions: Vec<ActionKind>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            kind: ScheduleKind::Cron,
            cron_time: Some(cron_time.into()),
            scheduled_at: None,
            actions,
            max_urls: None,
        }
    }

    pub fn manual(
        project_id: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        actions: Vec<ActionKind>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            kind: ScheduleKind::Manual,
            cron_time: None,
            scheduled_at: Some(scheduled_at),
            actions,
            max_urls: None,
        }
    }

    pub fn with_max_urls(mut self, max_urls: u32) -> Self {
        self.max_urls = Some(max_urls);
        self
    }
}

/// Parse a cron wall-clock target of the form `"HH:MM"`.
pub fn parse_cron_time(s: &str) -> std::result::Result<(u32, u32), String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid cron_time {s:?} (expected \"HH:MM\")"))?;
    let hour: u32 = h
        .parse()
        .map_err(|_| format!("invalid cron_time {s:?}: bad hour"))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| format!("invalid cron_time {s:?}: bad minute"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("invalid cron_time {s:?}: out of range"));
    }
    Ok((hour, minute))
}
