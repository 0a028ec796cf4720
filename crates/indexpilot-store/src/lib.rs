//! `indexpilot-store` — persistence for indexing schedules.
//!
//! A schedule describes *when* a project's URLs should be pushed to the
//! indexing service and *which* actions to run. Two kinds exist:
//!
//! | Kind     | Fires                                      | Lifecycle                        |
//! |----------|--------------------------------------------|----------------------------------|
//! | `cron`   | daily at a wall-clock time (`HH:MM`)       | stays `active`, gated by `enabled` |
//! | `manual` | once, at or after an absolute `scheduled_at` | `pending` → `completed` / `failed` |
//!
//! Everything lives in a single SQLite table (see [`db::init_db`]); the
//! [`ScheduleStore`] wraps one connection behind a mutex so the scheduler
//! engine and any management surface can share it.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use store::ScheduleStore;
pub use types::{
    parse_cron_time, ActionRecord, IndexingSchedule, NewSchedule, RunOutcome, ScheduleKind,
    ScheduleStatus,
};
