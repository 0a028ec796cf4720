//! `indexpilot-scheduler` — the tick engine that drives indexing schedules.
//!
//! # Overview
//!
//! Each tick the [`engine::SchedulerEngine`] selects runnable schedules from
//! the store, claims each one, submits its actions to the indexing service,
//! and records the outcome. A tick is a complete pass; nothing is carried
//! over between ticks.
//!
//! # Per-schedule flow
//!
//! | Step    | Behaviour                                                     |
//! |---------|---------------------------------------------------------------|
//! | select  | cron: enabled + active; manual: pending and past due          |
//! | match   | cron only: HH:MM within the tolerance window, not yet run today |
//! | claim   | atomic takeover marker; losers skip without side effects      |
//! | execute | actions in order, each failure isolated                       |
//! | record  | `last_run_at` + `last_run_result` always; manual goes terminal |

pub mod engine;
pub mod error;
pub mod executor;
pub mod report;
pub mod window;

pub use engine::{EngineOptions, SchedulerEngine};
pub use error::{Result, SchedulerError};
pub use report::{RunStatus, ScheduleResult, TickReport};
