//! `indexpilot-core` — shared configuration and error types.
//!
//! Every other crate in the workspace reads its knobs from
//! [`config::IndexPilotConfig`], loaded from `indexpilot.toml` with
//! `INDEXPILOT_*` environment overrides.

pub mod config;
pub mod error;

pub use config::IndexPilotConfig;
pub use error::{CoreError, Result};
