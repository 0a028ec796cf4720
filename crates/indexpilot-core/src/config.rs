use chrono::FixedOffset;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Scheduler timing defaults. The tick cadence must stay at or below the
// cron tolerance window or daily schedules can fall between two ticks.
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_WINDOW_MINUTES: i64 = 5;
pub const DEFAULT_CLAIM_TIMEOUT_SECS: u64 = 600;
/// Batch cap applied when a schedule does not set its own `max_urls`.
pub const DEFAULT_MAX_URLS: u32 = 200;

/// Top-level config (indexpilot.toml + INDEXPILOT_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexPilotConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks when running in loop mode.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
    /// Cron tolerance window in minutes. Must be >= the tick cadence.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Seconds after which a run claim left behind by a dead tick may be
    /// taken over.
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,
    /// Fixed UTC offset ("+HH:MM") governing the cron day boundary: both
    /// the HH:MM window match and the already-ran-today comparison use it.
    #[serde(default = "default_day_boundary_offset")]
    pub day_boundary_offset: String,
    /// Batch cap for schedules created without an explicit `max_urls`.
    /// Consumed by the embedding platform's schedule-creation calls into
    /// the store; the scheduler only reads the cap already on each record.
    #[serde(default = "default_max_urls")]
    pub default_max_urls: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            claim_timeout_secs: DEFAULT_CLAIM_TIMEOUT_SECS,
            day_boundary_offset: default_day_boundary_offset(),
            default_max_urls: DEFAULT_MAX_URLS,
        }
    }
}

impl SchedulerConfig {
    /// Parse `day_boundary_offset` into a chrono offset.
    pub fn day_offset(&self) -> crate::error::Result<FixedOffset> {
        self.day_boundary_offset.parse().map_err(|_| {
            crate::error::CoreError::Config(format!(
                "invalid day_boundary_offset {:?} (expected \"+HH:MM\" or \"-HH:MM\")",
                self.day_boundary_offset
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Base URL of the platform's internal indexing service.
    #[serde(default = "default_indexing_base_url")]
    pub base_url: String,
    /// Bearer token sent with every indexing request, if set.
    pub service_token: Option<String>,
    /// Per-request timeout. This is the only bound on action latency; the
    /// scheduler itself never times a schedule out.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            base_url: default_indexing_base_url(),
            service_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.indexpilot/indexpilot.db", home)
}
fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL_SECS
}
fn default_window_minutes() -> i64 {
    DEFAULT_WINDOW_MINUTES
}
fn default_claim_timeout() -> u64 {
    DEFAULT_CLAIM_TIMEOUT_SECS
}
fn default_day_boundary_offset() -> String {
    "+00:00".to_string()
}
fn default_max_urls() -> u32 {
    DEFAULT_MAX_URLS
}
fn default_indexing_base_url() -> String {
    "http://127.0.0.1:8710".to_string()
}
fn default_request_timeout() -> u64 {
    120
}

impl IndexPilotConfig {
    /// Load config from a TOML file with INDEXPILOT_* env var overrides
    /// (double underscore separates nesting: INDEXPILOT_SCHEDULER__WINDOW_MINUTES).
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.indexpilot/indexpilot.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: IndexPilotConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("INDEXPILOT_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.indexpilot/indexpilot.toml", home)
}
