use chrono::{DateTime, FixedOffset, Timelike, Utc};

use indexpilot_store::parse_cron_time;

/// Decide whether a cron schedule should run at `now`.
///
/// Two checks, both evaluated in `zone` (the configured day-boundary
/// offset):
///
/// 1. The schedule must not have run yet on the current calendar date,
///    regardless of how that run went.
/// 2. The `"HH:MM"` target must lie within `window_minutes` of `now`,
///    measured as plain minute-of-day distance. There is no wraparound at
///    midnight: a `23:58` tick never matches a `00:02` target.
///
/// A malformed `cron_time` is an error carrying the parse failure. The day
/// check comes first, so a schedule that already ran today is skipped even
/// when its stored target is malformed.
pub fn should_run_cron(
    cron_time: &str,
    last_run_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    zone: FixedOffset,
    window_minutes: i64,
) -> Result<bool, String> {
    let local = now.with_timezone(&zone);

    // At most one run per calendar day, successful or not.
    if let Some(last) = last_run_at {
        if last.with_timezone(&zone).date_naive() == local.date_naive() {
            return Ok(false);
        }
    }

    let (hour, minute) = parse_cron_time(cron_time)?;
    let target = i64::from(hour) * 60 + i64::from(minute);
    let current = i64::from(local.hour()) * 60 + i64::from(local.minute());
    Ok((target - current).abs() <= window_minutes)
}
