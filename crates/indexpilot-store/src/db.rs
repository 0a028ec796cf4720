use rusqlite::Connection;

use crate::error::Result;

/// Initialise the schedule schema on `conn`. Idempotent; the daemon calls
/// this on every start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schedules (
            id              TEXT    NOT NULL PRIMARY KEY,
            project_id      TEXT    NOT NULL,
            kind            TEXT    NOT NULL,
            cron_time       TEXT,
            scheduled_at    TEXT,
            enabled         INTEGER NOT NULL DEFAULT 1,
            status          TEXT    NOT NULL,
            actions         TEXT    NOT NULL,
            max_urls        INTEGER NOT NULL,
            running_since   TEXT,
            last_run_at     TEXT,
            last_run_result TEXT,
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;

        -- The due-schedule queries filter on (kind, status) every tick.
        CREATE INDEX IF NOT EXISTS idx_schedules_kind_status
            ON schedules (kind, status);

        CREATE INDEX IF NOT EXISTS idx_schedules_project
            ON schedules (project_id);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_db_is_idempotent() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        init_db(&conn).expect("first init");
        init_db(&conn).expect("second init");
    }
}
