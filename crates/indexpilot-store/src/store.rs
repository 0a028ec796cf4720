use std::sync::Mutex;

use chrono::{DateTime, Utc};
use indexpilot_indexing::ActionKind;
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{
    parse_cron_time, IndexingSchedule, NewSchedule, RunOutcome, ScheduleKind, ScheduleStatus,
};

/// Thread-safe store for [`IndexingSchedule`] records.
///
/// Wraps a single SQLite connection in a `Mutex`. The scheduler engine and
/// any management surface share one instance; the write rates involved do
/// not justify a connection pool.
pub struct ScheduleStore {
    db: Mutex<Connection>,
}

/// Raw column tuple of one `schedules` row, before decoding.
type ScheduleRow = (
    String,         // id
    String,         // project_id
    String,         // kind
    Option<String>, // cron_time
    Option<String>, // scheduled_at
    bool,           // enabled
    String,         // status
    String,         // actions JSON
    u32,            // max_urls
    Option<String>, // running_since
    Option<String>, // last_run_at
    Option<String>, // last_run_result JSON
    String,         // created_at
    String,         // updated_at
);

impl ScheduleStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Validate and insert a new schedule. Returns the fully populated record.
    ///
    /// Cron schedules start out enabled and `active`; manual schedules start
    /// `pending`. `default_max_urls` fills in when the request carries no cap
    /// of its own.
    #[instrument(skip(self, new), fields(project_id = %new.project_id, kind = %new.kind))]
    pub fn create(&self, new: NewSchedule, default_max_urls: u32) -> Result<IndexingSchedule> {
        if new.actions.is_empty() {
            return Err(StoreError::InvalidSchedule(
                "actions must not be empty".into(),
            ));
        }
        let max_urls = new.max_urls.unwrap_or(default_max_urls);
        if max_urls == 0 {
            return Err(StoreError::InvalidSchedule(
                "max_urls must be at least 1".into(),
            ));
        }
        let (cron_time, scheduled_at, status) = match new.kind {
            ScheduleKind::Cron => {
                let t = new.cron_time.ok_or_else(|| {
                    StoreError::InvalidSchedule("cron schedules require cron_time".into())
                })?;
                parse_cron_time(&t).map_err(StoreError::InvalidSchedule)?;
                (Some(t), None, ScheduleStatus::Active)
            }
            ScheduleKind::Manual => {
                let at = new.scheduled_at.ok_or_else(|| {
                    StoreError::InvalidSchedule("manual schedules require scheduled_at".into())
                })?;
                (None, Some(at), ScheduleStatus::Pending)
            }
        };

        let id = Uuid::new_v4().to_string();
        let now_str = Utc::now().to_rfc3339();
        let actions_json = serde_json::to_string(&new.actions)?;

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO schedules
             (id, project_id, kind, cron_time, scheduled_at, enabled, status,
              actions, max_urls, running_since, last_run_at, last_run_result,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, NULL, NULL, NULL, ?9, ?9)",
            rusqlite::params![
                id,
                new.project_id,
                new.kind.to_string(),
                cron_time,
                scheduled_at.map(|dt| dt.to_rfc3339()),
                status.to_string(),
                actions_json,
                max_urls,
                now_str
            ],
        )?;
        info!(schedule_id = %id, "schedule created");

        Ok(IndexingSchedule {
            id,
            project_id: new.project_id,
            kind: new.kind,
            cron_time,
            scheduled_at,
            enabled: true,
            status,
            actions: new.actions,
            max_urls,
            running_since: None,
            last_run_at: None,
            last_run_result: None,
            created_at: now_str.clone(),
            updated_at: now_str,
        })
    }

    /// Retrieve a schedule by ID, returning `None` if it does not exist.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Option<IndexingSchedule>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, project_id, kind, cron_time, scheduled_at, enabled, status,
                    actions, max_urls, running_since, last_run_at, last_run_result,
                    created_at, updated_at
             FROM schedules WHERE id = ?1",
            rusqlite::params![id],
            raw_row,
        ) {
            Ok(raw) => Ok(decode_row(raw)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// List every schedule for a project, newest first.
    #[instrument(skip(self))]
    pub fn list_for_project(&self, project_id: &str) -> Result<Vec<IndexingSchedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, project_id, kind, cron_time, scheduled_at, enabled, status,
                    actions, max_urls, running_since, last_run_at, last_run_result,
                    created_at, updated_at
             FROM schedules
             WHERE project_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![project_id], raw_row)?;
        Ok(rows.filter_map(|r| r.ok()).filter_map(decode_row).collect())
    }

    /// Enable or disable a schedule without touching its definition.
    ///
    /// Only cron selection honours the flag, but it can be set on any kind.
    #[instrument(skip(self))]
    pub fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let now_str = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules SET enabled = ?2, updated_at = ?3 WHERE id = ?1",
            rusqlite::params![id, enabled, now_str],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Permanently delete a schedule record.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "DELETE FROM schedules WHERE id = ?1",
            rusqlite::params![id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        info!(schedule_id = %id, "schedule deleted");
        Ok(())
    }

    /// Every cron schedule that is allowed to run, before any time-window
    /// matching. The window decision belongs to the scheduler, not the store.
    #[instrument(skip(self))]
    pub fn due_cron(&self) -> Result<Vec<IndexingSchedule>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, project_id, kind, cron_time, scheduled_at, enabled, status,
                    actions, max_urls, running_since, last_run_at, last_run_result,
                    created_at, updated_at
             FROM schedules
             WHERE kind = 'cron' AND enabled = 1 AND status = 'active'
             ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], raw_row)?;
        Ok(rows.filter_map(|r| r.ok()).filter_map(decode_row).collect())
    }

    /// Every pending manual schedule whose due time has arrived.
    ///
    /// The `enabled` flag plays no part here: a one-shot request stays
    /// runnable until it reaches a terminal status.
    #[instrument(skip(self, now))]
    pub fn due_manual(&self, now: DateTime<Utc>) -> Result<Vec<IndexingSchedule>> {
        let now_str = now.to_rfc3339();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, project_id, kind, cron_time, scheduled_at, enabled, status,
                    actions, max_urls, running_since, last_run_at, last_run_result,
                    created_at, updated_at
             FROM schedules
             WHERE kind = 'manual' AND status = 'pending' AND scheduled_at <= ?1
             ORDER BY scheduled_at",
        )?;
        let rows = stmt.query_map(rusqlite::params![now_str], raw_row)?;
        Ok(rows.filter_map(|r| r.ok()).filter_map(decode_row).collect())
    }

    /// Atomically claim a schedule for execution.
    ///
    /// Returns `true` when this caller won the claim. A claim older than
    /// `stale_before` is treated as abandoned by a crashed run and may be
    /// taken over. Terminal schedules can never be claimed.
    #[instrument(skip(self, now, stale_before))]
    pub fn claim(
        &self,
        id: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let n = db.execute(
            "UPDATE schedules
             SET running_since = ?2
             WHERE id = ?1
               AND status IN ('active', 'pending')
               AND (running_since IS NULL OR running_since < ?3)",
            rusqlite::params![id, now.to_rfc3339(), stale_before.to_rfc3339()],
        )?;
        Ok(n == 1)
    }

    /// Clear a claim without recording an outcome. Used when a claimed
    /// schedule turns out not to be due after all.
    #[instrument(skip(self))]
    pub fn release(&self, id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE schedules SET running_since = NULL WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(())
    }

    /// Persist the outcome of one execution attempt.
    ///
    /// `last_run_at` and `last_run_result` are written on every attempt,
    /// success and failure alike. `new_status` applies the terminal
    /// transition for manual schedules; cron schedules pass `None` and keep
    /// their status untouched. The claim marker is cleared in the same
    /// statement.
    #[instrument(skip(self, now, outcome, new_status))]
    pub fn record_run(
        &self,
        id: &str,
        now: DateTime<Utc>,
        outcome: &RunOutcome,
        new_status: Option<ScheduleStatus>,
    ) -> Result<()> {
        let now_str = now.to_rfc3339();
        let outcome_json = serde_json::to_string(outcome)?;
        let db = self.db.lock().unwrap();
        let n = match new_status {
            Some(status) => db.execute(
                "UPDATE schedules
                 SET last_run_at = ?2, last_run_result = ?3, status = ?4,
                     running_since = NULL, updated_at = ?2
                 WHERE id = ?1",
                rusqlite::params![id, now_str, outcome_json, status.to_string()],
            )?,
            None => db.execute(
                "UPDATE schedules
                 SET last_run_at = ?2, last_run_result = ?3,
                     running_since = NULL, updated_at = ?2
                 WHERE id = ?1",
                rusqlite::params![id, now_str, outcome_json],
            )?,
        };
        if n == 0 {
            return Err(StoreError::NotFound { id: id.to_string() });
        }
        debug!(schedule_id = %id, errors = outcome.errors.len(), "run recorded");
        Ok(())
    }
}

/// Map a SQLite row to its raw column tuple.
fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleRow> {
    Ok((
        row.get::<_, String>(0)?,          // id
        row.get::<_, String>(1)?,          // project_id
        row.get::<_, String>(2)?,          // kind
        row.get::<_, Option<String>>(3)?,  // cron_time
        row.get::<_, Option<String>>(4)?,  // scheduled_at
        row.get::<_, bool>(5)?,            // enabled
        row.get::<_, String>(6)?,          // status
        row.get::<_, String>(7)?,          // actions JSON
        row.get::<_, u32>(8)?,             // max_urls
        row.get::<_, Option<String>>(9)?,  // running_since
        row.get::<_, Option<String>>(10)?, // last_run_at
        row.get::<_, Option<String>>(11)?, // last_run_result JSON
        row.get::<_, String>(12)?,         // created_at
        row.get::<_, String>(13)?,         // updated_at
    ))
}

/// Decode a raw row into a schedule. Rows with corrupt enum or JSON columns
/// are dropped with a warning rather than failing the whole query.
fn decode_row(raw: ScheduleRow) -> Option<IndexingSchedule> {
    let (
        id,
        project_id,
        kind_str,
        cron_time,
        scheduled_at,
        enabled,
        status_str,
        actions_json,
        max_urls,
        running_since,
        last_run_at,
        result_json,
        created_at,
        updated_at,
    ) = raw;

    let kind: ScheduleKind = match kind_str.parse() {
        Ok(k) => k,
        Err(e) => {
            warn!(schedule_id = %id, "dropping row: {e}");
            return None;
        }
    };
    let status: ScheduleStatus = match status_str.parse() {
        Ok(s) => s,
        Err(e) => {
            warn!(schedule_id = %id, "dropping row: {e}");
            return None;
        }
    };
    let actions: Vec<ActionKind> = match serde_json::from_str(&actions_json) {
        Ok(a) => a,
        Err(e) => {
            warn!(schedule_id = %id, "dropping row: bad actions JSON: {e}");
            return None;
        }
    };
    // A corrupt stored outcome loses only the last result, not the schedule.
    let last_run_result: Option<RunOutcome> = result_json.and_then(|s| {
        serde_json::from_str(&s)
            .map_err(|e| warn!(schedule_id = %id, "ignoring stored outcome: {e}"))
            .ok()
    });

    Some(IndexingSchedule {
        id,
        project_id,
        kind,
        cron_time,
        scheduled_at: scheduled_at.as_deref().and_then(parse_ts),
        enabled,
        status,
        actions,
        max_urls,
        running_since: running_since.as_deref().and_then(parse_ts),
        last_run_at: last_run_at.as_deref().and_then(parse_ts),
        last_run_result,
        created_at,
        updated_at,
    })
}

/// Parse an RFC 3339 timestamp column written by this store. Unparseable
/// values are treated as absent.
fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("bad timestamp column {s:?}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionRecord;
    use chrono::Duration;

    fn test_store() -> ScheduleStore {
        let conn = Connection::open_in_memory().expect("in-memory db");
        crate::db::init_db(&conn).expect("init schema");
        ScheduleStore::new(conn)
    }

    fn cron(store: &ScheduleStore, time: &str) -> IndexingSchedule {
        store
            .create(
                NewSchedule::cron("proj-1", time, vec![ActionKind::Indexing]),
                200,
            )
            .expect("create cron schedule")
    }

    fn manual(store: &ScheduleStore, offset: Duration) -> IndexingSchedule {
        store
            .create(
                NewSchedule::manual("proj-1", Utc::now() + offset, vec![ActionKind::Indexing]),
                200,
            )
            .expect("create manual schedule")
    }

    #[test]
    fn create_and_get_round_trip() {
        let store = test_store();
        let created = store
            .create(
                NewSchedule::cron(
                    "proj-42",
                    "09:00",
                    vec![ActionKind::Inspection, ActionKind::Indexing],
                )
                .with_max_urls(50),
                200,
            )
            .unwrap();

        let fetched = store.get(&created.id).unwrap().expect("schedule exists");
        assert_eq!(fetched.project_id, "proj-42");
        assert_eq!(fetched.kind, ScheduleKind::Cron);
        assert_eq!(fetched.cron_time.as_deref(), Some("09:00"));
        assert_eq!(fetched.status, ScheduleStatus::Active);
        assert!(fetched.enabled);
        assert_eq!(
            fetched.actions,
            vec![ActionKind::Inspection, ActionKind::Indexing]
        );
        assert_eq!(fetched.max_urls, 50);
        assert!(fetched.last_run_at.is_none());
        assert!(fetched.running_since.is_none());
    }

    #[test]
    fn get_unknown_returns_none() {
        let store = test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn create_applies_default_max_urls() {
        let store = test_store();
        let s = cron(&store, "09:00");
        assert_eq!(s.max_urls, 200);
    }

    #[test]
    fn create_preserves_duplicate_actions_in_order() {
        let store = test_store();
        let actions = vec![
            ActionKind::Indexing,
            ActionKind::Indexing,
            ActionKind::Inspection,
        ];
        let created = store
            .create(NewSchedule::cron("proj-1", "09:00", actions.clone()), 200)
            .unwrap();
        let fetched = store.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.actions, actions);
    }

    #[test]
    fn create_validates_input() {
        let store = test_store();

        let empty = store.create(NewSchedule::cron("p", "09:00", vec![]), 200);
        assert!(matches!(empty, Err(StoreError::InvalidSchedule(_))));

        let bad_time = store.create(NewSchedule::cron("p", "25:00", vec![ActionKind::Indexing]), 200);
        assert!(bad_time.is_err());

        let zero_cap = store.create(
            NewSchedule::cron("p", "09:00", vec![ActionKind::Indexing]).with_max_urls(0),
            200,
        );
        assert!(zero_cap.is_err());

        let mut no_time = NewSchedule::manual("p", Utc::now(), vec![ActionKind::Indexing]);
        no_time.scheduled_at = None;
        assert!(store.create(no_time, 200).is_err());
    }

    #[test]
    fn due_manual_selects_only_arrived_pending() {
        let store = test_store();
        let due = manual(&store, Duration::minutes(-5));
        let _future = manual(&store, Duration::minutes(5));
        let _cron = cron(&store, "09:00");

        let selected = store.due_manual(Utc::now()).unwrap();
        let ids: Vec<_> = selected.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![due.id.as_str()]);
    }

    #[test]
    fn due_manual_ignores_terminal_schedules() {
        let store = test_store();
        let s = manual(&store, Duration::minutes(-5));
        store
            .record_run(
                &s.id,
                Utc::now(),
                &RunOutcome::default(),
                Some(ScheduleStatus::Completed),
            )
            .unwrap();
        assert!(store.due_manual(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn due_manual_ignores_enabled_flag() {
        let store = test_store();
        let s = manual(&store, Duration::minutes(-5));
        store.set_enabled(&s.id, false).unwrap();
        assert_eq!(store.due_manual(Utc::now()).unwrap().len(), 1);
    }

    #[test]
    fn due_cron_honours_enabled_flag() {
        let store = test_store();
        let s = cron(&store, "09:00");
        assert_eq!(store.due_cron().unwrap().len(), 1);

        store.set_enabled(&s.id, false).unwrap();
        assert!(store.due_cron().unwrap().is_empty());

        store.set_enabled(&s.id, true).unwrap();
        assert_eq!(store.due_cron().unwrap().len(), 1);
    }

    #[test]
    fn claim_is_exclusive_until_released() {
        let store = test_store();
        let s = manual(&store, Duration::minutes(-5));
        let now = Utc::now();
        let stale = now - Duration::minutes(10);

        assert!(store.claim(&s.id, now, stale).unwrap());
        assert!(!store.claim(&s.id, now, stale).unwrap());

        store.release(&s.id).unwrap();
        assert!(store.claim(&s.id, now, stale).unwrap());
    }

    #[test]
    fn stale_claim_can_be_taken_over() {
        let store = test_store();
        let s = manual(&store, Duration::minutes(-30));
        let crashed_at = Utc::now() - Duration::hours(1);
        assert!(store
            .claim(&s.id, crashed_at, crashed_at - Duration::minutes(10))
            .unwrap());

        // An hour later the abandoned claim is past the cutoff.
        let now = Utc::now();
        assert!(store.claim(&s.id, now, now - Duration::minutes(10)).unwrap());
    }

    #[test]
    fn claim_refuses_terminal_schedules() {
        let store = test_store();
        let s = manual(&store, Duration::minutes(-5));
        store
            .record_run(
                &s.id,
                Utc::now(),
                &RunOutcome::failure("indexing: boom"),
                Some(ScheduleStatus::Failed),
            )
            .unwrap();
        let now = Utc::now();
        assert!(!store.claim(&s.id, now, now - Duration::minutes(10)).unwrap());
    }

    #[test]
    fn record_run_updates_bookkeeping_and_clears_claim() {
        let store = test_store();
        let s = cron(&store, "09:00");
        let now = Utc::now();
        assert!(store.claim(&s.id, now, now - Duration::minutes(10)).unwrap());

        let outcome = RunOutcome {
            actions: vec![ActionRecord {
                kind: ActionKind::Indexing,
                result: serde_json::json!({"submitted": 42}),
            }],
            errors: vec![],
        };
        store.record_run(&s.id, now, &outcome, None).unwrap();

        let fetched = store.get(&s.id).unwrap().unwrap();
        assert_eq!(fetched.status, ScheduleStatus::Active);
        assert!(fetched.running_since.is_none());
        assert_eq!(fetched.last_run_at, Some(now));
        let result = fetched.last_run_result.expect("outcome stored");
        assert!(result.is_success());
        assert_eq!(result.actions.len(), 1);
    }

    #[test]
    fn record_run_keeps_failure_outcome() {
        let store = test_store();
        let s = manual(&store, Duration::minutes(-5));
        let outcome = RunOutcome::failure("indexing: quota exceeded");
        store
            .record_run(&s.id, Utc::now(), &outcome, Some(ScheduleStatus::Failed))
            .unwrap();

        let fetched = store.get(&s.id).unwrap().unwrap();
        assert_eq!(fetched.status, ScheduleStatus::Failed);
        assert!(fetched.last_run_at.is_some());
        let result = fetched.last_run_result.expect("outcome stored");
        assert_eq!(result.errors, vec!["indexing: quota exceeded".to_string()]);
    }

    #[test]
    fn record_run_unknown_id_is_not_found() {
        let store = test_store();
        let err = store
            .record_run("nope", Utc::now(), &RunOutcome::default(), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn delete_removes_schedule() {
        let store = test_store();
        let s = cron(&store, "09:00");
        store.delete(&s.id).unwrap();
        assert!(store.get(&s.id).unwrap().is_none());
        assert!(matches!(
            store.delete(&s.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn list_for_project_scopes_by_project() {
        let store = test_store();
        store
            .create(
                NewSchedule::cron("proj-a", "09:00", vec![ActionKind::Indexing]),
                200,
            )
            .unwrap();
        store
            .create(
                NewSchedule::cron("proj-a", "18:00", vec![ActionKind::Inspection]),
                200,
            )
            .unwrap();
        store
            .create(
                NewSchedule::cron("proj-b", "12:00", vec![ActionKind::Indexing]),
                200,
            )
            .unwrap();

        assert_eq!(store.list_for_project("proj-a").unwrap().len(), 2);
        assert_eq!(store.list_for_project("proj-b").unwrap().len(), 1);
        assert!(store.list_for_project("proj-c").unwrap().is_empty());
    }
}
