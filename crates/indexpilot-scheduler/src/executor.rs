use tracing::{debug, warn};

use indexpilot_indexing::{IndexingService, SubmitRequest};
use indexpilot_store::{ActionRecord, IndexingSchedule, RunOutcome};

/// Execute every configured action for `schedule`, in list order.
///
/// Failures are isolated per action: a failed action contributes a
/// `"{action}: {message}"` error entry and execution moves on to the next
/// one. The function itself never fails; the caller always gets an outcome
/// it can record.
pub async fn run_actions(service: &dyn IndexingService, schedule: &IndexingSchedule) -> RunOutcome {
    let mut outcome = RunOutcome::default();

    for kind in &schedule.actions {
        let req = SubmitRequest {
            project_id: schedule.project_id.clone(),
            action: *kind,
            max_urls: schedule.max_urls,
        };
        match service.submit(&req).await {
            Ok(result) => {
                debug!(schedule_id = %schedule.id, action = %kind, "action succeeded");
                outcome.actions.push(ActionRecord {
                    kind: *kind,
                    result,
                });
            }
            Err(e) => {
                warn!(schedule_id = %schedule.id, action = %kind, "action failed: {e}");
                outcome.errors.push(format!("{kind}: {e}"));
            }
        }
    }

    outcome
}
