#![forbid(unsafe_code)]

use crate::error::ToolError;
use crate::{Toolbox, WRITE_ROLES};
use pf_core::auth::UserContext;
use pf_storage::EscalateTaskRequest;
use tracing::{debug, info};

/// Result of one overdue sweep. `escalated + replayed` covers every overdue
/// task; replays are tasks a previous sweep already escalated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepOutcome {
    pub overdue: usize,
    pub escalated: usize,
    pub replayed: usize,
}

impl Toolbox {
    /// The scheduled-task runner's entrypoint. Safe to invoke any number of
    /// times: each task's escalation key is derived from its id, so the
    /// ledger collapses repeated sweeps onto a single escalation per task.
    pub fn escalate_overdue(
        &mut self,
        now_ms: i64,
        package_id: Option<&str>,
        user: &UserContext,
    ) -> Result<SweepOutcome, ToolError> {
        user.require_any(WRITE_ROLES)?;

        let overdue = self.store().list_overdue_tasks(now_ms, package_id)?;
        let mut escalated = 0usize;
        let mut replayed = 0usize;
        for task in &overdue {
            let outcome = self.store_mut().escalate_task(EscalateTaskRequest {
                task_id: task.id.clone(),
                now_ms,
                triggered_by: user.user_id().to_string(),
                correlation_id: None,
            })?;
            if outcome.replayed {
                replayed += 1;
                debug!(task_id = %task.id, "task already escalated");
            } else {
                escalated += 1;
                info!(
                    task_id = %task.id,
                    days_overdue = outcome.value.days_overdue,
                    event_id = %outcome.value.event.event_id(),
                    "task escalated"
                );
            }
        }

        info!(
            overdue = overdue.len(),
            escalated, replayed, "overdue sweep complete"
        );
        Ok(SweepOutcome {
            overdue: overdue.len(),
            escalated,
            replayed,
        })
    }
}
