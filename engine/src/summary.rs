//! Run summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ActionError, ActionStep};
use crate::model::{ActionState, BackupPlan};

/// One failed file, in plan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    /// Sanitized display name
    pub file_name: String,
    pub relative_path: String,
    pub step: ActionStep,
    pub error_name: String,
    pub message: String,
}

/// Totals for a finished (or canceled) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub plan_id: Uuid,
    pub project_name: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped_unsupported: usize,
    pub skipped_exists: usize,
    /// Actions never reached because the run was canceled
    pub pending: usize,
    pub failures: Vec<FailedFile>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BackupSummary {
    pub fn from_plan(plan: &BackupPlan) -> Self {
        let failures = plan
            .actions
            .iter()
            .filter(|a| a.state == ActionState::Failed)
            .map(|a| {
                let error = a.error.clone().unwrap_or_else(|| ActionError {
                    step: ActionStep::Export,
                    name: "Unknown".to_string(),
                    message: "unknown error".to_string(),
                });
                FailedFile {
                    file_name: a.sanitized_name.clone(),
                    relative_path: a.relative_path.clone(),
                    step: error.step,
                    error_name: error.name,
                    message: error.message,
                }
            })
            .collect();

        BackupSummary {
            plan_id: plan.id,
            project_name: plan.project_name.clone(),
            total: plan.actions.len(),
            succeeded: plan.count(ActionState::Succeeded),
            failed: plan.count(ActionState::Failed),
            skipped_unsupported: plan.count(ActionState::SkippedUnsupported),
            skipped_exists: plan.count(ActionState::SkippedExists),
            pending: plan.count(ActionState::Pending),
            failures,
            started_at: plan.started_at,
            finished_at: plan.finished_at,
        }
    }

    /// Number of issues shown to the user.
    pub fn issues(&self) -> usize {
        self.failed
    }

    /// Names of the failed files, in plan order.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.file_name.as_str()).collect()
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "summary", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every action reached a terminal state
    Completed(BackupSummary),
    /// The progress surface requested cancellation
    Canceled(BackupSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> &BackupSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::Canceled(summary) => summary,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, RunOutcome::Canceled(_))
    }
}
