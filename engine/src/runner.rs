//! Backup execution.
//!
//! `run_backup` walks a planned backup in order and drives the host for each
//! action. Skips and per-file failures are recorded on the action and never
//! stop the run; only cancellation or an unusable destination root does.

use std::path::Path;
use chrono::Utc;
use tracing::{debug, info, warn};
use crate::error::{ActionError, ActionStep, EngineError};
use crate::fs_ops;
use crate::host::DocumentService;
use crate::model::{
    ActionState, BackupAction, BackupOptions, BackupPlan, CollisionPolicy, PlanState,
};
use crate::progress::{step_message, ProgressCallback};
use crate::summary::{BackupSummary, RunOutcome};

/// Decide the terminal state of one action, calling the host only when the
/// file has to be exported.
fn process_action<D: DocumentService>(
    actions: &[BackupAction],
    index: usize,
    options: &BackupOptions,
    documents: &mut D,
) -> (ActionState, Option<ActionError>) {
    let action = &actions[index];

    if !options.is_supported(&action.file.extension) {
        debug!(file = %action.sanitized_name, extension = %action.file.extension, "Skipping unsupported file type");
        return (ActionState::SkippedUnsupported, None);
    }

    // A colliding destination written earlier in this run is not a
    // pre-existing file; the collision policy decides that action.
    let written_this_run = action
        .collides_with
        .is_some_and(|first| actions[first].state == ActionState::Succeeded);

    if action.absolute_path.exists() && !written_this_run {
        debug!(file = %action.sanitized_name, path = %action.relative_path, "Skipping existing file");
        return (ActionState::SkippedExists, None);
    }

    if let Some(first) = action.collides_with {
        let first_name = &actions[first].sanitized_name;
        return match options.collision_policy {
            CollisionPolicy::FirstWins => {
                debug!(file = %action.sanitized_name, first = %first_name, "Destination claimed by earlier file");
                (ActionState::SkippedExists, None)
            }
            CollisionPolicy::Fail => (
                ActionState::Failed,
                Some(ActionError {
                    step: ActionStep::Collision,
                    name: "DestinationCollision".to_string(),
                    message: format!(
                        "{} is already the destination of {}",
                        action.relative_path, first_name
                    ),
                }),
            ),
        };
    }

    match export_document(action, documents) {
        Ok(()) => (ActionState::Succeeded, None),
        Err(e) => (ActionState::Failed, Some(e)),
    }
}

/// Open, export and close one document.
///
/// Once `open` succeeded, `close` runs on every path. An export error takes
/// precedence over a close error.
fn export_document<D: DocumentService>(
    action: &BackupAction,
    documents: &mut D,
) -> Result<(), ActionError> {
    let handle = documents
        .open(&action.file)
        .map_err(|e| ActionError::from_host(ActionStep::Open, e))?;

    let exported = export_open_document(action, documents, &handle);
    let closed = documents
        .close(handle)
        .map_err(|e| ActionError::from_host(ActionStep::Close, e));

    match exported {
        Ok(()) => closed,
        Err(e) => {
            if let Err(close_err) = closed {
                warn!(file = %action.sanitized_name, error = %close_err, "Close failed after export error");
            }
            Err(e)
        }
    }
}

fn export_open_document<D: DocumentService>(
    action: &BackupAction,
    documents: &mut D,
    handle: &D::Handle,
) -> Result<(), ActionError> {
    documents
        .activate(handle)
        .map_err(|e| ActionError::from_host(ActionStep::Activate, e))?;
    documents
        .remove_links(handle)
        .map_err(|e| ActionError::from_host(ActionStep::RemoveLinks, e))?;

    let target_dir = action.absolute_path.parent().unwrap_or(Path::new(""));
    if !target_dir.as_os_str().is_empty() {
        fs_ops::ensure_dir(target_dir)
            .map_err(|e| ActionError::from_host(ActionStep::CreateDirectory, e.into()))?;
    }

    let format = action.file.extension.to_lowercase();
    documents
        .export(handle, target_dir, &format)
        .map_err(|e| ActionError::from_host(ActionStep::Export, e))
}

/// Run a planned backup.
///
/// Transitions the plan from Pending to Running to Completed (or Canceled).
/// Cancellation is polled from the progress callback before each action;
/// when requested, the remaining actions stay Pending.
///
/// # Errors
/// Returns EngineError if the plan is not planned or not Pending, or if the
/// destination root cannot be created. Per-file failures are recorded on
/// the actions instead.
pub fn run_backup<D: DocumentService>(
    plan: &mut BackupPlan,
    documents: &mut D,
    progress_callback: Option<&dyn ProgressCallback>,
) -> Result<RunOutcome, EngineError> {
    if plan.state != PlanState::Pending || !plan.planned {
        return Err(EngineError::InvalidState(format!(
            "plan must be planned and Pending to run; current state: {:?}, planned: {}",
            plan.state, plan.planned
        )));
    }

    fs_ops::ensure_dir(&plan.destination_root).map_err(|e| EngineError::DestinationUnavailable {
        path: plan.destination_root.clone(),
        reason: e.to_string(),
    })?;

    plan.state = PlanState::Running;
    plan.started_at = Some(Utc::now());
    info!(
        plan = %plan.id,
        project = %plan.project_name,
        actions = plan.actions.len(),
        "Backup started"
    );

    if let Some(callback) = progress_callback {
        callback.on_run_started(plan);
    }

    let total = plan.actions.len();
    let mut canceled = false;

    for index in 0..total {
        if progress_callback.is_some_and(|c| c.is_cancel_requested()) {
            info!(plan = %plan.id, processed = index, "Backup canceled");
            canceled = true;
            break;
        }

        if let Some(callback) = progress_callback {
            let message = step_message(index, total, &plan.actions[index].sanitized_name);
            callback.on_action_started(plan, index, &plan.actions[index], &message);
        }

        let (state, error) = process_action(&plan.actions, index, &plan.options, documents);

        let action = &mut plan.actions[index];
        if let Some(ref e) = error {
            warn!(file = %action.sanitized_name, error = %e, "Backup failed for file");
        } else if state == ActionState::Succeeded {
            debug!(file = %action.sanitized_name, path = %action.relative_path, "Backup completed for file");
        }
        action.state = state;
        action.error = error;

        if let Some(callback) = progress_callback {
            callback.on_action_completed(plan, index, &plan.actions[index]);
        }
    }

    plan.state = if canceled { PlanState::Canceled } else { PlanState::Completed };
    plan.finished_at = Some(Utc::now());

    let summary = BackupSummary::from_plan(plan);
    info!(
        plan = %plan.id,
        succeeded = summary.succeeded,
        failed = summary.failed,
        skipped_exists = summary.skipped_exists,
        skipped_unsupported = summary.skipped_unsupported,
        pending = summary.pending,
        "Backup finished"
    );

    let outcome = if canceled {
        RunOutcome::Canceled(summary)
    } else {
        RunOutcome::Completed(summary)
    };

    if let Some(callback) = progress_callback {
        callback.on_run_finished(plan, &outcome);
    }

    Ok(outcome)
}
