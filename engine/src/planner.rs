//! Plan construction.
//!
//! This module turns a project tree into an ordered list of backup actions:
//! - Collecting file entries in pre-order
//! - Building sanitized, `/`-separated destination paths
//! - Detecting destination collisions between supported files

use std::collections::HashMap;
use std::path::Path;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use crate::error::EngineError;
use crate::model::{
    ActionState, BackupAction, BackupOptions, BackupPlan, FileEntry, FolderId, PlanState,
    ProjectTree,
};
use crate::sanitize::{sanitize_file_name, REPLACEMENT};

/// Collect every file under `folder` in pre-order.
///
/// A folder's own files come before the files of its subfolders, and
/// subfolders are visited in the order the host supplied them.
pub fn collect_files(tree: &ProjectTree, folder: FolderId) -> Vec<&FileEntry> {
    let mut files = Vec::new();

    fn recurse<'t>(tree: &'t ProjectTree, folder: FolderId, files: &mut Vec<&'t FileEntry>) {
        let node = tree.folder(folder);
        files.extend(node.files.iter().map(|&id| tree.file(id)));
        for &child in &node.folders {
            recurse(tree, child, files);
        }
    }

    recurse(tree, folder, &mut files);
    files
}

/// Destination of `file` relative to the backup root.
///
/// Ancestor folder names, the file name and the extension all pass through
/// the sanitizer, so the result never contains a backslash. Segments that
/// would name the current or parent directory are replaced as well, so the
/// result always stays below the root.
pub fn relative_path(tree: &ProjectTree, file: &FileEntry) -> String {
    let mut segments: Vec<String> = tree
        .ancestor_names(file.parent)
        .into_iter()
        .map(path_segment)
        .collect();

    segments.push(leaf_name(file));
    segments.join("/")
}

/// Sanitized `name.extension` of `file`, with no dot when the extension is empty.
pub fn leaf_name(file: &FileEntry) -> String {
    if file.extension.is_empty() {
        path_segment(&file.name)
    } else {
        format!(
            "{}.{}",
            sanitize_file_name(&file.name),
            sanitize_file_name(&file.extension)
        )
    }
}

/// Sanitize one path segment. Empty, `.` and `..` become underscores.
fn path_segment(name: &str) -> String {
    let sanitized = sanitize_file_name(name);
    match sanitized.as_ref() {
        "" | "." | ".." => REPLACEMENT.repeat(sanitized.len().max(1)),
        _ => sanitized.into_owned(),
    }
}

/// Create a new backup plan for `tree` into `destination`.
///
/// The destination may not exist yet; it is created when the plan runs.
///
/// # Errors
/// Returns EngineError if the destination path is empty or names a file.
pub fn create_backup<P: AsRef<Path>>(
    tree: &ProjectTree,
    destination: P,
    options: BackupOptions,
) -> Result<BackupPlan, EngineError> {
    let destination = destination.as_ref();

    if destination.as_os_str().is_empty() {
        return Err(EngineError::DestinationUnavailable {
            path: destination.to_path_buf(),
            reason: "destination path is empty".to_string(),
        });
    }

    if destination.is_file() {
        return Err(EngineError::DestinationUnavailable {
            path: destination.to_path_buf(),
            reason: "destination is a file".to_string(),
        });
    }

    Ok(BackupPlan {
        id: Uuid::new_v4(),
        project_name: tree.name().to_string(),
        destination_root: destination.to_path_buf(),
        options,
        actions: Vec::new(),
        state: PlanState::Pending,
        planned: false,
        created_at: Utc::now(),
        started_at: None,
        finished_at: None,
    })
}

/// Plan a backup by walking the project tree.
///
/// Populates `plan.actions` with one Pending action per file, in collection
/// order, and marks later supported actions that share a destination with an
/// earlier one.
///
/// # Errors
/// Returns EngineError if the plan was already planned or has started.
pub fn plan_backup(plan: &mut BackupPlan, tree: &ProjectTree) -> Result<(), EngineError> {
    if plan.state != PlanState::Pending || plan.planned {
        return Err(EngineError::InvalidState(format!(
            "plan must be Pending and unplanned to plan; current state: {:?}, planned: {}",
            plan.state, plan.planned
        )));
    }

    let mut claimed: HashMap<String, usize> = HashMap::new();
    let mut actions = Vec::with_capacity(tree.file_count());

    for (index, file) in collect_files(tree, tree.root()).into_iter().enumerate() {
        let relative_path = relative_path(tree, file);
        let absolute_path = plan.destination_root.join(&relative_path);

        let collides_with = if plan.options.is_supported(&file.extension) {
            match claimed.get(&relative_path) {
                Some(&first) => Some(first),
                None => {
                    claimed.insert(relative_path.clone(), index);
                    None
                }
            }
        } else {
            None
        };

        if let Some(first) = collides_with {
            debug!(path = %relative_path, first, index, "Destination collision");
        }

        actions.push(BackupAction {
            sanitized_name: sanitize_file_name(&file.name).into_owned(),
            file: file.clone(),
            relative_path,
            absolute_path,
            state: ActionState::Pending,
            error: None,
            collides_with,
        });
    }

    info!(
        project = %plan.project_name,
        actions = actions.len(),
        destination = %plan.destination_root.display(),
        "Backup planned"
    );

    plan.actions = actions;
    plan.planned = true;
    Ok(())
}
