//! Core data model for backup plans.
//!
//! This module defines the structures the planner works on:
//! - ProjectTree / ProjectFolder / FileEntry: the host-supplied project tree
//! - BackupPlan / BackupAction: the planned exports and their outcomes
//! - ActionState, PlanState, CollisionPolicy, BackupOptions: behavior knobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ActionError;

/// Index of a folder inside a [`ProjectTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderId(usize);

/// Index of a file inside a [`ProjectTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

/// A folder node of the project tree.
#[derive(Debug, Clone)]
pub struct ProjectFolder {
    pub id: FolderId,
    pub name: String,
    pub is_root: bool,
    /// Parent folder; `None` only for the root
    pub parent: Option<FolderId>,
    /// Child folders in host order
    pub folders: Vec<FolderId>,
    /// Files directly in this folder, in host order
    pub files: Vec<FileId>,
}

/// One backable design file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: FileId,
    /// Display name without extension
    pub name: String,
    /// Extension as reported by the host (compared case-insensitively)
    pub extension: String,
    /// Owning folder (back-reference only)
    pub parent: FolderId,
    /// Opaque key the document service uses to find the file; the
    /// filesystem host stores the full path, byte for byte
    pub locator: OsString,
}

/// A project's folder tree, as supplied by the host.
///
/// Folders and files live in flat arenas and refer to each other by id.
#[derive(Debug, Clone)]
pub struct ProjectTree {
    name: String,
    folders: Vec<ProjectFolder>,
    files: Vec<FileEntry>,
}

impl ProjectTree {
    /// Create a tree holding only the root folder.
    pub fn new(project_name: impl Into<String>) -> Self {
        let name = project_name.into();
        ProjectTree {
            folders: vec![ProjectFolder {
                id: FolderId(0),
                name: name.clone(),
                is_root: true,
                parent: None,
                folders: Vec::new(),
                files: Vec::new(),
            }],
            files: Vec::new(),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> FolderId {
        FolderId(0)
    }

    /// Append a child folder to `parent` and return its id.
    pub fn add_folder(&mut self, parent: FolderId, name: impl Into<String>) -> FolderId {
        let id = FolderId(self.folders.len());
        self.folders.push(ProjectFolder {
            id,
            name: name.into(),
            is_root: false,
            parent: Some(parent),
            folders: Vec::new(),
            files: Vec::new(),
        });
        self.folders[parent.0].folders.push(id);
        id
    }

    /// Append a file to `parent` and return its id.
    pub fn add_file(
        &mut self,
        parent: FolderId,
        name: impl Into<String>,
        extension: impl Into<String>,
        locator: impl Into<OsString>,
    ) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(FileEntry {
            id,
            name: name.into(),
            extension: extension.into(),
            parent,
            locator: locator.into(),
        });
        self.folders[parent.0].files.push(id);
        id
    }

    pub fn folder(&self, id: FolderId) -> &ProjectFolder {
        &self.folders[id.0]
    }

    pub fn file(&self, id: FileId) -> &FileEntry {
        &self.files[id.0]
    }

    /// Total number of files across all folders.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Names of the non-root ancestors of `folder`, root-to-leaf.
    pub fn ancestor_names(&self, folder: FolderId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = Some(folder);
        while let Some(id) = current {
            let node = self.folder(id);
            if node.is_root {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names
    }
}

/// State of one planned export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionState {
    /// Not yet processed
    Pending,
    /// Extension is not in the supported set
    SkippedUnsupported,
    /// Destination already present (or claimed by an earlier action)
    SkippedExists,
    /// Exported
    Succeeded,
    /// Some step of the export failed
    Failed,
}

impl ActionState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionState::Pending)
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionState::Pending => "Pending",
            ActionState::SkippedUnsupported => "Skipped (unsupported)",
            ActionState::SkippedExists => "Skipped (exists)",
            ActionState::Succeeded => "Succeeded",
            ActionState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// One (source file, destination) pair of a plan.
#[derive(Debug, Clone)]
pub struct BackupAction {
    pub file: FileEntry,
    /// Sanitized display name, used in messages and failure lists
    pub sanitized_name: String,
    /// Destination relative to the backup root, always `/`-separated
    pub relative_path: String,
    /// Destination root joined with `relative_path`
    pub absolute_path: PathBuf,
    pub state: ActionState,
    /// Set when the action ends in `Failed`
    pub error: Option<ActionError>,
    /// Index of an earlier supported action with the same destination
    pub collides_with: Option<usize>,
}

/// State of a whole backup plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanState {
    /// Created, not yet run
    Pending,
    /// Currently executing
    Running,
    /// Every action reached a terminal state
    Completed,
    /// Stopped by a cancellation request; some actions remain Pending
    Canceled,
}

/// What to do with an action whose destination equals an earlier one's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Keep the first; later ones are marked SkippedExists
    #[default]
    FirstWins,
    /// Keep the first; later ones are marked Failed
    Fail,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionPolicy::FirstWins => write!(f, "first-wins"),
            CollisionPolicy::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first-wins" | "first" | "skip" => Ok(CollisionPolicy::FirstWins),
            "fail" => Ok(CollisionPolicy::Fail),
            other => Err(format!(
                "unknown collision policy '{other}' (expected first-wins or fail)"
            )),
        }
    }
}

/// Extensions exported when no other set is configured.
pub const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &["f3d", "f3z"];

/// Planner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOptions {
    /// Lowercase extensions without a leading dot
    pub supported_extensions: BTreeSet<String>,
    pub collision_policy: CollisionPolicy,
}

impl Default for BackupOptions {
    fn default() -> Self {
        BackupOptions::with_extensions(DEFAULT_SUPPORTED_EXTENSIONS.iter().copied())
    }
}

impl BackupOptions {
    /// Build options from an extension list, normalizing case and dots.
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let supported_extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        BackupOptions {
            supported_extensions,
            collision_policy: CollisionPolicy::default(),
        }
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn is_supported(&self, extension: &str) -> bool {
        self.supported_extensions.contains(&extension.to_lowercase())
    }
}

/// A backup of one project into one destination root.
#[derive(Debug)]
pub struct BackupPlan {
    /// Unique identifier for this plan
    pub id: Uuid,

    /// Project name, for reporting
    pub project_name: String,

    /// Root folder all relative paths are resolved against
    pub destination_root: PathBuf,

    pub options: BackupOptions,

    /// Planned actions in collection order
    pub actions: Vec<BackupAction>,

    pub state: PlanState,

    /// True once `plan_backup` populated `actions`
    pub planned: bool,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BackupPlan {
    /// Number of actions currently in `state`.
    pub fn count(&self, state: ActionState) -> usize {
        self.actions.iter().filter(|a| a.state == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_tracks_children_in_insertion_order() {
        let mut tree = ProjectTree::new("Gearbox");
        let root = tree.root();
        let a = tree.add_folder(root, "A");
        let b = tree.add_folder(root, "B");
        let f = tree.add_file(a, "Shaft", "f3d", "urn:1");

        assert!(tree.folder(root).is_root);
        assert_eq!(tree.folder(root).folders, vec![a, b]);
        assert_eq!(tree.folder(a).files, vec![f]);
        assert_eq!(tree.file(f).parent, a);
        assert_eq!(tree.file_count(), 1);
        assert_eq!(tree.name(), "Gearbox");
    }

    #[test]
    fn test_ancestor_names_skip_root() {
        let mut tree = ProjectTree::new("Gearbox");
        let sub = tree.add_folder(tree.root(), "Sub");
        let leaf = tree.add_folder(sub, "Folder");

        assert_eq!(tree.ancestor_names(leaf), vec!["Sub", "Folder"]);
        assert!(tree.ancestor_names(tree.root()).is_empty());
    }

    #[test]
    fn test_options_normalize_extensions() {
        let options = BackupOptions::with_extensions([".F3D", " step ", ""]);

        assert!(options.is_supported("f3d"));
        assert!(options.is_supported("F3d"));
        assert!(options.is_supported("STEP"));
        assert!(!options.is_supported("f3z"));
        assert_eq!(options.supported_extensions.len(), 2);
    }

    #[test]
    fn test_default_options_support_design_formats() {
        let options = BackupOptions::default();
        assert!(options.is_supported("f3d"));
        assert!(options.is_supported("F3Z"));
        assert!(!options.is_supported("txt"));
        assert_eq!(options.collision_policy, CollisionPolicy::FirstWins);
    }

    #[test]
    fn test_collision_policy_parsing() {
        assert_eq!("First-Wins".parse::<CollisionPolicy>(), Ok(CollisionPolicy::FirstWins));
        assert_eq!("fail".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Fail));
        let err = "rename".parse::<CollisionPolicy>().expect_err("rename is not a policy");
        assert!(err.contains("rename"));
        assert_eq!(
            CollisionPolicy::Fail.to_string().parse::<CollisionPolicy>(),
            Ok(CollisionPolicy::Fail)
        );
    }

    #[test]
    fn test_only_pending_is_not_terminal() {
        assert!(!ActionState::Pending.is_terminal());
        assert!(ActionState::SkippedUnsupported.is_terminal());
        assert!(ActionState::SkippedExists.is_terminal());
        assert!(ActionState::Succeeded.is_terminal());
        assert!(ActionState::Failed.is_terminal());
    }
}
