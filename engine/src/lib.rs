//! # BackUP Engine - Project Backup Library
//!
//! A headless engine that exports every supported design file of a project
//! to a destination folder, mirroring the project's folder hierarchy.
//! The CAD host (or the bundled filesystem stand-in) is reached through
//! traits, so the same planner drives any UI.
//!
//! ## Overview
//!
//! - Pre-order enumeration of the project tree
//! - Filename sanitizing and `/`-separated destination paths
//! - Skip policy for unsupported formats and existing destinations
//! - Named collision policy for files mapping to the same destination
//! - Per-file error isolation, cancellation and a final summary
//!
//! ## Basic Usage
//!
//! ```no_run
//! use backup_engine::{
//!     create_backup, load_project_tree, plan_backup, run_backup, BackupOptions,
//!     FsDocumentService,
//! };
//!
//! # use std::path::Path;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = load_project_tree(Path::new("projects/gearbox"))?;
//!
//! let mut plan = create_backup(&tree, "backups/gearbox", BackupOptions::default())?;
//! plan_backup(&mut plan, &tree)?;
//! println!("Will process {} files", plan.actions.len());
//!
//! let outcome = run_backup(&mut plan, &mut FsDocumentService::new(), None)?;
//! println!("{} succeeded", outcome.summary().succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Project tree, plan and action types
//! - **error**: Run-level and per-file error types
//! - **sanitize**: Filename sanitizer
//! - **planner**: Tree collection, path building, plan creation
//! - **runner**: Plan execution
//! - **host**: Document service trait
//! - **progress**: Progress callback trait and cancellation token
//! - **summary**: Run summaries and outcomes
//! - **fs_ops**: Filesystem project loader and document service

pub mod model;
pub mod error;
pub mod sanitize;
pub mod planner;
pub mod runner;
pub mod host;
pub mod progress;
pub mod summary;
pub mod fs_ops;

// Re-export main types and functions
pub use model::{
    ActionState, BackupAction, BackupOptions, BackupPlan, CollisionPolicy, FileEntry, FileId,
    FolderId, PlanState, ProjectFolder, ProjectTree, DEFAULT_SUPPORTED_EXTENSIONS,
};
pub use error::{ActionError, ActionStep, EngineError, HostError};
pub use sanitize::sanitize_file_name;
pub use planner::{collect_files, create_backup, plan_backup, relative_path};
pub use runner::run_backup;
pub use host::DocumentService;
pub use progress::{step_message, CancelToken, ProgressCallback};
pub use summary::{BackupSummary, FailedFile, RunOutcome};
pub use fs_ops::{load_project_tree, FsDocumentService};
