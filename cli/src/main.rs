//! BackUP - Command-line interface for the project backup engine.
//!
//! Backs up a project directory with the filesystem host: every supported
//! design file is copied into the destination under its sanitized name,
//! mirroring the folder hierarchy. Progress and the final summary go to
//! stderr; `--dry-run` prints the plan to stdout instead.

mod config;
mod logging;

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use backup_engine::{
    create_backup, load_project_tree, plan_backup, run_backup, BackupAction, BackupOptions,
    BackupPlan, CollisionPolicy, FsDocumentService, ProgressCallback, RunOutcome,
};
use config::BackupConfig;

/// BackUP - Back up every design file of a project
#[derive(Parser, Debug)]
#[command(name = "project-backup")]
#[command(version = "0.1.0")]
#[command(about = "Export all supported project files, preserving the folder hierarchy")]
struct Args {
    /// Project directory to back up
    #[arg(long, value_name = "PATH")]
    project: PathBuf,

    /// Destination root directory
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// TOML config file (supported_extensions, collision_policy)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Supported extension; repeat to list several (overrides the config file)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Collision policy: first-wins or fail (overrides the config file)
    #[arg(long, value_name = "POLICY")]
    collision: Option<String>,

    /// Print the plan without exporting anything
    #[arg(long)]
    dry_run: bool,

    /// Write the run summary as JSON to this file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,
}

/// CLI implementation of ProgressCallback for displaying backup progress
struct CliProgress {
    verbose: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
        }
    }

    fn format_duration(elapsed: std::time::Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(done: usize, total: usize) -> String {
        let percent = if total == 0 { 100 } else { done * 100 / total };
        let filled = percent / 5;
        format!(
            "[{}{}] {}/{}",
            "=".repeat(filled),
            " ".repeat(20 - filled),
            done,
            total
        )
    }
}

impl ProgressCallback for CliProgress {
    fn on_run_started(&self, plan: &BackupPlan) {
        eprintln!("Backing up project '{}'...", plan.project_name);
        eprintln!("  Destination: {}", plan.destination_root.display());
        eprintln!("  Files: {}", plan.actions.len());
        eprintln!();
    }

    fn on_action_started(&self, _plan: &BackupPlan, _index: usize, _action: &BackupAction, message: &str) {
        if self.verbose {
            eprintln!("{}", message);
        }
    }

    fn on_action_completed(&self, plan: &BackupPlan, index: usize, action: &BackupAction) {
        if self.verbose {
            eprintln!("[{:3}] {}: {}", index, action.state, action.relative_path);
        } else {
            eprint!("\rProgress: {}", Self::print_progress_bar(index + 1, plan.actions.len()));
            let _ = std::io::Write::flush(&mut std::io::stderr());
        }
    }

    fn on_run_finished(&self, _plan: &BackupPlan, outcome: &RunOutcome) {
        let summary = outcome.summary();
        eprintln!();
        if outcome.is_canceled() {
            eprintln!("Backup operation canceled by user.");
        } else if summary.issues() == 0 {
            eprintln!("Backup completed successfully with no issues.");
        } else {
            eprintln!("Backup completed with {} issues.", summary.issues());
        }

        eprintln!(
            "Summary: {} succeeded, {} already present, {} unsupported, {} failed, {} not processed",
            summary.succeeded,
            summary.skipped_exists,
            summary.skipped_unsupported,
            summary.failed,
            summary.pending
        );
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));

        if !summary.failures.is_empty() {
            eprintln!();
            eprintln!("Failed files:");
            for failure in &summary.failures {
                eprintln!("  {}: {} ({})", failure.file_name, failure.message, failure.step);
            }
        }
    }
}

/// Print one line per planned action.
fn print_plan(plan: &BackupPlan) {
    for (index, action) in plan.actions.iter().enumerate() {
        let supported = plan.options.is_supported(&action.file.extension);
        let note = match (supported, action.collides_with) {
            (false, _) => " (unsupported)".to_string(),
            (true, _) if action.absolute_path.exists() => " (exists)".to_string(),
            (true, Some(first)) => format!(" (collides with #{})", first),
            _ => String::new(),
        };
        println!("[{:3}] {}{}", index, action.relative_path, note);
    }
}

/// Parse and validate command-line arguments, then run the backup
fn main() {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    // 0: clean, 1: per-file failures or canceled, 2: run could not happen
    let exit_code = match run_cli(&args) {
        Ok(0) => 0,
        Ok(_) => 1,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
///
/// Returns the number of issues (failed files, or unprocessed files after a
/// cancellation).
fn run_cli(args: &Args) -> Result<usize, String> {
    let config = match &args.config {
        Some(path) => BackupConfig::load(path).map_err(|e| e.to_string())?,
        None => BackupConfig::default(),
    };

    let mut options = config.into_options();
    if !args.extensions.is_empty() {
        options = BackupOptions::with_extensions(&args.extensions)
            .collision_policy(options.collision_policy);
    }
    if let Some(policy) = &args.collision {
        let policy: CollisionPolicy = policy
            .parse()
            .map_err(|e| format!("Invalid collision policy: {}", e))?;
        options = options.collision_policy(policy);
    }
    if options.supported_extensions.is_empty() {
        return Err("No supported extensions configured".to_string());
    }

    let tree = load_project_tree(&args.project).map_err(|e| format!("Project load failed: {}", e))?;
    info!(
        project = %tree.name(),
        files = tree.file_count(),
        extensions = ?options.supported_extensions,
        collision_policy = %options.collision_policy,
        "Project loaded"
    );

    let mut plan = create_backup(&tree, &args.dst, options)
        .map_err(|e| format!("Backup creation failed: {}", e))?;
    plan_backup(&mut plan, &tree).map_err(|e| format!("Backup planning failed: {}", e))?;

    if args.dry_run {
        print_plan(&plan);
        return Ok(0);
    }

    let progress = CliProgress::new(args.verbose);
    let mut documents = FsDocumentService::new();
    let outcome = run_backup(&mut plan, &mut documents, Some(&progress))
        .map_err(|e| format!("Backup failed: {}", e))?;
    info!(exported = documents.exported(), canceled = outcome.is_canceled(), "Run finished");

    if let Some(report) = &args.report {
        let json = serde_json::to_string_pretty(&outcome)
            .map_err(|e| format!("Report serialization failed: {}", e))?;
        fs::write(report, json)
            .map_err(|e| format!("Failed to write report {}: {}", report.display(), e))?;
        info!(path = %report.display(), "Report written");
    }

    let summary = outcome.summary();
    Ok(summary.failed + summary.pending)
}
