//! Filesystem operations module.
//!
//! This module provides the standalone filesystem host:
//! - Loading a project tree from a directory on disk
//! - Creating destination directories idempotently
//! - `FsDocumentService`, which "exports" a document by copying the file
//!   under its sanitized name, preserving its modification time

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::error::{EngineError, HostError};
use crate::host::DocumentService;
use crate::model::{FileEntry, FolderId, ProjectTree};
use crate::planner::leaf_name;

/// Load the project tree rooted at `root`.
///
/// Subdirectories become folders and regular files become file entries,
/// both sorted by name so the host order is stable between runs. Symbolic
/// links are not followed. Each file's locator is its full path, kept as an
/// `OsString` so names that are not valid UTF-8 still resolve.
///
/// # Errors
/// Returns EngineError if the root is missing or any directory cannot be
/// read; no partial tree is returned.
pub fn load_project_tree(root: &Path) -> Result<ProjectTree, EngineError> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(EngineError::ProjectNotFound {
                path: root.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::ProjectNotFound {
                path: root.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(EngineError::EnumerationFailed {
                path: root.to_path_buf(),
                source: e,
            })
        }
    }

    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    let mut tree = ProjectTree::new(project_name);

    fn recurse(path: &Path, folder: FolderId, tree: &mut ProjectTree) -> Result<(), EngineError> {
        let enumeration_failed = |e: io::Error| EngineError::EnumerationFailed {
            path: path.to_path_buf(),
            source: e,
        };

        let mut entries = fs::read_dir(path)
            .map_err(enumeration_failed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(enumeration_failed)?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut subfolders = Vec::new();
        for entry in entries {
            let file_type = entry.file_type().map_err(enumeration_failed)?;
            let entry_path = entry.path();

            if file_type.is_dir() {
                subfolders.push(entry_path);
            } else if file_type.is_file() {
                let (name, extension) = split_file_name(&entry_path);
                tree.add_file(folder, name, extension, entry_path.as_os_str());
            } else {
                debug!(path = %entry_path.display(), "Skipping non-regular entry");
            }
        }

        for subfolder in subfolders {
            let name = subfolder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let child = tree.add_folder(folder, name);
            recurse(&subfolder, child, tree)?;
        }
        Ok(())
    }

    let root_folder = tree.root();
    recurse(root, root_folder, &mut tree)?;
    Ok(tree)
}

/// Split a path's file name into display name and extension.
fn split_file_name(path: &Path) -> (String, String) {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (name, extension)
}

/// Ensure `path` exists as a directory, creating it and its parents if needed.
///
/// Creating an existing directory is a no-op.
///
/// # Errors
/// Fails if `path` exists but is not a directory, or creation fails.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists but is not a directory", path.display()),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(path),
        Err(e) => Err(e),
    }
}

/// Copy `src` to `dst` without overwriting, preserving the modification time.
///
/// If the copy fails after `dst` was created, the partial file is removed so
/// a later run does not mistake it for a finished backup.
///
/// # Returns
/// Number of bytes copied
pub fn copy_new_file_with_mtime(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut src_file = fs::File::open(src)?;
    let src_mtime = src_file.metadata()?.modified().ok();

    let mut dst_file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dst)?;
    let copied = io::copy(&mut src_file, &mut dst_file)
        .and_then(|bytes| dst_file.sync_all().map(|()| bytes));
    let bytes_copied = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(dst_file);
            if let Err(remove_err) = fs::remove_file(dst) {
                warn!(path = %dst.display(), error = %remove_err, "Failed to remove partial copy");
            }
            return Err(e);
        }
    };
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// An open document of the filesystem host.
#[derive(Debug)]
pub struct FsDocument {
    source: PathBuf,
    file: FileEntry,
}

/// Document service over plain files.
///
/// `open` checks the file exists, `activate` and `remove_links` have nothing
/// to do, and `export` copies the file into the destination directory under
/// the same sanitized name the planner uses.
#[derive(Debug, Default)]
pub struct FsDocumentService {
    open_document: Option<PathBuf>,
    exported: usize,
}

impl FsDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents exported so far.
    pub fn exported(&self) -> usize {
        self.exported
    }
}

impl DocumentService for FsDocumentService {
    type Handle = FsDocument;

    fn open(&mut self, file: &FileEntry) -> Result<FsDocument, HostError> {
        if let Some(open) = &self.open_document {
            return Err(HostError::new(
                "DocumentBusy",
                format!("{} is still open", open.display()),
            ));
        }

        let source = PathBuf::from(&file.locator);
        let metadata = fs::metadata(&source)?;
        if !metadata.is_file() {
            return Err(HostError::new(
                "NotAFile",
                format!("{} is not a file", source.display()),
            ));
        }

        self.open_document = Some(source.clone());
        Ok(FsDocument {
            source,
            file: file.clone(),
        })
    }

    fn activate(&mut self, _handle: &FsDocument) -> Result<(), HostError> {
        Ok(())
    }

    fn remove_links(&mut self, _handle: &FsDocument) -> Result<(), HostError> {
        Ok(())
    }

    fn export(
        &mut self,
        handle: &FsDocument,
        destination_dir: &Path,
        format: &str,
    ) -> Result<(), HostError> {
        let target = destination_dir.join(leaf_name(&handle.file));
        let bytes = copy_new_file_with_mtime(&handle.source, &target)?;
        self.exported += 1;
        debug!(path = %target.display(), format, bytes, "Document exported");
        Ok(())
    }

    fn close(&mut self, handle: FsDocument) -> Result<(), HostError> {
        match self.open_document.take() {
            Some(open) if open == handle.source => Ok(()),
            other => {
                self.open_document = other;
                Err(HostError::new(
                    "NotOpen",
                    format!("{} is not the open document", handle.source.display()),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_flat_project() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("Gearbox");
        fs::create_dir(&src).expect("Failed to create src dir");

        fs::write(src.join("b.f3d"), b"b").expect("Failed to write b");
        fs::write(src.join("a.F3Z"), b"a").expect("Failed to write a");

        let tree = load_project_tree(&src).expect("Failed to load tree");

        assert_eq!(tree.name(), "Gearbox");
        assert_eq!(tree.file_count(), 2);
        let root = tree.folder(tree.root());
        let first = tree.file(root.files[0]);
        assert_eq!(first.name, "a");
        assert_eq!(first.extension, "F3Z");
        assert_eq!(PathBuf::from(&first.locator), src.join("a.F3Z"));
    }

    #[test]
    fn test_load_nested_project() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let subdir = src.join("Sub").join("Folder");
        fs::create_dir_all(&subdir).expect("Failed to create subdir");

        fs::write(src.join("Top.f3d"), b"1").expect("Failed to write top");
        fs::write(subdir.join("Deep.part.f3z"), b"2").expect("Failed to write deep");
        fs::write(subdir.join("README"), b"3").expect("Failed to write readme");

        let tree = load_project_tree(&src).expect("Failed to load tree");

        assert_eq!(tree.file_count(), 3);
        let sub = tree.folder(tree.root()).folders[0];
        assert_eq!(tree.folder(sub).name, "Sub");
        let folder = tree.folder(sub).folders[0];
        let names: Vec<_> = tree
            .folder(folder)
            .files
            .iter()
            .map(|&id| (tree.file(id).name.clone(), tree.file(id).extension.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Deep.part".to_string(), "f3z".to_string()),
                ("README".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_load_nonexistent_project() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = load_project_tree(&temp_dir.path().join("nonexistent"));
        assert!(matches!(result, Err(EngineError::ProjectNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_unreadable_subfolder_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let locked = src.join("Locked");
        fs::create_dir_all(&locked).expect("Failed to create subdir");
        fs::write(src.join("Top.f3d"), b"1").expect("Failed to write top");
        fs::write(locked.join("Hidden.f3d"), b"2").expect("Failed to write hidden");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))
            .expect("Failed to lock subdir");

        // Permission bits do not restrict root.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
                .expect("Failed to unlock subdir");
            return;
        }

        let result = load_project_tree(&src);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
            .expect("Failed to unlock subdir");

        match result {
            Err(EngineError::EnumerationFailed { path, source }) => {
                assert_eq!(path, locked);
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            other => panic!("Expected EnumerationFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_file_name_is_exported() {
        use crate::model::{ActionState, BackupOptions};
        use crate::planner::{create_backup, plan_backup};
        use crate::runner::run_backup;
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        let raw_name = OsStr::from_bytes(b"bad\xffname.f3d");
        fs::write(src.join(raw_name), b"part").expect("Failed to write source");

        let tree = load_project_tree(&src).expect("Failed to load tree");
        let file = tree.file(tree.folder(tree.root()).files[0]);
        assert_eq!(file.locator, src.join(raw_name).into_os_string());

        let dst = temp_dir.path().join("dst");
        let mut plan =
            create_backup(&tree, &dst, BackupOptions::default()).expect("Failed to create plan");
        plan_backup(&mut plan, &tree).expect("Failed to plan");
        let mut service = FsDocumentService::new();
        let outcome = run_backup(&mut plan, &mut service, None).expect("Failed to run");

        assert_eq!(plan.actions[0].state, ActionState::Succeeded);
        assert_eq!(outcome.summary().succeeded, 1);
        assert_eq!(service.exported(), 1);
        assert_eq!(
            fs::read(&plan.actions[0].absolute_path).expect("Missing export"),
            b"part"
        );
    }

    #[test]
    fn test_load_file_as_project_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("file.f3d");
        fs::write(&file, b"x").expect("Failed to write file");

        assert!(load_project_tree(&file).is_err());
    }

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("a").join("b");

        ensure_dir(&path).expect("First create should succeed");
        ensure_dir(&path).expect("Second create should be a no-op");
        assert!(path.is_dir());
    }

    #[test]
    fn test_ensure_dir_rejects_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("taken");
        fs::write(&path, b"x").expect("Failed to write file");

        assert!(ensure_dir(&path).is_err());
    }

    #[test]
    fn test_copy_new_file_never_overwrites() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("source.f3d");
        let dst = temp_dir.path().join("dest.f3d");

        let mut file = fs::File::create(&src).expect("Failed to create source");
        file.write_all(b"test content").expect("Failed to write source");
        drop(file);

        let bytes = copy_new_file_with_mtime(&src, &dst).expect("Failed to copy");
        assert_eq!(bytes, 12);
        assert_eq!(fs::read_to_string(&dst).expect("Failed to read dest"), "test content");

        let again = copy_new_file_with_mtime(&src, &dst);
        assert_eq!(
            again.expect_err("Second copy should fail").kind(),
            io::ErrorKind::AlreadyExists
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_copy_leaves_no_partial_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        // A directory opens fine on Linux but every read fails.
        let unreadable = temp_dir.path().join("folder.f3d");
        fs::create_dir(&unreadable).expect("Failed to create source dir");
        let dst = temp_dir.path().join("dest.f3d");

        let result = copy_new_file_with_mtime(&unreadable, &dst);

        assert!(result.is_err());
        assert!(!dst.exists(), "Partial destination must be removed");

        // With the destination gone, a retry from a good source succeeds.
        let good = temp_dir.path().join("good.f3d");
        fs::write(&good, b"part").expect("Failed to write source");
        copy_new_file_with_mtime(&good, &dst).expect("Retry should succeed");
        assert_eq!(fs::read(&dst).expect("Failed to read dest"), b"part");
    }

    #[test]
    fn test_fs_service_exports_under_sanitized_name() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("Part.f3d");
        let mut tree = ProjectTree::new("src");
        fs::write(&source, b"part").expect("Failed to write source");
        let id = tree.add_file(tree.root(), "Part A?", "f3d", &source);

        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst dir");

        let mut service = FsDocumentService::new();
        let handle = service.open(tree.file(id)).expect("Failed to open");
        service.activate(&handle).expect("Failed to activate");
        service.remove_links(&handle).expect("Failed to remove links");
        service.export(&handle, &dst, "f3d").expect("Failed to export");
        service.close(handle).expect("Failed to close");

        assert_eq!(fs::read(dst.join("Part A_.f3d")).expect("Missing export"), b"part");
        assert_eq!(service.exported(), 1);
    }

    #[test]
    fn test_fs_service_allows_one_open_document() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let a = temp_dir.path().join("a.f3d");
        let b = temp_dir.path().join("b.f3d");
        fs::write(&a, b"a").expect("Failed to write a");
        fs::write(&b, b"b").expect("Failed to write b");

        let mut tree = ProjectTree::new("p");
        let a_id = tree.add_file(tree.root(), "a", "f3d", &a);
        let b_id = tree.add_file(tree.root(), "b", "f3d", &b);

        let mut service = FsDocumentService::new();
        let handle = service.open(tree.file(a_id)).expect("Failed to open a");
        let busy = service.open(tree.file(b_id)).expect_err("Second open should fail");
        assert_eq!(busy.name, "DocumentBusy");

        service.close(handle).expect("Failed to close a");
        let handle = service.open(tree.file(b_id)).expect("Failed to open b");
        service.close(handle).expect("Failed to close b");
    }

    #[test]
    fn test_fs_service_open_missing_file() {
        let mut tree = ProjectTree::new("p");
        let id = tree.add_file(tree.root(), "ghost", "f3d", "/nonexistent/ghost.f3d");

        let mut service = FsDocumentService::new();
        let err = service.open(tree.file(id)).expect_err("Open should fail");
        assert_eq!(err.name, "NotFound");
    }
}
