//! Host document service.
//!
//! The engine never opens or writes design files itself. It asks a
//! `DocumentService` to open a file, make it the active document, detach
//! its external references, export it into a folder and close it again.
//! The CAD application implements this trait; `fs_ops::FsDocumentService`
//! is a standalone implementation backed by plain files.

use std::path::Path;

use crate::error::HostError;
use crate::model::FileEntry;

/// Document operations provided by the host.
///
/// At most one handle is open at any time: the engine closes each document
/// before opening the next one.
pub trait DocumentService {
    /// An open document.
    type Handle;

    fn open(&mut self, file: &FileEntry) -> Result<Self::Handle, HostError>;

    fn activate(&mut self, handle: &Self::Handle) -> Result<(), HostError>;

    /// Detach external references so the export is self-contained.
    fn remove_links(&mut self, handle: &Self::Handle) -> Result<(), HostError>;

    /// Export the document into `destination_dir` using `format`
    /// (a lowercase extension such as `f3d`).
    fn export(
        &mut self,
        handle: &Self::Handle,
        destination_dir: &Path,
        format: &str,
    ) -> Result<(), HostError>;

    fn close(&mut self, handle: Self::Handle) -> Result<(), HostError>;
}
