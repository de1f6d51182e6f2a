//! The conversion session: one file's journey from selection to Markdown.
//!
//! A [`ConversionSession`] is plain data. Only the
//! [`crate::orchestrator::ConversionOrchestrator`] mutates it (all mutators
//! are `pub(crate)`); everyone else reads it or takes an immutable snapshot
//! of its Markdown.

use crate::error::{SessionError, StudioError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Default upper bound on the selected file size (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * MIB;

/// The document type a session accepts by default.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Lifecycle status of a [`ConversionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Nothing selected yet.
    #[default]
    Idle,
    /// A valid file is selected and waiting for conversion.
    Selected,
    /// Extraction is in flight.
    Converting,
    /// Markdown is available.
    Ready,
    /// Extraction failed; a new selection is required.
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Selected => "selected",
            SessionStatus::Converting => "converting",
            SessionStatus::Ready => "ready",
            SessionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Name, size and declared type of a selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original filename, if the host knows it.
    pub name: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// MIME type declared by the host (not sniffed).
    pub mime_type: String,
}

impl FileDescriptor {
    /// Filename with its extension removed, e.g. `"report"` for `"report.pdf"`.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(crate::export::strip_extension)
    }

    /// The declared type without parameters, lower-cased.
    pub fn essence(&self) -> String {
        mime_essence(&self.mime_type)
    }
}

/// Where the bytes of a [`SourceFile`] live.
#[derive(Clone)]
enum SourceData {
    Memory(Arc<[u8]>),
    Path(PathBuf),
}

/// A user-selected file: its descriptor plus a way to read its bytes.
///
/// Bytes are read lazily so an oversized file can be rejected from its
/// metadata alone.
#[derive(Clone)]
pub struct SourceFile {
    descriptor: FileDescriptor,
    data: SourceData,
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match &self.data {
            SourceData::Memory(b) => format!("<{} bytes in memory>", b.len()),
            SourceData::Path(p) => format!("<file {}>", p.display()),
        };
        f.debug_struct("SourceFile")
            .field("descriptor", &self.descriptor)
            .field("data", &data)
            .finish()
    }
}

impl SourceFile {
    /// Wrap an in-memory buffer.
    pub fn from_bytes(
        name: Option<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            descriptor: FileDescriptor {
                name,
                size: bytes.len() as u64,
                mime_type: mime_type.into(),
            },
            data: SourceData::Memory(bytes),
        }
    }

    /// Describe a file on disk. Only metadata is read here; the declared type
    /// is derived from the extension, as a file picker would.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StudioError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| StudioError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        let mime_type = guess_mime_type(name.as_deref().unwrap_or_default());
        debug!("Described {} ({} bytes, {})", path.display(), meta.len(), mime_type);
        Ok(Self {
            descriptor: FileDescriptor {
                name,
                size: meta.len(),
                mime_type: mime_type.to_string(),
            },
            data: SourceData::Path(path.to_path_buf()),
        })
    }

    /// Override the declared MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.descriptor.mime_type = mime_type.into();
        self
    }

    /// The file's descriptor.
    pub fn descriptor(&self) -> &FileDescriptor {
        &self.descriptor
    }

    /// Filename without its extension.
    pub fn display_name(&self) -> Option<&str> {
        self.descriptor.display_name()
    }

    /// Read the full contents.
    pub async fn read_bytes(&self) -> Result<Arc<[u8]>, StudioError> {
        match &self.data {
            SourceData::Memory(b) => Ok(Arc::clone(b)),
            SourceData::Path(p) => tokio::fs::read(p)
                .await
                .map(Arc::from)
                .map_err(|e| StudioError::InputReadFailed {
                    path: p.clone(),
                    source: e,
                }),
        }
    }
}

/// Declared MIME type for a filename, based on its extension.
pub fn guess_mime_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_MIME_TYPE,
        Some("md" | "markdown") => "text/markdown",
        Some("txt") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// `"Application/PDF; charset=binary"` → `"application/pdf"`.
pub fn mime_essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

/// The single active unit of work.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionSession {
    file: Option<FileDescriptor>,
    status: SessionStatus,
    markdown: Option<String>,
    progress: u8,
    last_error: Option<SessionError>,
}

impl ConversionSession {
    /// A fresh session in `Idle`.
    pub fn idle() -> Self {
        Self::default()
    }

    /// A fresh session in `Selected` for `file`.
    pub(crate) fn selected(file: FileDescriptor) -> Self {
        Self {
            file: Some(file),
            status: SessionStatus::Selected,
            ..Self::default()
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn file(&self) -> Option<&FileDescriptor> {
        self.file.as_ref()
    }

    /// Markdown text; `Some` only in `Ready`.
    pub fn markdown(&self) -> Option<&str> {
        self.markdown.as_deref()
    }

    /// Simulated progress, 0–100.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub(crate) fn start_converting(&mut self) {
        self.status = SessionStatus::Converting;
        self.progress = 0;
        self.last_error = None;
    }

    pub(crate) fn set_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    pub(crate) fn finish_ready(&mut self, markdown: String) {
        self.progress = 100;
        self.markdown = Some(markdown);
        self.status = SessionStatus::Ready;
    }

    pub(crate) fn finish_failed(&mut self, error: SessionError) {
        self.last_error = Some(error);
        self.status = SessionStatus::Failed;
    }

    pub(crate) fn replace_markdown(&mut self, markdown: String) {
        self.markdown = Some(markdown);
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn guess_mime_type_by_extension() {
        assert_eq!(guess_mime_type("a.pdf"), PDF_MIME_TYPE);
        assert_eq!(guess_mime_type("A.PDF"), PDF_MIME_TYPE);
        assert_eq!(guess_mime_type("notes.md"), "text/markdown");
        assert_eq!(guess_mime_type("noext"), "application/octet-stream");
    }

    #[test]
    fn mime_essence_strips_parameters() {
        assert_eq!(mime_essence("Application/PDF; charset=binary"), "application/pdf");
        assert_eq!(mime_essence(" text/plain "), "text/plain");
    }

    #[test]
    fn from_bytes_records_size() {
        let f = SourceFile::from_bytes(Some("x.pdf".into()), PDF_MIME_TYPE, vec![0u8; 42]);
        assert_eq!(f.descriptor().size, 42);
        assert_eq!(f.descriptor().display_name(), Some("x"));
    }

    #[tokio::test]
    async fn from_path_reads_metadata_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.PDF");
        std::fs::write(&path, b"%PDF-1.7 test").unwrap();

        let f = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(f.descriptor().name.as_deref(), Some("Report.PDF"));
        assert_eq!(f.descriptor().mime_type, PDF_MIME_TYPE);
        assert_eq!(f.descriptor().size, 13);
        assert_eq!(&*f.read_bytes().await.unwrap(), b"%PDF-1.7 test");
    }

    #[tokio::test]
    async fn from_path_missing_file_is_read_error() {
        let err = SourceFile::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::InputReadFailed { .. }));
    }

    #[test]
    fn progress_never_decreases() {
        let mut s = ConversionSession::selected(FileDescriptor {
            name: None,
            size: 1,
            mime_type: PDF_MIME_TYPE.into(),
        });
        s.start_converting();
        s.set_progress(40);
        s.set_progress(10);
        assert_eq!(s.progress(), 40);
        s.set_progress(250);
        assert_eq!(s.progress(), 100);
    }

    #[test]
    fn failed_session_keeps_error() {
        let mut s = ConversionSession::idle();
        s.finish_failed(SessionError {
            kind: ErrorKind::ConversionFailure,
            message: "x".into(),
        });
        assert_eq!(s.status(), SessionStatus::Failed);
        assert!(s.markdown().is_none());
        s.clear_error();
        assert!(s.last_error().is_none());
    }
}
