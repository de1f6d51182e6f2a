//! Hands export payloads to the user as files.
//!
//! A [`Downloader`] owns a target directory. Each save stages the bytes in a
//! temporary file inside that directory and then persists it under the
//! payload's filename, so a reader never sees a half-written download.
//! Existing files are never overwritten: `report.md` becomes
//! `report (1).md`, then `report (2).md`, and so on.
//!
//! The staging file is held by a [`DownloadHandle`] that is released on
//! every exit path; [`Downloader::live_handles`] is zero whenever no save
//! is running.

use crate::error::StudioError;
use crate::export::{strip_extension, ExportPayload};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const MAX_NAME_ATTEMPTS: usize = 1000;

/// Where a payload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    pub path: PathBuf,
    pub bytes: usize,
    pub mime_type: &'static str,
}

/// Saves payloads into one directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    dir: PathBuf,
    handles: Arc<AtomicUsize>,
}

/// A staged download. Dropping it deletes the staging file if it was not
/// persisted.
struct DownloadHandle {
    file: Option<NamedTempFile>,
    live: Arc<AtomicUsize>,
}

impl DownloadHandle {
    fn stage(dir: &Path, live: &Arc<AtomicUsize>) -> std::io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(dir)?;
        live.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            file: Some(file),
            live: Arc::clone(live),
        })
    }
}

impl Drop for DownloadHandle {
    fn drop(&mut self) {
        // NamedTempFile removes itself if still present.
        self.file.take();
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Downloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Staging files currently held.
    pub fn live_handles(&self) -> usize {
        self.handles.load(Ordering::SeqCst)
    }

    /// Write `payload` into the directory under its filename.
    pub async fn save(&self, payload: &ExportPayload) -> Result<SavedDownload, StudioError> {
        let dir = self.dir.clone();
        let live = Arc::clone(&self.handles);
        let filename = payload.filename.clone();
        let bytes = payload.bytes.clone();

        let path = tokio::task::spawn_blocking(move || save_blocking(&dir, &filename, &bytes, &live))
            .await
            .map_err(|e| StudioError::Internal(format!("Download task panicked: {e}")))??;

        info!("Saved {} ({} bytes)", path.display(), payload.bytes.len());
        Ok(SavedDownload {
            path,
            bytes: payload.bytes.len(),
            mime_type: payload.mime_type,
        })
    }
}

fn save_blocking(
    dir: &Path,
    filename: &str,
    bytes: &[u8],
    live: &Arc<AtomicUsize>,
) -> Result<PathBuf, StudioError> {
    let write_err = |path: &Path, e: std::io::Error| StudioError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    std::fs::create_dir_all(dir).map_err(|e| write_err(dir, e))?;
    let mut handle = DownloadHandle::stage(dir, live).map_err(|e| write_err(dir, e))?;
    let Some(file) = handle.file.as_mut() else {
        return Err(StudioError::Internal("staging file missing".into()));
    };
    file.write_all(bytes).map_err(|e| write_err(file.path(), e))?;
    file.flush().map_err(|e| write_err(file.path(), e))?;

    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_name(filename, n));
        let Some(file) = handle.file.take() else {
            break;
        };
        match file.persist_noclobber(&candidate) {
            Ok(_) => {
                debug!("Persisted download to {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                handle.file = Some(e.file);
            }
            Err(e) => return Err(write_err(&candidate, e.error)),
        }
    }

    Err(write_err(
        &dir.join(filename),
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free name after {MAX_NAME_ATTEMPTS} attempts"),
        ),
    ))
}

/// `("report.md", 2)` → `"report (2).md"`.
fn numbered_name(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }
    let stem = strip_extension(filename);
    let ext = &filename[stem.len()..];
    format!("{stem} ({n}){ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportTarget;

    fn payload(name: &str, body: &str) -> ExportPayload {
        ExportPayload {
            target: ExportTarget::MarkdownText,
            bytes: body.as_bytes().to_vec(),
            mime_type: "text/markdown",
            filename: name.to_string(),
        }
    }

    #[test]
    fn numbered_names() {
        assert_eq!(numbered_name("report.md", 0), "report.md");
        assert_eq!(numbered_name("report.md", 2), "report (2).md");
        assert_eq!(numbered_name("noext", 1), "noext (1)");
    }

    #[tokio::test]
    async fn save_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let d = Downloader::new(dir.path());
        let saved = d.save(&payload("report.md", "# hi\n")).await.unwrap();
        assert_eq!(saved.path, dir.path().join("report.md"));
        assert_eq!(std::fs::read_to_string(&saved.path).unwrap(), "# hi\n");
        assert_eq!(d.live_handles(), 0);
    }

    #[tokio::test]
    async fn existing_files_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.md"), "old").unwrap();
        let d = Downloader::new(dir.path());

        let saved = d.save(&payload("report.md", "new")).await.unwrap();
        assert_eq!(saved.path, dir.path().join("report (1).md"));
        assert_eq!(std::fs::read_to_string(dir.path().join("report.md")).unwrap(), "old");
    }

    #[tokio::test]
    async fn no_staging_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let d = Downloader::new(dir.path());
        d.save(&payload("a.md", "a")).await.unwrap();
        d.save(&payload("a.md", "b")).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "got: {names:?}");
        assert!(names.iter().all(|n| !n.ends_with(".part")));
    }

    #[tokio::test]
    async fn unwritable_directory_releases_handle() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // A regular file cannot act as a directory.
        let d = Downloader::new(blocker.join("sub"));

        let err = d.save(&payload("a.md", "a")).await.unwrap_err();
        assert!(matches!(err, StudioError::OutputWriteFailed { .. }));
        assert_eq!(d.live_handles(), 0);
    }
}
