//! Scratch storage for uploaded documents.
//!
//! The decoders work from a file on disk, so each request writes its upload
//! to `<scratch_dir>/<unix_millis>-<original_name>`. The returned
//! [`ScratchFile`] holds that path as a [`tempfile::TempPath`]: the file is
//! deleted when the guard is dropped, on every exit path of the request,
//! including early returns, panics and a cancelled request future.
//!
//! Deletion is best-effort. On the normal path [`ScratchFile::remove`] logs a
//! failure with `warn!`; it never replaces the result of the request.

use crate::error::GradeError;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempPath;
use tracing::{debug, warn};

/// How many timestamps to try when a scratch name is already taken.
const MAX_NAME_ATTEMPTS: u64 = 16;

/// Fallback name when the client sent none (or only path separators).
const DEFAULT_UPLOAD_NAME: &str = "upload";

/// A request-owned file in the scratch directory, removed on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    /// Write `bytes` to a fresh scratch file named after `original_name`.
    ///
    /// The scratch directory is created first if it does not exist.
    pub async fn persist(
        dir: &Path,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<Self, GradeError> {
        ensure_scratch_dir(dir).await?;

        let name = sanitize_filename(original_name);
        let mut millis = unix_millis();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let prefix = format!("{millis}-");
            let created = tempfile::Builder::new()
                .prefix(&prefix)
                .rand_bytes(0)
                .suffix(&name)
                .tempfile_in(dir);

            let path = match created {
                Ok(file) => file.into_temp_path(),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    millis += 1;
                    continue;
                }
                Err(source) => {
                    return Err(GradeError::Scratch {
                        path: dir.join(scratch_name(millis, &name)),
                        source,
                    })
                }
            };

            // A failed write drops `path`, which removes the partial file.
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|source| GradeError::Scratch {
                    path: path.to_path_buf(),
                    source,
                })?;

            debug!("Saved upload ({} bytes) to {}", bytes.len(), path.display());
            return Ok(ScratchFile { path });
        }

        Err(GradeError::Internal(format!(
            "Could not find a free scratch name for '{name}' after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, off the async runtime, logging any failure.
    pub async fn remove(self) {
        let shown = self.path.display().to_string();
        let closed = tokio::task::spawn_blocking(move || self.path.close()).await;
        match closed {
            Ok(Ok(())) => debug!("Removed scratch file {}", shown),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {}
            Ok(Err(e)) => warn!("Failed to remove scratch file {}: {}", shown, e),
            Err(e) => warn!("Scratch cleanup task for {} failed: {}", shown, e),
        }
    }
}

/// Create the scratch directory if it is missing. Idempotent.
pub async fn ensure_scratch_dir(dir: &Path) -> Result<(), GradeError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| GradeError::Scratch {
            path: dir.to_path_buf(),
            source,
        })
}

/// Reduce a client-supplied filename to its final path component.
pub fn sanitize_filename(original: &str) -> String {
    let unified = original.replace('\\', "/");
    Path::new(&unified)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_UPLOAD_NAME)
        .to_string()
}

/// `<unix_millis>-<name>`
pub fn scratch_name(millis: u64, name: &str) -> String {
    format!("{millis}-{name}")
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn sanitize_keeps_last_component() {
        assert_eq!(sanitize_filename("essay.pdf"), "essay.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\essay.docx"), "essay.docx");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("dir/"), "dir");
    }

    #[test]
    fn scratch_name_prefixes_timestamp() {
        assert_eq!(scratch_name(1700000000123, "a.pdf"), "1700000000123-a.pdf");
    }

    #[tokio::test]
    async fn persist_creates_missing_dir_and_writes_bytes() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested/uploads");

        let file = ScratchFile::persist(&dir, "essay.pdf", b"%PDF-1.4").await.unwrap();
        assert!(file.path().starts_with(&dir));
        let name = file.path().file_name().unwrap().to_str().unwrap().to_string();
        let (prefix, rest) = name.split_once('-').unwrap();
        assert!(prefix.parse::<u64>().is_ok(), "{name}");
        assert_eq!(rest, "essay.pdf");
        assert_eq!(std::fs::read(file.path()).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn drop_removes_file() {
        let tmp = TempDir::new().unwrap();
        let file = ScratchFile::persist(tmp.path(), "a.docx", b"x").await.unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());
        drop(file);
        assert!(!path.exists());
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn cancelled_request_removes_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();
        let request = async move {
            let _file = ScratchFile::persist(&dir, "essay.pdf", b"x").await.unwrap();
            std::future::pending::<()>().await;
        };
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), request).await;
        assert!(timed_out.is_err());
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn remove_deletes_file() {
        let tmp = TempDir::new().unwrap();
        let file = ScratchFile::persist(tmp.path(), "a.pdf", b"x").await.unwrap();
        file.remove().await;
        assert_eq!(entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn remove_after_external_delete_is_silent() {
        let tmp = TempDir::new().unwrap();
        let file = ScratchFile::persist(tmp.path(), "a.pdf", b"x").await.unwrap();
        std::fs::remove_file(file.path()).unwrap();
        file.remove().await;
    }

    #[tokio::test]
    async fn same_name_same_millisecond_does_not_collide() {
        let tmp = TempDir::new().unwrap();
        let a = ScratchFile::persist(tmp.path(), "same.pdf", b"a").await.unwrap();
        let b = ScratchFile::persist(tmp.path(), "same.pdf", b"b").await.unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(entries(tmp.path()), 2);
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("x");
        ensure_scratch_dir(&dir).await.unwrap();
        ensure_scratch_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
    }
}
