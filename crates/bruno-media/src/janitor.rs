//! Scoped ownership of on-disk transient artifacts.
//!
//! One `ArtifactJanitor` exists per pipeline run. Every path it hands out is
//! registered until it is released or persisted, and whatever is still
//! registered when the run ends is deleted by `release_all`, or by `Drop` if
//! the run unwinds before getting there.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use bruno_models::ArtifactKind;
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{move_file, remove_if_exists};

/// Handle to a file-backed blob owned by an [`ArtifactJanitor`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TransientArtifact {
    kind: ArtifactKind,
    path: PathBuf,
}

impl TransientArtifact {
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size on disk, 0 if the producer never wrote it.
    pub async fn size(&self) -> u64 {
        tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

impl AsRef<Path> for TransientArtifact {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Lifecycle manager for the transient files of one run.
#[derive(Debug)]
pub struct ArtifactJanitor {
    dir: TempDir,
    live: Mutex<HashSet<PathBuf>>,
}

impl ArtifactJanitor {
    /// Create a janitor with a private directory under `work_dir`.
    pub fn new(work_dir: impl AsRef<Path>) -> MediaResult<Self> {
        let work_dir = work_dir.as_ref();
        std::fs::create_dir_all(work_dir)?;

        let dir = tempfile::Builder::new().prefix("run_").tempdir_in(work_dir)?;
        debug!(dir = %dir.path().display(), "artifact directory created");

        Ok(Self {
            dir,
            live: Mutex::new(HashSet::new()),
        })
    }

    /// Directory holding this run's artifacts.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Allocate a uniquely named location for `kind`.
    pub fn acquire(&self, kind: ArtifactKind) -> MediaResult<TransientArtifact> {
        self.acquire_with_extension(kind, kind.default_extension())
    }

    /// Allocate a uniquely named location with an explicit extension.
    pub fn acquire_with_extension(
        &self,
        kind: ArtifactKind,
        extension: &str,
    ) -> MediaResult<TransientArtifact> {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() || extension.contains(['/', '\\']) {
            return Err(MediaError::artifact(format!(
                "invalid artifact extension {:?}",
                extension
            )));
        }

        let name = format!("{}_{}.{}", kind.prefix(), uuid::Uuid::new_v4().simple(), extension);
        let path = self.dir.path().join(name);

        self.live_set().insert(path.clone());
        debug!(kind = ?kind, path = %path.display(), "artifact acquired");

        Ok(TransientArtifact { kind, path })
    }

    /// Delete an artifact. Never fails; releasing twice is a no-op.
    pub async fn release(&self, artifact: &TransientArtifact) {
        if !self.live_set().remove(&artifact.path) {
            return;
        }

        match remove_if_exists(&artifact.path).await {
            Ok(()) => debug!(path = %artifact.path.display(), "artifact released"),
            Err(e) => warn!(
                path = %artifact.path.display(),
                error = %e,
                "failed to delete artifact"
            ),
        }
    }

    /// Move an artifact out of the janitor's ownership to `dest`.
    pub async fn persist(
        &self,
        artifact: TransientArtifact,
        dest: impl AsRef<Path>,
    ) -> MediaResult<PathBuf> {
        let dest = dest.as_ref().to_path_buf();
        move_file(&artifact.path, &dest).await?;
        self.live_set().remove(&artifact.path);
        debug!(from = %artifact.path.display(), to = %dest.display(), "artifact persisted");
        Ok(dest)
    }

    /// Number of artifacts still owned.
    pub fn live_count(&self) -> usize {
        self.live_set().len()
    }

    /// Delete every artifact still owned.
    pub async fn release_all(&self) {
        let remaining: Vec<PathBuf> = self.live_set().drain().collect();
        for path in remaining {
            if let Err(e) = remove_if_exists(&path).await {
                warn!(path = %path.display(), error = %e, "failed to delete artifact during teardown");
            }
        }
    }

    fn live_set(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ArtifactJanitor {
    fn drop(&mut self) {
        let remaining = self.live_set().drain().collect::<Vec<_>>();
        for path in remaining {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to delete artifact on drop");
                }
            }
        }
        // TempDir removes the run directory itself.
    }
}
