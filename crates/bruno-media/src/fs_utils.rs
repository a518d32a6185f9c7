//! Filesystem helpers shared by the janitor and the merge step.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// EXDEV on Linux and macOS.
const EXDEV: i32 = 18;

/// Move `src` to `dst`, creating the destination directory if needed.
///
/// A plain rename is tried first. When the two paths live on different
/// filesystems the file is copied next to `dst` and renamed into place,
/// so readers of `dst` never observe a partial file.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if !src.exists() {
        return Err(MediaError::FileNotFound(src.to_path_buf()));
    }

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            tracing::debug!(
                src = %src.display(),
                dst = %dst.display(),
                "rename crosses filesystems, copying instead"
            );
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    let staging = dst.with_extension("partial");

    if let Err(e) = fs::copy(src, &staging).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(src = %src.display(), error = %e, "failed to remove source after copy");
    }

    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> std::io::Result<()> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
