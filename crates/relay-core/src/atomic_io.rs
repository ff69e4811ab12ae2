use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};

static STAGING_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Publishes bytes so readers observe either the previous content or the
/// new content, never a partial file.
///
/// The bytes are staged under a unique name inside the destination
/// directory (keeping the final rename on one filesystem) and renamed over
/// the target. A failed write or rename removes the staged file rather than
/// leaving it next to live evidence objects.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("destination '{}' has no usable file name", path.display());
    };
    let parent_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let staging_path = next_staging_path(parent_dir, file_name);
    let mut staged = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&staging_path)
        .with_context(|| format!("failed to stage {}", staging_path.display()))?;
    let write_result = staged
        .write_all(content)
        .and_then(|()| staged.flush())
        .with_context(|| format!("failed to write {}", staging_path.display()));
    drop(staged);
    if let Err(error) = write_result {
        let _ = std::fs::remove_file(&staging_path);
        return Err(error);
    }

    if let Err(error) = std::fs::rename(&staging_path, path) {
        let _ = std::fs::remove_file(&staging_path);
        return Err(error).with_context(|| {
            format!(
                "failed to publish {} as {}",
                staging_path.display(),
                path.display()
            )
        });
    }
    Ok(())
}

/// Text variant of [`write_bytes_atomic`] for JSON sidecars.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_bytes_atomic(path, content.as_bytes())
}

// The pid separates processes sharing a state dir; the sequence separates
// concurrent writers racing on the same destination within this process.
fn next_staging_path(parent_dir: &Path, file_name: &str) -> PathBuf {
    let sequence = STAGING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    parent_dir.join(format!(
        ".{file_name}.{}-{sequence}.part",
        std::process::id()
    ))
}
