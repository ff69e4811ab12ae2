//! Filesystem-backed object store for evidence blobs.
//!
//! Uploads stream into a staging file and rename into their final key, so
//! readers never observe partial objects. A JSON metadata sidecar lands next
//! to each object.

use tokio::io::AsyncWriteExt;

use super::*;

#[derive(Debug, Clone)]
pub(super) struct EvidenceObjectStore {
    root: PathBuf,
}

/// Bytes staged for an in-flight upload.
pub(super) struct PendingUpload {
    temp_path: PathBuf,
    file: tokio::fs::File,
    pub(super) written: u64,
}

impl EvidenceObjectStore {
    pub(super) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Deterministic object key for an evidence asset.
    pub(super) fn object_key(
        repo_ref: &RepoRef,
        issue_number: u64,
        id: &str,
        filename: &str,
    ) -> String {
        format!(
            "evidence/{}/{}/issue-{}/{}/{}",
            repo_ref.owner, repo_ref.name, issue_number, id, filename
        )
    }

    fn object_path(&self, object_key: &str) -> PathBuf {
        self.root.join(object_key)
    }

    pub(super) async fn begin_upload(&self, id: &str) -> std::io::Result<PendingUpload> {
        let staging = self.root.join("staging");
        tokio::fs::create_dir_all(&staging).await?;
        let temp_path = staging.join(format!("{id}.part"));
        let file = tokio::fs::File::create(&temp_path).await?;
        Ok(PendingUpload {
            temp_path,
            file,
            written: 0,
        })
    }

    /// Moves staged bytes to their final key and writes the metadata
    /// sidecar. Returns the object size.
    pub(super) async fn commit_upload(
        &self,
        upload: PendingUpload,
        object_key: &str,
        metadata: &Value,
    ) -> Result<u64> {
        let final_path = self.object_path(object_key);
        let parent = final_path
            .parent()
            .context("object key resolves to the store root")?
            .to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let PendingUpload {
            temp_path,
            mut file,
            written,
        } = upload;
        file.flush()
            .await
            .with_context(|| format!("failed to flush {}", temp_path.display()))?;
        drop(file);
        tokio::fs::rename(&temp_path, &final_path)
            .await
            .with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    temp_path.display(),
                    final_path.display()
                )
            })?;

        let mut sidecar = serde_json::to_string_pretty(metadata)
            .context("failed to encode object metadata")?;
        sidecar.push('\n');
        write_text_atomic(&parent.join("metadata.json"), &sidecar)?;
        Ok(written)
    }

    pub(super) async fn abort_upload(&self, upload: PendingUpload) {
        drop(upload.file);
        let _ = tokio::fs::remove_file(&upload.temp_path).await;
    }

    pub(super) async fn open_object(&self, object_key: &str) -> Option<tokio::fs::File> {
        tokio::fs::File::open(self.object_path(object_key)).await.ok()
    }
}

impl PendingUpload {
    pub(super) async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.file.write_all(chunk).await?;
        self.written = self.written.saturating_add(chunk.len() as u64);
        Ok(())
    }
}

/// Strips path separators, quotes, and NULs from a caller-supplied filename;
/// empty or relative results fall back to the default.
pub(super) fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '"' | '\0'))
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        DEFAULT_EVIDENCE_FILENAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_filename;

    #[test]
    fn unit_sanitize_filename_strips_separators_and_quotes() {
        assert_eq!(sanitize_filename("trace.log"), "trace.log");
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename("a\\b\"c.txt"), "abc.txt");
        assert_eq!(sanitize_filename(""), "upload.bin");
        assert_eq!(sanitize_filename("  "), "upload.bin");
        assert_eq!(sanitize_filename(".."), "upload.bin");
    }
}
