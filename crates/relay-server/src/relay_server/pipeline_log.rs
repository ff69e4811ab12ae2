//! Append-only JSONL log of pipeline outcomes.

use std::fs::File;
use std::io::Write;

use super::*;

#[derive(Clone)]
pub(super) struct PipelineEventLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl PipelineEventLog {
    pub(super) fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub(super) fn append(&self, value: &Value) -> Result<()> {
        let line = serde_json::to_string(value).context("failed to encode log event")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("pipeline log mutex is poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

/// One structured log line: reason code plus the identifying coordinates of
/// the request, merged with outcome-specific fields.
pub(super) fn pipeline_log_line(
    reason_code: &str,
    repo: &str,
    issue_number: u64,
    event_id: Option<&str>,
    extra: Value,
) -> Value {
    let mut line = json!({
        "at_unix_ms": current_unix_timestamp_ms(),
        "reason_code": reason_code,
        "repo": repo,
        "issue_number": issue_number,
    });
    if let Some(event_id) = event_id {
        line["event_id"] = json!(event_id);
    }
    if let (Some(target), Value::Object(extra_fields)) = (line.as_object_mut(), extra) {
        for (key, value) in extra_fields {
            target.insert(key, value);
        }
    }
    line
}
