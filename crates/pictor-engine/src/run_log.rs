//! Machine-readable run records
//!
//! Appends one JSON object per line to `<log_dir>/runs.jsonl`. Appends are
//! fail-open: a full disk or a bad path warns and never aborts a generation.
//! Records are write-once; nothing in the system ever rewrites this file.

use pictor_core::fail_open::fail_open;
use pictor_core::RunRecord;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Append-only JSONL record stream for one log directory.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join("runs.jsonl"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, best effort.
    pub async fn append(&self, record: &RunRecord) {
        fail_open("run_log::append", || async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut line = serde_json::to_string(record)?;
            line.push('\n');

            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
        .await;
    }
}
