//! Attempt journal
//!
//! Appends every terminal [`AttemptRecord`] to a JSON-lines file so that
//! attempts stay inspectable after the run summary is gone.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::domain::models::AttemptRecord;

/// Append-only JSON-lines journal of attempt records
#[derive(Clone)]
pub struct AttemptJournal {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl AttemptJournal {
    /// Open `path` for appending, creating it and its parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create journal directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open journal {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one record as a single JSON line
    pub async fn append(&self, record: &AttemptRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("failed to serialize attempt record")?;

        {
            let mut file = self
                .file
                .lock()
                .map_err(|e| anyhow::anyhow!("journal mutex poisoned: {e}"))?;
            writeln!(file, "{json}").context("failed to write attempt record")?;
            file.flush().context("failed to flush journal")?;
        }

        info!(
            attempt_id = %record.id,
            resource = %record.resource_id,
            outcome = record.outcome.state().as_str(),
            duration_ms = record.duration_ms(),
            "attempt journaled"
        );
        Ok(())
    }

    /// Read every record back, in write order
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AttemptRecord>> {
        let file = File::open(path.as_ref()).context("failed to open journal for reading")?;
        BufReader::new(file)
            .lines()
            .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(|line| {
                let line = line.context("failed to read journal line")?;
                serde_json::from_str(&line).context("failed to parse journal line")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ErrorCategory, RemediationAction, ResourceId};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: &str) -> AttemptRecord {
        AttemptRecord::aborted(
            ResourceId::from(id),
            ErrorCategory::Timeout,
            RemediationAction::RaiseTimeout { ceiling_secs: 900 },
            Utc::now(),
            "task panicked",
        )
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("attempts.jsonl");
        let journal = AttemptJournal::open(&path).await.unwrap();

        journal.append(&record("f1")).await.unwrap();
        journal.append(&record("f2")).await.unwrap();

        let records = AttemptJournal::read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].resource_id, ResourceId::from("f1"));
        assert!(records[1].outcome.requires_operator());
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attempts.jsonl");

        AttemptJournal::open(&path)
            .await
            .unwrap()
            .append(&record("f1"))
            .await
            .unwrap();
        AttemptJournal::open(&path)
            .await
            .unwrap()
            .append(&record("f2"))
            .await
            .unwrap();

        assert_eq!(AttemptJournal::read_all(&path).unwrap().len(), 2);
    }
}
