//! 📊 Result Tracker — the scorekeeper that outlives every task.
//!
//! Every document's fate ends up here: succeeded, failed, skipped, or
//! "failed but we're trying again" (retried). The counters are atomics shared
//! across all workers; the optional id logs are append-only files written
//! incrementally as outcomes arrive, so a run killed at 80% still leaves a
//! usable reconciliation trail instead of a shrug.
//!
//! 🦆 The duck audits the books quarterly. The books have always balanced.
//! The duck remains suspicious.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Table, presets::NOTHING};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::app_config::AppConfig;

/// 📝 An append-only, comma-joined id log. Opened once, appended forever.
///
/// Format: `id1,id2,id3,` — every id followed by a comma, flushed per write,
/// so a dead process never costs more than the id it was mid-writing.
/// Parsing it back is `split(',')` and a filter for the empty tail. Artisanal.
#[derive(Debug)]
struct IdLog {
    file: tokio::sync::Mutex<File>,
}

impl IdLog {
    async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| {
                format!(
                    "💀 Could not open id log '{}' for appending. We asked the filesystem nicely. The filesystem said no. Check the path, the permissions, and whether the directory actually exists.",
                    path.display()
                )
            })?;
        Ok(Self {
            file: tokio::sync::Mutex::new(file),
        })
    }

    async fn append(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut line = String::with_capacity(ids.iter().map(|id| id.len() + 1).sum());
        for id in ids {
            line.push_str(id);
            line.push(',');
        }
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .context("💀 Append to the id log failed mid-write. The disk is full, or the file vanished, or the universe is testing us. The counters are still correct; the log may be short one batch.")?;
        file.flush().await?;
        Ok(())
    }
}

/// 📊 The shared scoreboard. One per run, `Arc`ed into every worker.
///
/// Succeeded counts only go up (a document that eventually lands after
/// retries is a success, full stop). Failed counts are PERMANENT failures —
/// documents whose retry budget ran out. With the default unlimited-retry
/// policy that number can only be non-zero if the run is killed first, which
/// is exactly what the failure log is for.
#[derive(Debug)]
pub(crate) struct ResultTracker {
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    retries: AtomicU64,
    /// 🪦 Ids of permanently failed documents, for the final report.
    /// A std Mutex is fine — pushes are brief and never held across awaits.
    failed_ids: Mutex<Vec<String>>,
    success_log: Option<IdLog>,
    failure_log: Option<IdLog>,
}

impl ResultTracker {
    pub(crate) async fn new(config: &AppConfig) -> Result<Self> {
        let success_log = match &config.success_log {
            Some(path) => Some(IdLog::open(path).await?),
            None => None,
        };
        let failure_log = match &config.failure_log {
            Some(path) => Some(IdLog::open(path).await?),
            None => None,
        };
        Ok(Self {
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failed_ids: Mutex::new(Vec::new()),
            success_log,
            failure_log,
        })
    }

    /// ✅ A batch of documents made it. Count them, log them, move on.
    pub(crate) async fn record_succeeded(&self, ids: &[String]) {
        let total = self
            .succeeded
            .fetch_add(ids.len() as u64, Ordering::Relaxed)
            + ids.len() as u64;
        info!("✅ {total} documents created");
        if let Some(log) = &self.success_log {
            if let Err(err) = log.append(ids).await {
                // ⚠️ The log is best-effort bookkeeping; the ingest itself
                // succeeded. Complain loudly, keep going.
                warn!("⚠️ success log write failed: {err:#}");
            }
        }
    }

    /// 🪦 A document is permanently done for — retry budget exhausted, or the
    /// run is giving up on it for structural reasons. Named and remembered.
    pub(crate) async fn record_failed(&self, id: &str, reason: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        warn!(document_id = %id, "💀 document permanently failed: {reason}");
        self.failed_ids
            .lock()
            .expect("💀 failed_ids mutex poisoned — a worker panicked mid-push")
            .push(id.to_string());
        if let Some(log) = &self.failure_log {
            let ids = [id.to_string()];
            if let Err(err) = log.append(&ids).await {
                warn!("⚠️ failure log write failed: {err:#}");
            }
        }
    }

    /// 🫥 A record produced zero documents (no usable text). Counted, not mourned.
    pub(crate) fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// 🔄 A task (or a lone document) went back into the queue for another lap.
    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn succeeded_count(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub(crate) fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub(crate) fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// 🪦 Snapshot of the permanently failed ids, for the final report.
    pub(crate) fn failed_ids(&self) -> Vec<String> {
        self.failed_ids
            .lock()
            .expect("💀 failed_ids mutex poisoned — a worker panicked mid-push")
            .clone()
    }

    /// 🏁 The final scoreboard, rendered as a comfy table and logged once,
    /// after the queue has drained. The numbers you actually came for.
    pub(crate) fn report(&self) {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![Cell::new("✅ succeeded"), Cell::new(self.succeeded_count())]);
        table.add_row(vec![Cell::new("💀 failed"), Cell::new(self.failed_count())]);
        table.add_row(vec![Cell::new("🫥 skipped (no text)"), Cell::new(self.skipped_count())]);
        table.add_row(vec![Cell::new("🔄 retries"), Cell::new(self.retry_count())]);
        info!("🏁 Done - all documents have been processed!\n{table}");

        let failed = self.failed_ids();
        if !failed.is_empty() {
            warn!(
                "💀 {} documents never made it: {}",
                failed.len(),
                failed.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{RetryConfig, WatermarkConfig};

    fn config_with_logs(success: Option<&Path>, failure: Option<&Path>) -> AppConfig {
        AppConfig {
            cluster: "http://localhost:9200".into(),
            index: "test".into(),
            file: "test.ndjson".into(),
            username: None,
            password: None,
            api_key: None,
            text_field: "text".into(),
            only_text: false,
            chunk_size: 0,
            chunk_overlap: 0,
            batch_size: 1,
            concurrency: 1,
            retry: RetryConfig::default(),
            watermarks: WatermarkConfig::default(),
            success_log: success.map(|p| p.to_path_buf()),
            failure_log: failure.map(|p| p.to_path_buf()),
        }
    }

    #[tokio::test]
    async fn the_one_where_the_counters_count_and_nothing_else_happens() {
        let tracker = ResultTracker::new(&config_with_logs(None, None))
            .await
            .expect("💀 a tracker with no logs has nothing to fail at");

        tracker.record_succeeded(&["a".into(), "b".into()]).await;
        tracker.record_failed("c", "the store said no, eleven times").await;
        tracker.record_skipped();
        tracker.record_retry();

        assert_eq!(tracker.succeeded_count(), 2);
        assert_eq!(tracker.failed_count(), 1);
        assert_eq!(tracker.skipped_count(), 1);
        assert_eq!(tracker.retry_count(), 1);
        assert_eq!(tracker.failed_ids(), vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn the_one_where_ids_land_in_the_logs_comma_joined_and_appendable() {
        let dir = tempfile::tempdir().expect("💀 tempdir refused to exist");
        let ok_path = dir.path().join("ok.txt");
        let sad_path = dir.path().join("sad.txt");

        let tracker =
            ResultTracker::new(&config_with_logs(Some(&ok_path), Some(&sad_path)))
                .await
                .expect("💀 opening fresh log files in a tempdir should be the easy part");

        tracker.record_succeeded(&["a1".into(), "a2".into()]).await;
        tracker.record_succeeded(&["a3".into()]).await;
        tracker.record_failed("b1", "rejected by mapping").await;

        let ok = std::fs::read_to_string(&ok_path).unwrap();
        assert_eq!(ok, "a1,a2,a3,", "incremental appends, every id comma-terminated");
        let sad = std::fs::read_to_string(&sad_path).unwrap();
        assert_eq!(sad, "b1,");

        // 🔁 A second tracker on the same files appends — never truncates.
        let tracker2 =
            ResultTracker::new(&config_with_logs(Some(&ok_path), Some(&sad_path)))
                .await
                .unwrap();
        tracker2.record_succeeded(&["a4".into()]).await;
        let ok = std::fs::read_to_string(&ok_path).unwrap();
        assert_eq!(ok, "a1,a2,a3,a4,", "append-only means the history survives restarts");
    }
}
