//! 🏭 The pipeline — where all the parts finally hold hands.
//!
//! 🎬 COLD OPEN — INT. FACTORY FLOOR — THE BIG DAY
//!
//! The reader reads. The builder builds. The batcher batches. The queue
//! queues. Every department swears its part works. Today we find out if
//! they work TOGETHER. The duck is wearing a hard hat. 🦆
//!
//! One loop, strictly ordered per record:
//!
//!   gate → read → build → batch → submit
//!
//! The gate check comes FIRST, so a paused reader holds position before
//! touching the next line. The batcher runs inline in this loop, which makes
//! end-of-input a true barrier: when `next_record` returns `None`, every
//! document that will ever exist has already been through `add`, and one
//! final `flush` catches the stragglers. No timers, no "probably done by
//! now". Done means done.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::app_config::AppConfig;
use crate::backpressure::ReaderGate;
use crate::batcher::Batcher;
use crate::builder::{Built, DocumentBuilder};
use crate::progress::IngestProgress;
use crate::queue::DispatchQueue;
use crate::sources::{RecordSource, SourceBackend};
use crate::store::StoreClient;
use crate::tracker::ResultTracker;

/// 🏭 Run one complete ingest: drain the source, settle every task, report.
///
/// Returns `Err` if the run cannot proceed (source I/O error, malformed
/// line — fail-fast, the house policy) or if any document permanently failed,
/// so callers exit non-zero when the index and the file disagree about
/// what happened.
pub(crate) async fn run_pipeline(
    config: &AppConfig,
    mut source: SourceBackend,
    store: StoreClient,
    tracker: Arc<ResultTracker>,
) -> Result<()> {
    let gate = Arc::new(ReaderGate::new());
    let queue = DispatchQueue::start(config, store, tracker.clone(), gate.clone());
    let builder = DocumentBuilder::new(config);
    let mut batcher = Batcher::new(config.batch_size);

    let (_, file_size) = source.byte_progress();
    let mut progress = IngestProgress::new(config.file.clone(), file_size);

    let mut records: u64 = 0;
    let mut docs: u64 = 0;

    loop {
        // 🚦 Gate first. If the dock is full, we hold position on THIS line
        // boundary — the stream offset is preserved, nothing is re-read.
        gate.wait_open().await;

        let Some(record) = source.next_record().await? else {
            break;
        };
        records += 1;

        match builder.build(record) {
            Built::SkippedNoText { id } => {
                // 🫥 Counted, named, not sent. The tracker remembers.
                tracker.record_skipped();
                debug!(record_id = %id, "🫥 record has no usable text — skipped");
            }
            Built::Documents(built) => {
                docs += built.len() as u64;
                for doc in built {
                    if let Some(task) = batcher.add(doc) {
                        queue.submit(task).await?;
                    }
                }
            }
        }

        let (bytes_read, _) = source.byte_progress();
        progress.update(bytes_read, records, docs);
    }

    // 🚪 EOF. The batcher may still be holding a partial batch — it ships now,
    // as-is, even if it's a batch of one. Size minimums are for cowards.
    if let Some(task) = batcher.flush() {
        queue.submit(task).await?;
    }

    // 🏁 Close intake, wait for the last task (and every retry it spawned) to
    // settle, then let the workers go home.
    queue.close_intake();
    queue.drain().await?;

    progress.finish();
    tracker.report();

    let failed = tracker.failed_count();
    if failed > 0 {
        anyhow::bail!(
            "💀 {failed} documents permanently failed (retry budget exhausted). Their ids are in the report above — and in the failure log, if you configured one, which future-you now wishes past-you had."
        );
    }
    Ok(())
}
