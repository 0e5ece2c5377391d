//! 🧵 Dispatch Queue — workers, verdicts, and the art of trying again.
//!
//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where HTTP requests fail..."
//! 🎬 "C workers dared to send them anyway."
//! 🎬 *[record scratch]* 🦆
//!
//! The queue is an MPMC channel of [`Task`]s with a fixed crew of workers.
//! Each worker: receive, dispatch, classify, settle. The classification rules
//! are the soul of this module:
//!
//! - 🌩️ transport failure / non-JSON body → the WHOLE task goes around again
//! - 💀 top-level store error → same, the store rejected everyone at the door
//! - ⚠️ mixed bulk verdict → failed items are reborn as solo tasks; their
//!   siblings' successes are banked immediately
//! - ✅ no errors → everyone aboard is counted and we move on
//!
//! Every task settles exactly once, no matter its fate — the drain barrier's
//! entire worldview depends on that arithmetic being honest.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app_config::AppConfig;
use crate::backpressure::{ReaderGate, WatermarkController};
use crate::common::{Task, TaskKind};
use crate::store::{StoreClient, StoreResponse};
use crate::tracker::ResultTracker;

/// 🔄 The compiled retry policy — how stubborn, and how polite about it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.retry.max_attempts,
            backoff_ms: config.retry.backoff_ms,
        }
    }

    /// 🛑 True when a task on attempt `attempts` has spent its whole budget.
    /// `None` = unlimited = the budget of a central bank.
    fn exhausted(&self, attempts: u32) -> bool {
        matches!(self.max_attempts, Some(max) if attempts >= max)
    }

    /// ⏳ Exponential backoff: base, doubled per attempt, capped at 30s.
    /// `None` base = retry immediately — the inherited, impolite default.
    fn backoff_delay(&self, attempts: u32) -> Option<Duration> {
        let base = self.backoff_ms?;
        let exp = attempts.saturating_sub(1).min(10);
        Some(Duration::from_millis(base.saturating_mul(1 << exp).min(30_000)))
    }
}

/// 📊 What the drain barrier and the watermarks both watch: how many tasks
/// are enqueued-or-in-flight, and whether the intake has closed.
#[derive(Debug, Clone, Copy, Default)]
struct DepthState {
    depth: usize,
    closed: bool,
}

/// 🧮 The shared ledger of outstanding work.
///
/// Every enqueue increments, every settle decrements, and a `watch` channel
/// broadcasts the result — so backpressure reacts inline and the drain
/// barrier is a single `wait_for(closed && depth == 0)` instead of a séance
/// with condition variables.
#[derive(Debug)]
struct QueueShared {
    depth: watch::Sender<DepthState>,
    controller: WatermarkController,
    gate: Arc<ReaderGate>,
}

impl QueueShared {
    fn note_enqueued(&self) {
        let mut new_depth = 0;
        self.depth.send_modify(|s| {
            s.depth += 1;
            new_depth = s.depth;
        });
        self.controller.on_enqueued(new_depth, &self.gate);
    }

    fn note_settled(&self) {
        let mut new_depth = 0;
        self.depth.send_modify(|s| {
            s.depth -= 1;
            new_depth = s.depth;
        });
        self.controller.on_settled(new_depth, &self.gate);
    }

    fn mark_closed(&self) {
        self.depth.send_modify(|s| s.closed = true);
    }

    async fn wait_drained(&self) {
        let mut rx = self.depth.subscribe();
        // 🔒 The sender lives in self; wait_for can only fail if it drops. It won't.
        let _ = rx.wait_for(|s| s.closed && s.depth == 0).await;
    }
}

/// 🧵 The dispatch queue handle the pipeline talks to.
///
/// `submit` feeds it, `close_intake` tells it no more food is coming, and
/// `drain` waits for the last task to settle before sending the workers home.
/// In that order. Always in that order.
#[derive(Debug)]
pub(crate) struct DispatchQueue {
    tx: async_channel::Sender<Task>,
    shared: Arc<QueueShared>,
    workers: Vec<JoinHandle<()>>,
}

impl DispatchQueue {
    /// 🚀 Stand up the queue and spawn `concurrency` workers.
    ///
    /// The channel is unbounded ON PURPOSE: workers re-enqueue retry tasks
    /// into the same channel they consume from, and a bounded channel would
    /// let a full queue deadlock its own consumers. Boundedness comes from
    /// the watermarks instead — the reader is paused long before "unbounded"
    /// means anything scary.
    pub(crate) fn start(
        config: &AppConfig,
        store: StoreClient,
        tracker: Arc<ResultTracker>,
        gate: Arc<ReaderGate>,
    ) -> Self {
        let (tx, rx) = async_channel::unbounded::<Task>();
        let (depth, _) = watch::channel(DepthState::default());
        let shared = Arc::new(QueueShared {
            depth,
            controller: WatermarkController::new(config.watermarks.high, config.watermarks.low),
            gate,
        });
        let retry = RetryPolicy::from_config(config);

        let workers = (0..config.concurrency)
            .map(|worker_id| {
                let worker = Worker {
                    worker_id,
                    rx: rx.clone(),
                    tx: tx.clone(),
                    shared: shared.clone(),
                    store: store.clone(),
                    tracker: tracker.clone(),
                    retry,
                };
                tokio::spawn(worker.run())
            })
            .collect();

        Self { tx, shared, workers }
    }

    /// 📥 Hand a task to the workers. Depth is counted BEFORE the send so the
    /// watermark check sees the task it is about to be responsible for.
    pub(crate) async fn submit(&self, task: Task) -> Result<()> {
        self.shared.note_enqueued();
        if self.tx.send(task).await.is_err() {
            // 💀 Channel closed with the pipeline still feeding it — a bug,
            // not a runtime condition. Keep the ledger honest anyway.
            self.shared.note_settled();
            anyhow::bail!("💀 dispatch queue closed while the pipeline was still submitting tasks");
        }
        Ok(())
    }

    /// 🚪 No more tasks are coming from the reader side. Retries may still
    /// circulate; the drain barrier accounts for them via the depth counter.
    pub(crate) fn close_intake(&self) {
        self.shared.mark_closed();
    }

    /// 🏁 Wait for every task (originals AND their retry descendants) to
    /// settle, then close the channel and walk the workers out.
    pub(crate) async fn drain(self) -> Result<()> {
        self.shared.wait_drained().await;
        self.tx.close();
        for result in futures::future::join_all(self.workers).await {
            if let Err(err) = result {
                // 💀 A worker panicked. The documents it carried already
                // settled or they didn't — either way this is report-worthy.
                warn!("💀 dispatch worker did not exit cleanly: {err}");
            }
        }
        debug!("🧵 all dispatch workers have clocked out");
        Ok(())
    }
}

/// 🧵 One member of the crew. Receives, dispatches, classifies, settles.
struct Worker {
    worker_id: usize,
    rx: async_channel::Receiver<Task>,
    tx: async_channel::Sender<Task>,
    shared: Arc<QueueShared>,
    store: StoreClient,
    tracker: Arc<ResultTracker>,
    retry: RetryPolicy,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.worker_id, "🧵 dispatch worker reporting for duty");
        while let Ok(task) = self.rx.recv().await {
            self.process(task).await;
            // ✅ Exactly once per received task, success or failure or
            // rebirth. The drain barrier is watching. It counts everything.
            self.shared.note_settled();
        }
        debug!(worker = self.worker_id, "🧵 channel closed — worker clocking out");
    }

    async fn process(&self, task: Task) {
        let response = match self.store.dispatch(&task).await {
            Ok(response) => response,
            Err(err) => {
                // 🌩️ Transport-grade failure: the request died in the network,
                // or the body wasn't JSON. Nothing per-item to salvage.
                warn!(worker = self.worker_id, "🌩️ dispatch failed: {err:#}");
                self.retry_whole(task).await;
                return;
            }
        };

        if let Some(error) = &response.error {
            // 💀 The store rejected the whole request at the door.
            warn!(worker = self.worker_id, "💀 store error: {error}");
            self.retry_whole(task).await;
            return;
        }

        if response.errors.unwrap_or(false) {
            self.settle_mixed_verdict(task, response).await;
            return;
        }

        // ✅ Unqualified success — everyone aboard is counted.
        self.tracker.record_succeeded(&task.all_ids()).await;
    }

    /// ⚠️ The bulk response says SOME items failed. Bank the successes,
    /// resurrect each casualty as a brand-new single-document task.
    ///
    /// The failed document is looked up in the task's id → doc map — that map
    /// exists precisely for this moment. The solo task starts with a clean
    /// attempt counter: it is a new task, not the old one limping.
    async fn settle_mixed_verdict(&self, task: Task, response: StoreResponse) {
        let attempts = task.attempts;
        match task.kind {
            TaskKind::Single { doc } => {
                // ⚠️ `errors: true` on a single-document write is the store
                // being creative. Treat it like any whole-task failure.
                warn!(document_id = %doc.id, "⚠️ single write came back with a bulk-style error flag");
                self.retry_whole(Task {
                    kind: TaskKind::Single { doc },
                    attempts,
                })
                .await;
            }
            TaskKind::Bulk { mut docs, ids, .. } => {
                let mut succeeded = Vec::new();
                let mut failed = 0usize;
                for item in response.items {
                    let status = item.index;
                    match status.error {
                        Some(error) => {
                            failed += 1;
                            warn!(document_id = %status.id, "⚠️ item rejected: {error} — resubmitting solo");
                            match docs.remove(&status.id) {
                                Some(doc) => {
                                    self.tracker.record_retry();
                                    self.requeue(Task::single(doc)).await;
                                }
                                None => {
                                    // 💀 The store flagged an id we never sent.
                                    // Nothing to resurrect. Book it and move on.
                                    self.tracker
                                        .record_failed(&status.id, "store reported an unknown id")
                                        .await;
                                }
                            }
                        }
                        None => succeeded.push(status.id),
                    }
                }
                info!(
                    "🚚 tried to create {} documents: Failed {}/Succeed {} (retrying the failures solo)",
                    ids.len(),
                    failed,
                    succeeded.len()
                );
                self.tracker.record_succeeded(&succeeded).await;
            }
        }
    }

    /// 🔄 The whole task goes around again — unless its budget is spent,
    /// in which case every identity aboard is booked as permanently failed.
    async fn retry_whole(&self, mut task: Task) {
        task.attempts += 1;
        if self.retry.exhausted(task.attempts) {
            for id in task.all_ids() {
                self.tracker
                    .record_failed(&id, "retry budget exhausted")
                    .await;
            }
            return;
        }
        self.tracker.record_retry();
        if let Some(delay) = self.retry.backoff_delay(task.attempts) {
            // ⏳ Suspends this one worker only. The rest of the crew keeps
            // shipping while we give the store a moment to collect itself.
            debug!(attempt = task.attempts, ?delay, "⏳ backing off before retry");
            tokio::time::sleep(delay).await;
        }
        self.requeue(task).await;
    }

    /// 📥 Put a task (back) on the channel, keeping the depth ledger honest.
    async fn requeue(&self, task: Task) {
        self.shared.note_enqueued();
        if let Err(send_error) = self.tx.send(task).await {
            // 💀 Channel closed mid-retry — only possible if drain gave up on
            // us, which it doesn't. Belt, meet suspenders.
            warn!("💀 could not requeue a task; the channel is closed");
            let task = send_error.into_inner();
            for id in task.all_ids() {
                self.tracker
                    .record_failed(&id, "dispatch queue closed before the retry could run")
                    .await;
            }
            self.shared.note_settled();
        }
    }
}
