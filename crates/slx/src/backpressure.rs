//! 🌊 Backpressure — the part that keeps the memory graph flat.
//!
//! 🎬 COLD OPEN — INT. WAREHOUSE — SHIPPING SEASON
//!
//! The conveyor belt feeds boxes faster than the trucks can leave. A person
//! whose entire job is to watch the loading dock raises one hand. The belt
//! stops. Nobody panics. Boxes ship. The hand comes down. The belt resumes.
//! That person is this module. Pay that person well.
//!
//! 🦆
//!
//! The reader produces lines far faster than HTTP round-trips complete. With
//! no throttle, the task queue becomes a museum of everything the file ever
//! contained, held in RAM, for no one. So: a high watermark pauses the
//! reader, a low watermark resumes it, and the gap between them keeps the
//! gate from flapping. Level-triggered. Idempotent. Boring on purpose.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

/// 🚦 The reader gate: open means read, closed means hold the line.
///
/// Built on a `watch` channel so the reader can simply await "open" without
/// polling, and so resume is naturally idempotent — only a real
/// closed → open transition changes the channel value and wakes the waiter.
/// Resuming an already-open gate is a no-op, observed by nobody, costing
/// nothing. The next line is read exactly once either way.
#[derive(Debug)]
pub(crate) struct ReaderGate {
    state: watch::Sender<bool>,
    /// 📊 Count of actual closed→open transitions. Cheap, and it turns
    /// "did we resume twice?" from a debugging séance into an assertion.
    resumes: AtomicU64,
}

impl ReaderGate {
    /// 🚀 A new gate starts open. Reading is the default state of a reader.
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(true);
        Self {
            state,
            resumes: AtomicU64::new(0),
        }
    }

    /// ⛔ Close the gate. Returns true if it was open. The reader finishes the
    /// line it is on (in-flight emission) and then holds position — the
    /// stream offset is preserved, nothing is re-read on resume.
    pub(crate) fn pause(&self) -> bool {
        self.state.send_if_modified(|open| {
            if *open {
                *open = false;
                true
            } else {
                false
            }
        })
    }

    /// ✅ Open the gate. Returns true only on a real closed→open transition;
    /// resuming an already-resumed gate does nothing, repeatedly, forever.
    pub(crate) fn resume(&self) -> bool {
        let transitioned = self.state.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        });
        if transitioned {
            self.resumes.fetch_add(1, Ordering::Relaxed);
        }
        transitioned
    }

    /// ⏳ Wait until the gate is open. Returns immediately if it already is.
    pub(crate) async fn wait_open(&self) {
        let mut rx = self.state.subscribe();
        // 🔒 The sender lives inside self, so it cannot drop while we hold
        // &self. wait_for only errs on a dropped sender. Hence: never.
        let _ = rx.wait_for(|open| *open).await;
    }

    pub(crate) fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// 📊 How many real resumes have happened. For logs and tests.
    pub(crate) fn resume_count(&self) -> u64 {
        self.resumes.load(Ordering::Relaxed)
    }
}

/// 🌊 The watermark watcher: depth readings in, gate calls out.
///
/// Called by the queue after every enqueue and every settle. The thresholds
/// are level-triggered: any depth above `high` closes the gate, any depth
/// below `low` opens it, and the gate itself absorbs the repeats. Ancient
/// proverb: "He who resumes on every completion below the watermark, wakes
/// the reader a thousand times and reads zero extra lines."
#[derive(Debug)]
pub(crate) struct WatermarkController {
    high: usize,
    low: usize,
}

impl WatermarkController {
    pub(crate) fn new(high: usize, low: usize) -> Self {
        debug_assert!(low < high, "crossed watermarks are a flapping machine");
        Self { high, low }
    }

    /// 📥 A task was just enqueued; `depth` is the new pending+in-flight count.
    pub(crate) fn on_enqueued(&self, depth: usize, gate: &ReaderGate) {
        if depth > self.high && gate.pause() {
            debug!(depth, high = self.high, "⛔ PAUSE reading — the dock is full");
        }
    }

    /// 📤 A task just settled; `depth` is the new pending+in-flight count.
    pub(crate) fn on_settled(&self, depth: usize, gate: &ReaderGate) {
        if depth < self.low && gate.resume() {
            debug!(depth, low = self.low, "✅ RESUME reading — the trucks caught up");
        }
    }
}
