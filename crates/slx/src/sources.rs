//! 🚰 Sources — where the records come from.
//!
//! 🚰 Source backends pour the records, the pipeline slurps them up.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! Two backends: the file source (the one users mean) and the in-memory
//! source (the one tests mean). Same trait, same enum-dispatch casting call
//! as the splitter. The pipeline never knows which one it married.
//!
//! 🦆 The duck is here because every module must have one. Still law.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::Record;

pub(crate) mod file_source;
pub(crate) mod in_mem_source;

/// 🚰 A source that produces records, one per input line.
///
/// # Contract 📜
/// - `next_record` yields parsed records until the well runs dry, then `None`.
/// - Blank lines are skipped, silently. They carry no record and no sorrow.
/// - A line that fails to parse is FATAL — the error propagates and the run
///   stops. Fail-fast is the house policy: a malformed line means the file
///   is not what you thought it was, and "keep going" is how half a catalog
///   ends up indexed with nobody noticing until Thursday.
/// - The borrow checker demands `&mut self` because sources have state.
///   And feelings. Mostly state.
#[async_trait]
pub(crate) trait RecordSource: std::fmt::Debug {
    async fn next_record(&mut self) -> Result<Option<Record>>;
}

/// 🎭 The many faces of a Source — a polymorphic casting call for record origins.
///
/// The enum dispatches via `impl RecordSource for SourceBackend`, so the
/// pipeline never needs to know (or care) whether records come from disk
/// or from a `Vec` a test made up five lines ago.
#[derive(Debug)]
pub(crate) enum SourceBackend {
    File(file_source::FileSource),
    InMemory(in_mem_source::InMemorySource),
}

#[async_trait]
impl RecordSource for SourceBackend {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        match self {
            SourceBackend::File(f) => f.next_record().await,
            SourceBackend::InMemory(m) => m.next_record().await,
        }
    }
}

impl SourceBackend {
    /// 📊 (bytes consumed so far, total bytes if known) — fuel for the
    /// progress display. The in-memory source reports zeros and the progress
    /// bar gracefully shows nothing, which is fair, because there is nothing.
    pub(crate) fn byte_progress(&self) -> (u64, u64) {
        match self {
            SourceBackend::File(f) => (f.bytes_read(), f.file_size()),
            SourceBackend::InMemory(_) => (0, 0),
        }
    }
}
