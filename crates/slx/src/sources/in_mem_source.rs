use std::collections::VecDeque;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::common::Record;
use crate::sources::RecordSource;

/// 🧪 InMemorySource — a file that never touched a disk.
///
/// Hand it the lines a file WOULD have contained and it vends records with
/// the exact same contract as [`FileSource`](crate::sources::file_source::FileSource):
/// blank lines skipped, parse errors fatal, `None` at the end. Tests get the
/// full pipeline behavior without a single syscall. The filesystem was not
/// consulted and prefers it that way.
#[derive(Debug)]
pub(crate) struct InMemorySource {
    lines: VecDeque<String>,
    line_number: u64,
}

impl InMemorySource {
    pub(crate) fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            line_number: 0,
        }
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        while let Some(line) = self.lines.pop_front() {
            self.line_number += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(trimmed).with_context(|| {
                format!("💀 In-memory line {} is not a valid JSON record", self.line_number)
            })?;
            return Ok(Some(record));
        }
        Ok(None)
    }
}
