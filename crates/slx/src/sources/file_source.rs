use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::{
    fs::File,
    io::{self, AsyncBufReadExt},
};
use tracing::trace;

use crate::common::Record;
use crate::sources::RecordSource;

/// 📂 FileSource — reads NDJSON line by line, parses each line into a record,
/// and never holds more than one line in memory. The whole "bounded memory"
/// promise of this tool starts right here, with a BufReader and restraint.
///
/// 🧵 Async, non-blocking. The BufReader wraps a tokio `File`, so we're doing
/// real async I/O, not `std::fs` wearing a futures trenchcoat.
/// 📏 Tracks bytes and line numbers — bytes feed the progress bar, line
/// numbers feed the error message you'll actually read at 3am.
/// ⚠️  If the file is being appended to while we read it, the size estimate
///     will be wrong. This is fine. We are fine. Everything is fine. 🐛
#[derive(Debug)]
pub(crate) struct FileSource {
    buf_reader: io::BufReader<File>,
    /// ♻️ Reused line buffer — one allocation, many lines. The allocator
    /// sends its regards.
    line: String,
    line_number: u64,
    bytes_read: u64,
    file_size: u64,
}

impl FileSource {
    /// 🚀 Opens the input file, grabs its size for the progress bar, wraps it
    /// in a BufReader, and returns a FileSource ready to vend records.
    ///
    /// If the file doesn't exist: 💀 anyhow will tell you with *theatrical flair*.
    /// If metadata fails: we assume 0 bytes, progress shows unknown. Shrug
    /// emoji as a service.
    pub(crate) async fn new(path: &Path) -> Result<Self> {
        let file_handle = File::open(path).await.with_context(|| {
            format!(
                "💀 The door to '{}' would not budge. We knocked. We pleaded. \
                We checked if it existed (it might not). We checked permissions (they might be wrong). \
                The door remained closed. The file remains unopened. We remain outside.",
                path.display()
            )
        })?;

        let file_size = file_handle.metadata().await.map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            buf_reader: io::BufReader::new(file_handle),
            line: String::with_capacity(64 * 1024),
            line_number: 0,
            bytes_read: 0,
            file_size,
        })
    }

    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub(crate) fn file_size(&self) -> u64 {
        self.file_size
    }
}

#[async_trait]
impl RecordSource for FileSource {
    /// 📄 Read lines until one contains a record (blank lines are skipped),
    /// parse it, return it. `None` at EOF. An unparseable line is the end of
    /// everything — the error names the line number, because "invalid JSON"
    /// with no address is a ransom note, not a diagnostic.
    async fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            self.line.clear();
            let bytes = self.buf_reader.read_line(&mut self.line).await?;
            if bytes == 0 {
                // 🏁 The well is dry. EOF. The file has said all it came to say.
                trace!("📖 end of input after {} lines", self.line_number);
                return Ok(None);
            }
            self.bytes_read += bytes as u64;
            self.line_number += 1;

            // 🧹 read_line keeps the \n (and \r\n on Windows). We don't want them.
            let trimmed = self.line.trim_end_matches('\n').trim_end_matches('\r');
            if trimmed.is_empty() {
                continue;
            }

            let record: Record = serde_json::from_str(trimmed).with_context(|| {
                format!(
                    "💀 Line {} is not a valid JSON record. The pipeline is fail-fast on parse errors — one bad line stops the run, on purpose, because a corrupt input file deserves attention, not a partial ingest. Line starts with: {:?}",
                    self.line_number,
                    trimmed.chars().take(80).collect::<String>()
                )
            })?;
            return Ok(Some(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn source_from(contents: &str) -> (FileSource, tempfile::NamedTempFile) {
        let mut tmp = tempfile::NamedTempFile::new().expect("💀 tempfile refused to exist");
        tmp.write_all(contents.as_bytes()).unwrap();
        let source = FileSource::new(tmp.path()).await.unwrap();
        (source, tmp)
    }

    #[tokio::test]
    async fn the_one_where_lines_become_records_in_order() {
        let (mut source, _tmp) =
            source_from("{\"id\":\"a\",\"text\":\"one\"}\n{\"id\":\"b\",\"text\":\"two\"}\n").await;

        let first = source.next_record().await.unwrap().expect("💀 line 1 exists");
        assert_eq!(first["id"], "a");
        let second = source.next_record().await.unwrap().expect("💀 line 2 exists");
        assert_eq!(second["id"], "b");
        assert!(source.next_record().await.unwrap().is_none(), "then EOF, forever");
        assert!(source.bytes_read() > 0);
    }

    #[tokio::test]
    async fn the_one_where_blank_lines_are_skipped_without_comment() {
        let (mut source, _tmp) = source_from("\n\n{\"id\":\"a\",\"text\":\"x\"}\n\n").await;
        let record = source.next_record().await.unwrap().expect("💀 the one real line");
        assert_eq!(record["id"], "a");
        assert!(source.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn the_one_where_a_malformed_line_ends_the_whole_run() {
        let (mut source, _tmp) =
            source_from("{\"id\":\"a\",\"text\":\"fine\"}\nthis is not json\n").await;
        source.next_record().await.unwrap();

        let err = source
            .next_record()
            .await
            .expect_err("💀 parse errors are fatal, not advisory");
        assert!(
            err.to_string().contains("Line 2"),
            "the error must name the crime scene: {err:#}"
        );
    }

    #[tokio::test]
    async fn the_one_where_a_missing_file_fails_with_theatrical_flair() {
        let err = FileSource::new(Path::new("/definitely/not/a/real/file.ndjson"))
            .await
            .expect_err("💀 opening the void should fail");
        assert!(err.to_string().contains("would not budge"));
    }
}
