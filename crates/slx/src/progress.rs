//! 📊 progress.rs — the "are we there yet?" of bulk ingestion.
//!
//! 🚀 One progress bar, one comfy table, three numbers that matter: how many
//! bytes of the file are behind us, how many records became documents, and
//! how long until we can all go home.
//!
//! ⚠️  Watching the bar does not make the cluster index faster. We checked.
//!
//! 🦆 The duck likes the bar. The duck has simple tastes.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. MiB, not MB. the 4.8% difference is real and it matters.
const MIB: u64 = 1024 * 1024;

/// 📦 Bytes → human string, scaled to the size of the file so the units stay
/// consistent for the whole run instead of hopping between KiB and MiB.
fn format_bytes(bytes: u64, file_size: u64) -> String {
    if file_size >= 512 * MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if file_size >= MIB {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        // -- 🐛 raw bytes. small files deserve progress bars too.
        format!("{} bytes", bytes)
    }
}

/// 🔢 Commas every three digits. "1,000,000 docs" reads; "1000000 docs" hurts.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Duration → MM:SS, or HH:MM:SS for the runs you tell stories about later.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 Instantaneous-ish throughput, from the sliding window.
struct Rates {
    /// 📄 input records parsed per second
    records_per_sec: f64,
    /// 🎯 documents built per second (≥ records/s when chunking fans out)
    docs_per_sec: f64,
    /// 📦 MiB of file consumed per second — the honest metric
    mib_per_sec: f64,
}

/// 📊 The live scoreboard for an ingest run.
///
/// Fed absolute byte offsets straight from the reader (the reader already
/// knows exactly where it is in the file, no point keeping a second set of
/// books) plus running record/document counts. Rates come from a 5-second
/// sliding window so a single slow bulk call doesn't make the display gasp.
///
/// # Ancient Proverb
/// "He who ingests forty gigabytes without a progress bar, checks `du` in a
/// second terminal like a caveman."
pub(crate) struct IngestProgress {
    /// 🏷️ the file name, for the header line
    source_name: String,
    /// 📏 total file size in bytes; 0 means unknown and percent goes dark
    file_size: u64,
    /// 📦 absolute byte offset the reader has reached
    bytes_read: u64,
    /// 📄 input records parsed so far
    records: u64,
    /// 🎯 documents built so far — chunking makes this outrun `records`
    docs: u64,
    /// 🎨 the indicatif bar doing the actual terminal witchcraft
    progress_bar: ProgressBar,
    /// 🔄 (timestamp, bytes, records, docs) samples for the rate window
    rate_samples: VecDeque<(Instant, u64, u64, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for IngestProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar doesn't derive Debug, and honestly, fair.
        f.debug_struct("IngestProgress")
            .field("source_name", &self.source_name)
            .field("file_size", &self.file_size)
            .field("bytes_read", &self.bytes_read)
            .field("records", &self.records)
            .field("docs", &self.docs)
            .finish()
    }
}

impl IngestProgress {
    pub(crate) fn new(source_name: String, file_size: u64) -> Self {
        let progress_bar = ProgressBar::new(file_size);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n| [{bar:40.cyan/blue}]")
                .unwrap() // -- 🐛 hardcoded template, verified by eyeball, twice
                .progress_chars("=>-"),
        );

        let start_time = Instant::now();
        // -- 🔄 seed the window at t=0 so the first rate isn't a divide-by-zero
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64, 0u64, 0u64));

        Self {
            source_name,
            file_size,
            bytes_read: 0,
            records: 0,
            docs: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Refresh the display with the reader's current byte offset and the
    /// latest counts. `bytes_read` is ABSOLUTE, not a delta — the reader is
    /// the single source of truth for where we are in the file.
    pub(crate) fn update(&mut self, bytes_read: u64, records: u64, docs: u64) {
        self.bytes_read = bytes_read;
        self.records = records;
        self.docs = docs;

        let rates = self.calculate_rates();
        self.render(rates);
        self.progress_bar.set_position(self.bytes_read);
    }

    /// ✅ EOF reached, queue drained, bar finished. Ring the bell.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    /// 📈 Rates over a 5-second sliding window: evict stale samples from the
    /// front, push the present, diff against the oldest survivor.
    fn calculate_rates(&mut self) -> Rates {
        let now = Instant::now();
        let window = Duration::from_secs(5);
        while let Some(&(timestamp, _, _, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > window {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }

        self.rate_samples
            .push_back((now, self.bytes_read, self.records, self.docs));

        if let Some(&(oldest_time, oldest_bytes, oldest_records, oldest_docs)) =
            self.rate_samples.front()
        {
            let elapsed = now.duration_since(oldest_time).as_secs_f64();
            if elapsed > 0.0 {
                let bytes_delta = self.bytes_read.saturating_sub(oldest_bytes);
                let records_delta = self.records.saturating_sub(oldest_records);
                let docs_delta = self.docs.saturating_sub(oldest_docs);
                return Rates {
                    records_per_sec: records_delta as f64 / elapsed,
                    docs_per_sec: docs_delta as f64 / elapsed,
                    mib_per_sec: (bytes_delta as f64 / elapsed) / MIB as f64,
                };
            }
        }

        // -- 💤 window too young for math. zeros, served with composure.
        Rates {
            records_per_sec: 0.0,
            docs_per_sec: 0.0,
            mib_per_sec: 0.0,
        }
    }

    /// 🎨 Render the table onto the bar's message. Four rows, two columns,
    /// NOTHING preset — the borders looked bad, we checked that too.
    fn render(&self, rates: Rates) {
        let percent = if self.file_size > 0 {
            (self.bytes_read as f64 / self.file_size as f64) * 100.0
        } else {
            0.0
        };

        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 {
            // 🔮 linear extrapolation. the future rarely looks like the past,
            // but for a sequential file read it mostly does.
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            let remaining_secs = total_estimated - elapsed.as_secs_f64();
            if remaining_secs > 0.0 {
                format_duration(Duration::from_secs_f64(remaining_secs))
            } else {
                "--:--".to_string()
            }
        } else {
            "--:--".to_string()
        };

        let bytes_progress = format!(
            "{} / {}",
            format_bytes(self.bytes_read, self.file_size),
            format_bytes(self.file_size, self.file_size)
        );

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        // 📄 row 1: records in
        table.add_row(vec![
            Cell::new(format!("{} recs/s", format_number(rates.records_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} records", format_number(self.records)))
                .set_alignment(CellAlignment::Right),
        ]);
        // 🎯 row 2: documents out (chunking makes these two rows disagree, on purpose)
        table.add_row(vec![
            Cell::new(format!("{} docs/s", format_number(rates.docs_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} docs", format_number(self.docs)))
                .set_alignment(CellAlignment::Right),
        ]);
        // 📦 row 3: bytes
        table.add_row(vec![
            Cell::new(format!("{:.2} MiB/s", rates.mib_per_sec))
                .set_alignment(CellAlignment::Right),
            Cell::new(bytes_progress).set_alignment(CellAlignment::Right),
        ]);
        // ⏱️ row 4: the clock
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} remaining ({:.2}%)", remaining, percent))
                .set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("file: {}\n{}", self.source_name, table));
    }
}
