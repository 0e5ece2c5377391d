//! ✂️ Splitter — where long text goes to become several shorter texts.
//!
//! 🎬 COLD OPEN — INT. PRODUCT CATALOG — AISLE 7
//!
//! A product description, 48KB long, written by someone who was paid by the
//! adjective. It cannot be indexed as one document. It must be... divided.
//! Humanely. With overlap, so no sentence wakes up alone on a chunk boundary
//! with no context and no memory of the paragraph it came from.
//!
//! 🦆
//!
//! The splitter is a pluggable contract: text in, ordered chunks out, no state
//! between calls. The pipeline neither knows nor cares how the cuts are chosen.
//! The pipeline just wants chunks. The pipeline is very goal-oriented.

use memchr::memrchr;

use crate::app_config::AppConfig;

/// ✂️ The splitter contract: one text blob in, ordered chunks out.
///
/// # Contract 📜
/// - Pure function of its input. No state across calls. No memory. Goldfish energy.
/// - Chunks are returned in document order; the builder tags them with ordinals.
/// - Empty input produces zero chunks (though the builder screens that out first).
/// - Every chunk except possibly the last fits within the configured size limit.
pub(crate) trait TextSplitter: std::fmt::Debug {
    fn split(&self, text: &str) -> Vec<String>;
}

/// 📄 The no-op splitter: the whole text is one chunk. Chunking disabled.
///
/// Selected when `chunk_size == 0`. It does one thing, and honestly,
/// "copy the string" is a job someone has to do.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WholeTextSplitter;

impl TextSplitter for WholeTextSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        }
    }
}

/// 🪟 Sliding character window with overlap and boundary manners.
///
/// Walks the text left to right, carving chunks of at most `chunk_size` bytes.
/// Within each window it prefers to cut after the last newline, then after the
/// last space (memchr does the backwards scanning, because scanning bytes by
/// hand in 2024 is a cry for help). If the window is one unbroken wall of
/// characters, it cuts at the size limit on a char boundary and moves on.
///
/// Each next chunk starts `chunk_overlap` bytes before the previous cut, so
/// consecutive chunks share a seam of context. The final chunk may be shorter
/// than `chunk_size`. Every chunk before it may not. This is the law.
///
/// ⚠️ Sizes are bytes, aligned outward to UTF-8 char boundaries. A multi-byte
/// character will never be bisected. We are splitters, not butchers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CharacterWindowSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CharacterWindowSplitter {
    /// 🚀 Build a window splitter. `chunk_overlap < chunk_size` is enforced
    /// upstream at config validation; the debug_assert is the tripwire for
    /// anyone constructing one by hand in a test and feeling adventurous.
    pub(crate) fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        debug_assert!(
            chunk_overlap < chunk_size,
            "overlap must be smaller than the chunk or the window never advances"
        );
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

/// 🔙 Largest char boundary ≤ `i`. (std has this, but behind a nightly gate.)
fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// 🔜 Smallest char boundary ≥ `i`.
fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

impl TextSplitter for CharacterWindowSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        // ✅ Fits in one chunk — no cutting, no ceremony, no suffix downstream.
        if text.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let bytes = text.as_bytes();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < text.len() {
            let remaining = text.len() - start;
            if remaining <= self.chunk_size {
                // 🏁 The tail fits. Take it all and go home.
                chunks.push(text[start..].to_string());
                break;
            }

            // 📏 Hard ceiling for this chunk, pulled back to a char boundary.
            let hard_end = floor_char_boundary(text, start + self.chunk_size);
            let cut = if hard_end <= start {
                // ⚠️ A single character wider than the whole chunk limit.
                // (chunk_size 1-3 bytes meets a 4-byte emoji.) Take the one
                // char whole — oversized but intact. Butchery remains banned.
                ceil_char_boundary(text, start + 1)
            } else {
                // 🔍 Prefer cutting after the last newline, then the last
                // space, inside the window. The separator stays with the left
                // chunk, same as the paragraph it ends.
                let window = &bytes[start..hard_end];
                memrchr(b'\n', window)
                    .or_else(|| memrchr(b' ', window))
                    .map(|i| start + i + 1)
                    .unwrap_or(hard_end)
            };

            chunks.push(text[start..cut].to_string());

            // 🔁 Step back by the overlap for the next chunk's start — but
            // always make forward progress, even when the overlap says otherwise.
            let step_back = cut.saturating_sub(self.chunk_overlap);
            start = ceil_char_boundary(text, step_back.max(start + 1));
        }

        chunks
    }
}

/// 🎭 The polymorphic splitter — resolved once from config, dispatched by match.
///
/// Same enum-dispatch pattern as the sources: trait → concrete impls →
/// enum → `from_config` resolver. The compiler monomorphizes each arm.
/// The match is a formality. The dispatch is basically free.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SplitterBackend {
    Window(CharacterWindowSplitter),
    Whole(WholeTextSplitter),
}

impl SplitterBackend {
    /// 🔧 `chunk_size > 0` → sliding window. `chunk_size == 0` → whole text.
    /// That's the entire decision tree. Some trees are shrubs.
    pub(crate) fn from_config(config: &AppConfig) -> Self {
        if config.chunk_size > 0 {
            Self::Window(CharacterWindowSplitter::new(
                config.chunk_size,
                config.chunk_overlap,
            ))
        } else {
            Self::Whole(WholeTextSplitter)
        }
    }
}

impl TextSplitter for SplitterBackend {
    fn split(&self, text: &str) -> Vec<String> {
        match self {
            Self::Window(s) => s.split(text),
            Self::Whole(s) => s.split(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_short_text_rides_as_a_single_chunk() {
        let splitter = CharacterWindowSplitter::new(100, 20);
        let chunks = splitter.split("hello world");
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn the_one_where_no_chunk_outgrows_the_limit_except_maybe_the_last() {
        let splitter = CharacterWindowSplitter::new(50, 10);
        let text = "the quick brown fox jumps over the lazy dog ".repeat(20);
        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1, "900 bytes should not fit in one 50-byte chunk");
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.len() <= 50,
                "non-final chunk of {} bytes broke the size law: {:?}",
                chunk.len(),
                chunk
            );
        }
    }

    #[test]
    fn the_one_where_overlap_makes_the_chunks_collectively_longer() {
        let splitter = CharacterWindowSplitter::new(40, 10);
        let text = "word ".repeat(60);
        let chunks = splitter.split(&text);
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        // 🔁 Overlap duplicates bytes, so the sum must meet or exceed the original.
        assert!(
            total >= text.len(),
            "overlap should duplicate context: {} combined < {} original",
            total,
            text.len()
        );
        // 🧩 Nothing is lost at the edges either.
        assert!(text.starts_with(chunks.first().unwrap().as_str()));
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
        for chunk in &chunks {
            assert!(text.contains(chunk.as_str()), "every chunk is a real substring");
        }
    }

    #[test]
    fn the_one_where_cuts_prefer_spaces_over_mid_word_carnage() {
        let splitter = CharacterWindowSplitter::new(20, 0);
        let text = "alpha bravo charlie delta echo foxtrot golf";
        let chunks = splitter.split(text);
        for chunk in &chunks[..chunks.len() - 1] {
            // ✅ Each non-final chunk ends on a separator — no word was harmed.
            assert!(
                chunk.ends_with(' '),
                "expected a space-terminated cut, got {:?}",
                chunk
            );
        }
    }

    #[test]
    fn the_one_where_a_wall_of_text_still_gets_cut_on_char_boundaries() {
        // 🧱 No spaces, no newlines, some multi-byte guests. The splitter must
        // fall back to hard cuts without bisecting a character.
        let splitter = CharacterWindowSplitter::new(10, 2);
        let text = "déjàvuüberraschungsmoment".repeat(4);
        let chunks = splitter.split(&text);
        for chunk in &chunks {
            assert!(std::str::from_utf8(chunk.as_bytes()).is_ok());
        }
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        assert!(total >= text.len());
    }

    #[test]
    fn the_one_where_the_whole_splitter_refuses_to_split() {
        let splitter = WholeTextSplitter;
        let chunks = splitter.split("everything, all at once");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "everything, all at once");
        assert!(splitter.split("").is_empty(), "empty in, nothing out");
    }
}
