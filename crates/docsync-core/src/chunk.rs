//! Overlapping-window text chunker.
//!
//! Splits extracted document text into [`Chunk`]s of at most `chunk_size`
//! characters, where consecutive chunks share up to `chunk_overlap`
//! characters so a fact spanning a boundary stays visible to retrieval.
//!
//! # Algorithm
//!
//! 1. Start a window at the current position; its hard limit is
//!    `start + chunk_size`.
//! 2. If the limit reaches the end of the text, the window ends there.
//! 3. Otherwise search the back half of the window for the best break, in
//!    order of preference: paragraph (`\n\n`), line, sentence end, word.
//!    Fall back to a hard cut at the limit.
//! 4. The next window starts `chunk_overlap` characters before the end of
//!    the previous one (nudged forward to a word start when possible),
//!    always making progress and never leaving a gap.
//!
//! Sizes and offsets are counted in characters, not bytes, so multi-byte
//! text never splits inside a code point.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use docsync_core::chunk::ChunkingProcessor;
//!
//! let processor = ChunkingProcessor::new(1000, 200);
//! let chunks = processor
//!     .process("Hello world.\n\nSecond paragraph.", "memo.txt", &BTreeMap::new())
//!     .unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_count, 1);
//! ```

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Chunk;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("no text could be extracted from {0}")]
    NoExtractableText(String),
}

/// Converts raw text into ordered, overlapping chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for ChunkingProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl ChunkingProcessor {
    /// `chunk_size` is clamped to at least 1 and `chunk_overlap` to less
    /// than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk `raw_text`, tagging every chunk with `source_name` and a copy
    /// of `base_metadata`.
    ///
    /// Text that is empty after trimming is an error: callers must not
    /// silently index nothing.
    pub fn process(
        &self,
        raw_text: &str,
        source_name: &str,
        base_metadata: &BTreeMap<String, String>,
    ) -> Result<Vec<Chunk>, ChunkError> {
        if raw_text.trim().is_empty() {
            return Err(ChunkError::NoExtractableText(source_name.to_string()));
        }

        let chars: Vec<char> = raw_text.chars().collect();
        let spans = split_spans(&chars, self.chunk_size, self.chunk_overlap);
        let chunk_count = spans.len() as i64;

        Ok(spans
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                let content: String = chars[start..end].iter().collect();
                make_chunk(
                    source_name,
                    i as i64,
                    chunk_count,
                    (start, end),
                    content,
                    base_metadata.clone(),
                )
            })
            .collect())
    }
}

/// Deterministic chunk id: the same `(source_name, chunk_index)` always maps
/// to the same id, so re-indexing overwrites instead of duplicating.
pub fn chunk_id(source_name: &str, chunk_index: i64) -> String {
    let key = format!("{}#{}", source_name, chunk_index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Compute `(start, end)` character spans covering all of `chars`.
fn split_spans(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let limit = (start + size).min(len);
        let end = if limit == len {
            len
        } else {
            find_break(chars, start + (size / 2).max(1), limit).unwrap_or(limit)
        };
        spans.push((start, end));
        if end == len {
            break;
        }

        let rewind = end.saturating_sub(overlap);
        start = if rewind > start {
            snap_to_word_start(chars, rewind, end)
        } else {
            end
        };
    }

    spans
}

type BreakRule = fn(&[char], usize) -> bool;

const BREAK_RULES: [BreakRule; 4] = [
    is_paragraph_break,
    is_line_break,
    is_sentence_break,
    is_word_break,
];

/// Latest end position in `[min_end, limit]` matching the most preferred rule.
fn find_break(chars: &[char], min_end: usize, limit: usize) -> Option<usize> {
    BREAK_RULES
        .iter()
        .find_map(|rule| (min_end..=limit).rev().find(|&p| rule(chars, p)))
}

fn is_paragraph_break(chars: &[char], p: usize) -> bool {
    p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n'
}

fn is_line_break(chars: &[char], p: usize) -> bool {
    p >= 1 && chars[p - 1] == '\n'
}

fn is_sentence_break(chars: &[char], p: usize) -> bool {
    p >= 2 && chars[p - 1].is_whitespace() && matches!(chars[p - 2], '.' | '!' | '?')
}

fn is_word_break(chars: &[char], p: usize) -> bool {
    p >= 1 && chars[p - 1].is_whitespace()
}

/// First word start in `[from, end)`, or `from` if there is none.
fn snap_to_word_start(chars: &[char], from: usize, end: usize) -> usize {
    (from..end)
        .find(|&p| p == 0 || chars[p - 1].is_whitespace())
        .unwrap_or(from)
}

fn make_chunk(
    source_name: &str,
    index: i64,
    count: i64,
    (start, end): (usize, usize),
    content: String,
    provenance: BTreeMap<String, String>,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(source_name, index),
        content,
        source_name: source_name.to_string(),
        chunk_index: index,
        chunk_count: count,
        start_offset: start,
        end_offset: end,
        hash,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
        ChunkingProcessor::new(size, overlap)
            .process(text, "doc.txt", &BTreeMap::new())
            .unwrap()
    }

    fn assert_covers(text: &str, chunks: &[Chunk]) {
        let len = text.chars().count();
        let mut covered = vec![false; len];
        for c in chunks {
            for slot in covered.iter_mut().take(c.end_offset).skip(c.start_offset) {
                *slot = true;
            }
        }
        let gap = covered.iter().position(|c| !c);
        assert_eq!(gap, None, "character index {:?} not covered", gap);
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = process("Hello, world!", 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].chunk_count, 1);
        assert_eq!(chunks[0].content, "Hello, world!");
    }

    #[test]
    fn test_whitespace_only_is_error() {
        let err = ChunkingProcessor::default()
            .process("  \n\t\n ", "blank.txt", &BTreeMap::new())
            .unwrap_err();
        assert_eq!(err, ChunkError::NoExtractableText("blank.txt".to_string()));
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let text = format!("{}\n\n{}", first, second);
        let chunks = process(&text, 100, 10);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].content, format!("{}\n\n", first));
    }

    #[test]
    fn test_prefers_sentence_over_word_boundary() {
        let text = "One two three four. Five six seven eight nine ten eleven twelve";
        let chunks = process(text, 30, 5);
        assert_eq!(chunks[0].content, "One two three four. ");
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "x".repeat(250);
        let chunks = process(&text, 100, 20);
        assert_eq!(chunks[0].content.len(), 100);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 100));
        assert_covers(&text, &chunks);
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = process(&text, 120, 40);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset < pair[0].end_offset);
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
    }

    #[test]
    fn test_indices_contiguous_and_count_matches() {
        let text = (0..80)
            .map(|i| format!("Paragraph number {} has a sentence. And another one.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = process(&text, 300, 60);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.chunk_count, chunks.len() as i64);
        }
        assert_covers(&text, &chunks);
    }

    #[test]
    fn test_coverage_across_sizes() {
        let text = "Lorem ipsum dolor sit amet.\nConsectetur adipiscing elit!\n\nSed do eiusmod? Tempor incididunt ut labore et dolore magna aliqua. ".repeat(12);
        for (size, overlap) in [(1, 0), (7, 3), (40, 39), (64, 0), (200, 50), (5000, 200)] {
            let chunks = process(&text, size, overlap);
            assert_covers(&text, &chunks);
            assert!(chunks.iter().all(|c| c.content.chars().count() <= size));
        }
    }

    #[test]
    fn test_multibyte_text() {
        let text = "┌──────────────────┐\n│ Grüße aus Zürich │\n└──────────────────┘";
        let chunks = process(text, 9, 2);
        assert_covers(text, &chunks);
        for c in &chunks {
            let expected: String = text
                .chars()
                .skip(c.start_offset)
                .take(c.end_offset - c.start_offset)
                .collect();
            assert_eq!(c.content, expected);
        }
    }

    #[test]
    fn test_deterministic_ids_and_hashes() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = process(text, 8, 2);
        let c2 = process(text, 8, 2);
        assert_eq!(c1, c2);
        assert_eq!(c1[1].id, chunk_id("doc.txt", 1));
        assert_ne!(chunk_id("doc.txt", 0), chunk_id("other.txt", 0));
    }

    #[test]
    fn test_metadata_copied_to_every_chunk() {
        let mut meta = BTreeMap::new();
        meta.insert("document_id".to_string(), "42".to_string());
        let chunks = ChunkingProcessor::new(10, 2)
            .process("some words that will need several chunks", "n.txt", &meta)
            .unwrap();
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.provenance == meta));
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let p = ChunkingProcessor::new(10, 50);
        assert_eq!(p.chunk_overlap(), 9);
        let p = ChunkingProcessor::new(0, 0);
        assert_eq!(p.chunk_size(), 1);
    }
}
