//! Overlapping text chunker.
//!
//! Splits a [`Document`]'s text into windows of at most `chunk_size`
//! characters where consecutive windows share exactly `chunk_overlap`
//! characters. Window ends snap backward to the best available boundary —
//! paragraph break, then line break, then sentence ender, then whitespace —
//! before falling back to a hard character cut, so semantic units survive
//! the split where possible.
//!
//! All arithmetic is over `char` indices: the corpus is Chinese and byte
//! slicing would land mid-codepoint.

use crate::error::RagError;
use crate::models::{Chunk, Document};

/// Sentence-ending punctuation considered a split boundary (CJK and ASCII).
const SENTENCE_ENDERS: [char; 6] = ['。', '！', '？', '.', '!', '?'];

/// Splits documents into overlapping chunks. Construction validates the
/// window geometry once so `split` itself cannot fail.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk_overlap ({}) must be strictly less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Split a document into chunks. Every chunk inherits the document's
    /// source verbatim. Invariant: chunk i+1 begins exactly `chunk_overlap`
    /// characters before chunk i ends, so coverage is gap-free and the
    /// original text is reconstructable.
    pub fn split(&self, doc: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = doc.text.chars().collect();
        let n = chars.len();

        if n <= self.chunk_size {
            return vec![Chunk {
                text: doc.text.clone(),
                source: doc.source.clone(),
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let hard_end = (start + self.chunk_size).min(n);
            let end = if hard_end == n {
                n
            } else {
                self.snap_end(&chars, start, hard_end)
            };

            chunks.push(Chunk {
                text: chars[start..end].iter().collect(),
                source: doc.source.clone(),
            });

            if end == n {
                break;
            }
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// Pick the window end: scan backward from the hard cut for the best
    /// boundary, never retreating past `floor` (which guarantees the next
    /// window starts after the current one).
    fn snap_end(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + self.chunk_overlap + 1;

        // Paragraph break: chunk ends right after "\n\n".
        for end in (floor..=hard_end).rev() {
            if end >= start + 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n' {
                return end;
            }
        }
        // Line break.
        for end in (floor..=hard_end).rev() {
            if chars[end - 1] == '\n' {
                return end;
            }
        }
        // Sentence ender.
        for end in (floor..=hard_end).rev() {
            if SENTENCE_ENDERS.contains(&chars[end - 1]) {
                return end;
            }
        }
        // Whitespace.
        for end in (floor..=hard_end).rev() {
            if chars[end - 1].is_whitespace() {
                return end;
            }
        }
        hard_end
    }
}
