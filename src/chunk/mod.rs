//! Text chunking for embedding
//!
//! Splits document text into overlapping fixed-size spans. Cuts prefer
//! structural breaks by decreasing granularity (paragraph, line, character)
//! so a span never silently drops leading or trailing content, and every
//! cut lands on a UTF-8 character boundary.

use crate::config::ChunkConfig;
use crate::error::{Error, Result};

/// A bounded span of a document's text, the atomic unit submitted for
/// embedding. Positions are counted in characters, not bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The span content
    pub text: String,

    /// Chunk index within the document (0-based)
    pub index: usize,

    /// Character start position in the original document
    pub char_start: usize,

    /// Character end position in the original document (exclusive)
    pub char_end: usize,
}

/// Splits text into overlapping spans of at most `chunk_size` characters.
///
/// Consecutive spans from the same document share exactly `chunk_overlap`
/// characters: the next span always starts `chunk_overlap` characters before
/// the previous span's end, whether or not that end was snapped to a
/// structural break.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Create a chunker, validating `0 < chunk_overlap < chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Validation(
                "chunk_size must be positive".to_string(),
            ));
        }
        if chunk_overlap == 0 {
            return Err(Error::Validation(
                "chunk_overlap must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Validation(format!(
                "chunk_overlap ({chunk_overlap}) must be < chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Create a chunker from configuration
    pub fn from_config(config: &ChunkConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Lazily iterate the spans of `text`. An empty document yields an
    /// empty iterator, not an error. Calling this again restarts the
    /// sequence from the beginning.
    pub fn chunk<'a>(&self, text: &'a str) -> Chunks<'a> {
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());

        Chunks {
            text,
            boundaries,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            start: 0,
            index: 0,
            done: false,
        }
    }
}

/// Lazy iterator over the chunks of one document
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of each character, plus a trailing `text.len()`
    boundaries: Vec<usize>,
    chunk_size: usize,
    chunk_overlap: usize,
    /// Next span start, in characters
    start: usize,
    index: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn total_chars(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Map an absolute byte offset back to a character position. Offsets
    /// handed in are produced from ASCII separator matches, so they are
    /// always character boundaries; the fallback only guards the arithmetic.
    fn char_pos(&self, byte: usize, fallback: usize) -> usize {
        self.boundaries.binary_search(&byte).unwrap_or(fallback)
    }

    /// Pick the end of the span starting at `start`, preferring the last
    /// paragraph break inside the window, then the last line break, then a
    /// plain character cut at the window edge. A break is only taken when it
    /// leaves the span longer than the overlap, which guarantees the next
    /// start advances.
    fn select_end(&self, start: usize, window_end: usize) -> usize {
        let window = &self.text[self.boundaries[start]..self.boundaries[window_end]];
        let min_end = start + self.chunk_overlap;

        if let Some(i) = window.rfind("\n\n") {
            let pos = self.char_pos(self.boundaries[start] + i + 2, window_end);
            if pos > min_end {
                return pos;
            }
        }

        if let Some(i) = window.rfind('\n') {
            let pos = self.char_pos(self.boundaries[start] + i + 1, window_end);
            if pos > min_end {
                return pos;
            }
        }

        window_end
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.start >= self.total_chars() {
            return None;
        }

        let total = self.total_chars();
        let window_end = std::cmp::min(self.start + self.chunk_size, total);

        let end = if window_end == total {
            self.done = true;
            total
        } else {
            self.select_end(self.start, window_end)
        };

        let chunk = Chunk {
            text: self.text[self.boundaries[self.start]..self.boundaries[end]].to_string(),
            index: self.index,
            char_start: self.start,
            char_end: end,
        };

        self.index += 1;
        if !self.done {
            self.start = end - self.chunk_overlap;
        }

        Some(chunk)
    }
}
