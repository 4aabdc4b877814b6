//! Page-aware text splitting.
//!
//! [`TextSplitter`] is the seam between the pipeline and whatever chunker the
//! deployment uses: it receives a [`PaginatedDocument`] and must return
//! [`PageChunk`]s that keep the page number of the text they came from.
//!
//! [`SentenceSplitter`] is the built-in implementation. It never lets a chunk
//! span two pages, so page attribution is exact.
//!
//! # Algorithm
//!
//! 1. Convert `chunk_size` and `chunk_overlap` (tokens) to characters using a
//!    4 chars/token ratio.
//! 2. For each non-blank page, split on `\n\n` paragraph boundaries and
//!    accumulate paragraphs until the next one would exceed the budget.
//! 3. Paragraphs larger than the budget are hard-split at the nearest
//!    newline or space boundary.
//! 4. Every chunk after the first on a page is prefixed with the tail of the
//!    previous chunk (at most `chunk_overlap` tokens, cut on a word boundary).
//!
//! # Example
//!
//! ```rust
//! use table_rag_core::chunk::{SentenceSplitter, TextSplitter};
//! use table_rag_core::models::{PageText, PaginatedDocument};
//!
//! let doc = PaginatedDocument {
//!     document_id: "doc1".to_string(),
//!     pages: vec![
//!         PageText { page: 1, text: String::new() },
//!         PageText { page: 2, text: "Hello world".to_string() },
//!     ],
//! };
//! let chunks = SentenceSplitter::new(512, 200).unwrap().split(&doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].page, 2);
//! ```

use anyhow::{bail, Result};

use crate::models::{PageChunk, PaginatedDocument};

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Splits a paginated document into page-attributed chunks.
pub trait TextSplitter: Send + Sync {
    fn split(&self, document: &PaginatedDocument) -> Vec<PageChunk>;
}

/// Paragraph-boundary splitter with a token budget and overlap.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceSplitter {
    /// `chunk_size` and `chunk_overlap` are in tokens. The overlap must be
    /// smaller than the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn split_page(&self, text: &str) -> Vec<String> {
        let max_chars = self.chunk_size * CHARS_PER_TOKEN;
        let pieces = split_paragraphs(text, max_chars);
        apply_overlap(pieces, self.chunk_overlap * CHARS_PER_TOKEN)
    }
}

impl TextSplitter for SentenceSplitter {
    fn split(&self, document: &PaginatedDocument) -> Vec<PageChunk> {
        let mut out = Vec::new();
        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            for text in self.split_page(&page.text) {
                out.push(PageChunk {
                    page: page.page,
                    text,
                });
            }
        }
        out
    }
}

fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = hard_split_point(remaining, max_chars);
                let piece = remaining[..split_at].trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
                remaining = &remaining[split_at..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(current_buf);
    }

    chunks
}

/// Byte offset at which to cut `s` so the head fits in `max_chars`,
/// preferring a newline, then a space. Always makes progress.
fn hard_split_point(s: &str, max_chars: usize) -> usize {
    if s.len() <= max_chars {
        return s.len();
    }
    let limit = snap_to_char_boundary(s, max_chars);
    let split = s[..limit]
        .rfind('\n')
        .or_else(|| s[..limit].rfind(' '))
        .map(|pos| pos + 1)
        .unwrap_or(limit);
    if split == 0 {
        s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len())
    } else {
        split
    }
}

fn apply_overlap(pieces: Vec<String>, overlap_chars: usize) -> Vec<String> {
    if overlap_chars == 0 || pieces.len() < 2 {
        return pieces;
    }
    let mut out = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.iter().enumerate() {
        if i == 0 {
            out.push(piece.clone());
            continue;
        }
        let tail = overlap_tail(&pieces[i - 1], overlap_chars);
        if tail.is_empty() {
            out.push(piece.clone());
        } else {
            out.push(format!("{} {}", tail, piece));
        }
    }
    out
}

/// Last `overlap_chars` of `s`, starting at a word boundary.
fn overlap_tail(s: &str, overlap_chars: usize) -> &str {
    if s.len() <= overlap_chars {
        return s.trim();
    }
    let mut start = s.len() - overlap_chars;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    let tail = &s[start..];
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim(),
        None => "",
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
