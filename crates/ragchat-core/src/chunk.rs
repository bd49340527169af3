//! Paragraph-boundary document chunker.
//!
//! Splits extracted document text into [`DocumentChunk`]s that respect a
//! `max_tokens` budget. Each chunk records the byte offset of its first
//! character in the source text; the normalizer derives the record id from
//! `(document, offset)`, so chunking the same text twice yields the same ids.
//!
//! # Algorithm
//!
//! 1. Convert `max_tokens` to `max_chars` using a 4 chars/token ratio.
//! 2. Split text on `\n\n` paragraph boundaries, remembering offsets.
//! 3. Accumulate paragraphs into a buffer until the next one would exceed
//!    `max_chars`, then flush the buffer as a chunk.
//! 4. A single paragraph longer than `max_chars` is hard-split at the
//!    nearest newline or space, falling back to a char boundary.
//!
//! Blank text produces no chunks.
//!
//! ```rust
//! use ragchat_core::chunk::chunk_document;
//!
//! let chunks = chunk_document("notes.md", "Hello world.\n\nSecond paragraph.", 700, "text/markdown");
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].offset, 0);
//! ```

use sha2::{Digest, Sha256};

use crate::models::DocumentChunk;

/// Approximate characters-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

pub fn chunk_document(
    document: &str,
    text: &str,
    max_tokens: usize,
    content_type: &str,
) -> Vec<DocumentChunk> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut builder = ChunkBuilder::new(document, content_type);

    for (offset, para) in paragraphs(text) {
        let would_be = if builder.buf.is_empty() {
            para.len()
        } else {
            builder.buf.len() + 2 + para.len()
        };

        if would_be > max_chars && !builder.buf.is_empty() {
            builder.flush();
        }

        if para.len() > max_chars {
            builder.flush();
            builder.hard_split(offset, para, max_chars);
        } else {
            if builder.buf.is_empty() {
                builder.buf_offset = offset;
            } else {
                builder.buf.push_str("\n\n");
            }
            builder.buf.push_str(para);
        }
    }

    builder.flush();
    builder.chunks
}

/// Non-blank paragraphs with the byte offset of their first non-space char.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices("\n\n") {
        spans.push((start, &text[start..idx]));
        start = idx + 2;
    }
    spans.push((start, &text[start..]));

    spans
        .into_iter()
        .filter_map(|(offset, para)| {
            let lead = para.len() - para.trim_start().len();
            let trimmed = para.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some((offset + lead, trimmed))
            }
        })
        .collect()
}

struct ChunkBuilder<'a> {
    document: &'a str,
    content_type: &'a str,
    chunks: Vec<DocumentChunk>,
    buf: String,
    buf_offset: usize,
}

impl<'a> ChunkBuilder<'a> {
    fn new(document: &'a str, content_type: &'a str) -> Self {
        Self {
            document,
            content_type,
            chunks: Vec::new(),
            buf: String::new(),
            buf_offset: 0,
        }
    }

    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buf);
        self.emit(self.buf_offset, &text);
    }

    fn emit(&mut self, offset: usize, text: &str) {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        self.chunks.push(DocumentChunk {
            document: self.document.to_string(),
            offset,
            index: self.chunks.len(),
            text: text.to_string(),
            content_type: self.content_type.to_string(),
            hash,
        });
    }

    fn hard_split(&mut self, base: usize, para: &str, max_chars: usize) {
        let mut pos = 0;
        while pos < para.len() {
            let remaining = &para[pos..];
            let split_at = snap_to_char_boundary(remaining, remaining.len().min(max_chars));
            let split_at = if split_at == 0 {
                remaining
                    .char_indices()
                    .nth(1)
                    .map(|(i, _)| i)
                    .unwrap_or(remaining.len())
            } else {
                split_at
            };
            let actual_split = if split_at < remaining.len() {
                remaining[..split_at]
                    .rfind('\n')
                    .or_else(|| remaining[..split_at].rfind(' '))
                    .map(|p| p + 1)
                    .unwrap_or(split_at)
            } else {
                split_at
            };

            let piece = &remaining[..actual_split];
            let lead = piece.len() - piece.trim_start().len();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                self.emit(base + pos + lead, trimmed);
            }
            pos += actual_split;
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    fn first_paragraph(chunk: &DocumentChunk) -> &str {
        chunk.text.split("\n\n").next().unwrap_or("")
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_document("doc", "Hello, world!", 700, "text/plain");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_document("doc", "", 700, "text/plain").is_empty());
        assert!(chunk_document("doc", "  \n\n \n", 700, "text/plain").is_empty());
    }

    #[test]
    fn paragraphs_merge_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_document("doc", text, 700, "text/plain");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Third paragraph."));
    }

    #[test]
    fn offsets_point_into_source_text() {
        let text = "  Intro line.\n\nThis is paragraph two.\n\n\n\nThis is paragraph three, which is longer.";
        let chunks = chunk_document("doc", text, 5, "text/plain");
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert!(
                text[c.offset..].starts_with(first_paragraph(c)),
                "chunk {} at offset {} does not match source",
                i,
                c.offset
            );
        }
        assert_eq!(chunks[0].offset, 2);
    }

    #[test]
    fn offsets_strictly_increase() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_document("doc", &text, 10, "text/plain");
        for pair in chunks.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_document("doc", text, 3, "text/plain");
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(text.is_char_boundary(c.offset));
            assert!(text[c.offset..].starts_with(&c.text));
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = chunk_document("doc", text, 2, "text/plain");
        let c2 = chunk_document("doc", text, 2, "text/plain");
        assert_eq!(c1, c2);
    }
}
