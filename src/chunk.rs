//! Recursive boundary-aware text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters,
//! with up to `chunk_overlap` characters repeated between consecutive chunks
//! of the same document.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `"\n\n"`, `"\n"`, `" "`, `""` that occurs
//!    in the text and split on it, keeping each separator at the start of the
//!    piece that follows it.
//! 2. Pieces shorter than `chunk_size` are merged greedily into a window.
//!    When the next piece would overflow the window, the window is emitted
//!    and pieces are dropped from its front until at most `chunk_overlap`
//!    characters remain (and the next piece fits).
//! 3. Pieces that are too long on their own are split recursively with the
//!    remaining separators; `""` splits into single characters, so a hard
//!    character cut is only the last resort.
//! 4. Emitted windows are trimmed; whitespace-only windows are dropped.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is never
//! cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use ragcode::chunk::split_text;
//!
//! let pieces = split_text("fn a() {}\n\nfn b() {}", 12, 2);
//! assert_eq!(pieces, vec!["fn a() {}", "fn b() {}"]);
//! ```

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::models::{Chunk, Document};

/// Boundaries tried in order: paragraph, line, word, character.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Split every document and attach its source path to each chunk.
///
/// Chunk indices restart at 0 for each document.
pub fn chunk_documents(docs: &[Document], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in docs {
        let source = doc.source.to_string_lossy().to_string();
        let pieces = split_text(&doc.text, config.chunk_size, config.chunk_overlap);
        chunks.extend(
            pieces
                .into_iter()
                .enumerate()
                .filter_map(|(i, text)| Chunk::new(text, source.clone(), i).ok()),
        );
    }
    tracing::info!(
        documents = docs.len(),
        chunks = chunks.len(),
        "split documents into chunks"
    );
    chunks
}

/// Split `text` into trimmed, non-empty pieces of at most `chunk_size` chars.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let splitter = Splitter {
        size: chunk_size.max(1),
        overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
    };
    let mut out = Vec::new();
    splitter.split(text, SEPARATORS, &mut out);
    out
}

struct Splitter {
    size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        let mut separator = "";
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut fitting: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge(&fitting, out);
                fitting.clear();
            }
            if remaining.is_empty() {
                push_trimmed(piece, out);
            } else {
                self.split(piece, remaining, out);
            }
        }
        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Greedily pack pieces into windows, carrying at most `overlap` chars over.
    fn merge(&self, pieces: &[&str], out: &mut Vec<String>) {
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.size && !window.is_empty() {
                emit(&window, out);
                while total > self.overlap || (total + len > self.size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        emit(&window, out);
    }
}

/// Split on `sep`, keeping each separator at the start of the next piece.
/// An empty separator splits into single characters.
fn split_keep_start<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    if sep.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(sep) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn emit(window: &VecDeque<(&str, usize)>, out: &mut Vec<String>) {
    let joined: String = window.iter().map(|(s, _)| *s).collect();
    push_trimmed(&joined, out);
}

fn push_trimmed(text: &str, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
