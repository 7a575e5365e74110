//! Core data models that flow through the pipeline.
//!
//! [`Document`]s exist only while a codebase is being ingested. [`Chunk`]s
//! are the retrieval unit and are persisted inside a project index.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// A text file read from an extracted codebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub source: PathBuf,
}

/// A bounded slice of a document's text.
///
/// Only constructible through [`Chunk::new`] (or deserialization, which runs
/// the same check), so a `Chunk` never holds whitespace-only text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChunkRecord")]
pub struct Chunk {
    text: String,
    source: String,
    index: usize,
}

#[derive(Deserialize)]
struct ChunkRecord {
    text: String,
    source: String,
    index: usize,
}

impl TryFrom<ChunkRecord> for Chunk {
    type Error = RagError;

    fn try_from(record: ChunkRecord) -> Result<Self> {
        Chunk::new(record.text, record.source, record.index)
    }
}

impl Chunk {
    /// Create a chunk; `index` is its ordinal within the source document.
    pub fn new(text: impl Into<String>, source: impl Into<String>, index: usize) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "chunk text must not be empty".to_string(),
            ));
        }
        Ok(Self {
            text,
            source: source.into(),
            index,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// A chunk returned by a similarity search, with its cosine score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}
