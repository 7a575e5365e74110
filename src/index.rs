//! Per-project vector index: build, persist, reload, and search.
//!
//! A [`ProjectIndex`] pairs every chunk of a codebase with its embedding and
//! remembers which embedding model produced them. Search is brute-force
//! cosine similarity over all stored vectors.
//!
//! # On-disk layout
//!
//! One directory per project (`<vectorstore>/<project>/`):
//!
//! | File | Contents |
//! |------|----------|
//! | `manifest.json` | format version, project name, model, dims, chunk count, content fingerprint |
//! | `chunks.jsonl` | one serialized [`Chunk`] per line, in index order |
//! | `vectors.bin` | little-endian `f32` vectors, concatenated in chunk order |
//!
//! Writes go to a hidden sibling directory that is renamed into place once
//! every file is complete, so a reader never observes a half-written index
//! and a failed build leaves the previous index untouched.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::models::{Chunk, SearchHit};

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.jsonl";
const VECTORS_FILE: &str = "vectors.bin";

/// Metadata stored alongside a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub name: String,
    pub model: String,
    pub dims: usize,
    pub chunk_count: usize,
    /// SHA-256 over the chunk sources, indices and texts the index was built from.
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProjectIndex {
    manifest: IndexManifest,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl ProjectIndex {
    /// Embed `chunks` with `provider` and assemble an in-memory index.
    ///
    /// Nothing is written to disk; see [`ProjectIndex::persist`].
    pub async fn build(
        name: &str,
        chunks: &[Chunk],
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::InvalidInput(
                "no chunks provided for indexing".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text().to_string()).collect();
        let vectors = embedding::embed_batched(provider, &texts, batch_size).await?;

        tracing::info!(
            project = name,
            chunks = chunks.len(),
            model = provider.model_name(),
            "built index"
        );

        Ok(Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                name: name.to_string(),
                model: provider.model_name().to_string(),
                dims: provider.dims(),
                chunk_count: chunks.len(),
                fingerprint: fingerprint(chunks),
                created_at: Utc::now(),
            },
            chunks: chunks.to_vec(),
            vectors,
        })
    }

    /// Read a persisted index from `dir`.
    ///
    /// Any missing file, parse failure, or disagreement between the manifest
    /// and the stored chunks/vectors is an [`RagError::Index`].
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&manifest_path)
            .map_err(|e| index_err(&manifest_path, e))?;
        let manifest: IndexManifest =
            serde_json::from_str(&raw).map_err(|e| index_err(&manifest_path, e))?;

        if manifest.format_version != FORMAT_VERSION {
            return Err(RagError::Index(format!(
                "unsupported index format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        if manifest.dims == 0 {
            return Err(RagError::Index("index manifest has zero dims".to_string()));
        }

        let chunks_path = dir.join(CHUNKS_FILE);
        let file = fs::File::open(&chunks_path).map_err(|e| index_err(&chunks_path, e))?;
        let mut chunks = Vec::with_capacity(manifest.chunk_count);
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| index_err(&chunks_path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line).map_err(|e| {
                RagError::Index(format!(
                    "{} line {}: {}",
                    chunks_path.display(),
                    lineno + 1,
                    e
                ))
            })?;
            chunks.push(chunk);
        }
        if chunks.len() != manifest.chunk_count {
            return Err(RagError::Index(format!(
                "manifest lists {} chunks but {} were stored",
                manifest.chunk_count,
                chunks.len()
            )));
        }

        let vectors_path = dir.join(VECTORS_FILE);
        let bytes = fs::read(&vectors_path).map_err(|e| index_err(&vectors_path, e))?;
        let row_bytes = manifest.dims * 4;
        if bytes.len() != manifest.chunk_count * row_bytes {
            return Err(RagError::Index(format!(
                "{} holds {} bytes, expected {}",
                vectors_path.display(),
                bytes.len(),
                manifest.chunk_count * row_bytes
            )));
        }
        let vectors = bytes.chunks_exact(row_bytes).map(blob_to_vec).collect();

        Ok(Self {
            manifest,
            chunks,
            vectors,
        })
    }

    /// Write the index to `dir`, replacing any index already there.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                RagError::InvalidInput(format!("invalid index path: {}", dir.display()))
            })?;
        fs::create_dir_all(&parent)?;

        let staging = parent.join(format!(".{}.tmp-{}", name, Uuid::new_v4()));
        fs::create_dir(&staging)?;

        let result = self
            .write_files(&staging)
            .and_then(|_| swap_into_place(&staging, dir, &parent, &name));
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        } else {
            tracing::info!(path = %dir.display(), "index persisted");
        }
        result
    }

    fn write_files(&self, dir: &Path) -> Result<()> {
        let mut chunks_out = BufWriter::new(fs::File::create(dir.join(CHUNKS_FILE))?);
        for chunk in &self.chunks {
            let line = serde_json::to_string(chunk)
                .map_err(|e| RagError::Index(format!("cannot serialize chunk: {}", e)))?;
            chunks_out.write_all(line.as_bytes())?;
            chunks_out.write_all(b"\n")?;
        }
        chunks_out.flush()?;

        let mut vectors_out = BufWriter::new(fs::File::create(dir.join(VECTORS_FILE))?);
        for v in &self.vectors {
            vectors_out.write_all(&vec_to_blob(v))?;
        }
        vectors_out.flush()?;

        // Manifest last: its presence marks a complete index.
        let manifest = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| RagError::Index(format!("cannot serialize manifest: {}", e)))?;
        fs::write(dir.join(MANIFEST_FILE), manifest)?;
        Ok(())
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn model(&self) -> &str {
        &self.manifest.model
    }

    pub fn dims(&self) -> usize {
        self.manifest.dims
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Fail unless `provider` produces vectors comparable to the stored ones.
    pub fn check_compatible(&self, provider: &dyn EmbeddingProvider) -> Result<()> {
        if provider.model_name() != self.manifest.model || provider.dims() != self.manifest.dims {
            return Err(RagError::ModelMismatch {
                index: format!("{} ({} dims)", self.manifest.model, self.manifest.dims),
                provider: format!("{} ({} dims)", provider.model_name(), provider.dims()),
            });
        }
        Ok(())
    }

    /// Embed `query` and return the `k` most similar chunks, best first.
    pub async fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.check_compatible(provider)?;
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embedding::embed_query(provider, query).await?;
        Ok(self.search_by_vector(&query_vec, k))
    }

    /// Rank stored chunks against a precomputed query vector.
    ///
    /// Ties keep index order, so results are fully deterministic. Vectors that
    /// score NaN (non-finite components in a damaged file) are never returned.
    pub fn search_by_vector(&self, query_vec: &[f32], k: usize) -> Vec<SearchHit> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query_vec, v)))
            .filter(|(_, score)| !score.is_nan())
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
            .into_iter()
            .map(|(i, score)| SearchHit {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn empty(name: &str, model: &str, dims: usize) -> Self {
        Self {
            manifest: IndexManifest {
                format_version: FORMAT_VERSION,
                name: name.to_string(),
                model: model.to_string(),
                dims,
                chunk_count: 0,
                fingerprint: fingerprint(&[]),
                created_at: Utc::now(),
            },
            chunks: Vec::new(),
            vectors: Vec::new(),
        }
    }
}

/// Return the persisted index at `persist_path` if it was built from the same
/// chunks with the same embedding model; otherwise build and persist a new one.
///
/// An unreadable or incompatible persisted index is rebuilt rather than
/// reported. An empty `chunks` slice is rejected before anything is read or
/// written.
pub async fn build_or_load(
    chunks: &[Chunk],
    persist_path: &Path,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
) -> Result<ProjectIndex> {
    if chunks.is_empty() {
        return Err(RagError::InvalidInput(
            "no chunks provided for indexing".to_string(),
        ));
    }

    let name = persist_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());

    if persist_path.join(MANIFEST_FILE).exists() {
        match ProjectIndex::load(persist_path) {
            Ok(existing) => {
                let reusable = existing.check_compatible(provider).is_ok()
                    && existing.manifest.fingerprint == fingerprint(chunks);
                if reusable {
                    tracing::info!(
                        project = %name,
                        chunks = existing.len(),
                        "loaded persisted index"
                    );
                    return Ok(existing);
                }
                tracing::warn!(
                    project = %name,
                    stored_model = existing.model(),
                    model = provider.model_name(),
                    "persisted index is stale or built with another model, rebuilding"
                );
            }
            Err(e) => {
                tracing::warn!(project = %name, "persisted index unreadable, rebuilding: {}", e);
            }
        }
    }

    let index = ProjectIndex::build(&name, chunks, provider, batch_size).await?;
    index.persist(persist_path)?;
    Ok(index)
}

/// Names of all complete project indexes under `vectorstore_dir`, sorted.
pub fn persisted_projects(vectorstore_dir: &Path) -> Result<Vec<String>> {
    if !vectorstore_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(vectorstore_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if entry.path().join(MANIFEST_FILE).is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn swap_into_place(staging: &Path, dir: &Path, parent: &Path, name: &str) -> Result<()> {
    if dir.exists() {
        let retired = parent.join(format!(".{}.old-{}", name, Uuid::new_v4()));
        fs::rename(dir, &retired)?;
        if let Err(e) = fs::rename(staging, dir) {
            let _ = fs::rename(&retired, dir);
            return Err(e.into());
        }
        if let Err(e) = fs::remove_dir_all(&retired) {
            tracing::warn!(path = %retired.display(), "could not remove old index: {}", e);
        }
    } else {
        fs::rename(staging, dir)?;
    }
    Ok(())
}

fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for c in chunks {
        hasher.update(c.source().as_bytes());
        hasher.update([0u8]);
        hasher.update(c.index().to_le_bytes());
        hasher.update(c.text().as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn index_err(path: &Path, e: impl std::fmt::Display) -> RagError {
    RagError::Index(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("fn connect_database(url: &str) -> Pool", "src/db.rs", 0).unwrap(),
            Chunk::new("fn render_sidebar(widgets: &[Widget])", "src/ui.rs", 0).unwrap(),
            Chunk::new("fn parse_config(path: &Path) -> Config", "src/config.rs", 0).unwrap(),
        ]
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        fn model_name(&self) -> &str {
            "feature-hash"
        }
        fn dims(&self) -> usize {
            32
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(RagError::Embedding("service unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_empty_chunks_rejected_and_nothing_written() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vectorstore/demo");
        let provider = HashProvider::with_dims(32);
        let err = build_or_load(&[], &path, &provider, 8).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert!(!path.exists());
        assert!(!tmp.path().join("vectorstore").exists());
    }

    #[tokio::test]
    async fn test_persist_layout() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let provider = HashProvider::with_dims(32);
        let index = build_or_load(&chunks(), &path, &provider, 2).await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.name(), "demo");
        assert!(path.join("manifest.json").is_file());
        assert!(path.join("chunks.jsonl").is_file());
        assert_eq!(
            fs::metadata(path.join("vectors.bin")).unwrap().len(),
            3 * 32 * 4
        );
        // no staging directories left behind
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_reload_returns_identical_results() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let provider = HashProvider::with_dims(256);
        let built = build_or_load(&chunks(), &path, &provider, 8).await.unwrap();
        let loaded = ProjectIndex::load(&path).unwrap();

        assert_eq!(loaded.manifest(), built.manifest());
        let a = built.search(&provider, "database pool", 2).await.unwrap();
        let b = loaded.search(&provider, "database pool", 2).await.unwrap();
        assert_eq!(a.len(), 2);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.chunk, y.chunk);
            assert_eq!(x.score, y.score);
        }
        assert_eq!(a[0].chunk.source(), "src/db.rs");
    }

    #[tokio::test]
    async fn test_second_call_loads_instead_of_rebuilding() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let provider = HashProvider::with_dims(32);
        let first = build_or_load(&chunks(), &path, &provider, 8).await.unwrap();
        // A failing provider with the same model would error if asked to embed.
        let second = build_or_load(&chunks(), &path, &FailingProvider, 8)
            .await
            .unwrap();
        assert_eq!(second.manifest().created_at, first.manifest().created_at);
    }

    #[tokio::test]
    async fn test_changed_chunks_trigger_rebuild() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let provider = HashProvider::with_dims(32);
        build_or_load(&chunks(), &path, &provider, 8).await.unwrap();

        let mut changed = chunks();
        changed.push(Chunk::new("fn brand_new()", "src/new.rs", 0).unwrap());
        let rebuilt = build_or_load(&changed, &path, &provider, 8).await.unwrap();
        assert_eq!(rebuilt.len(), 4);
        assert_eq!(ProjectIndex::load(&path).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_model_change_triggers_rebuild() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        build_or_load(&chunks(), &path, &HashProvider::with_dims(32), 8)
            .await
            .unwrap();
        let rebuilt = build_or_load(&chunks(), &path, &HashProvider::with_dims(48), 8)
            .await
            .unwrap();
        assert_eq!(rebuilt.dims(), 48);
        assert_eq!(ProjectIndex::load(&path).unwrap().dims(), 48);
    }

    #[tokio::test]
    async fn test_corrupt_index_self_heals() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let provider = HashProvider::with_dims(32);
        build_or_load(&chunks(), &path, &provider, 8).await.unwrap();

        fs::write(path.join("vectors.bin"), b"truncated").unwrap();
        assert!(matches!(
            ProjectIndex::load(&path).unwrap_err(),
            RagError::Index(_)
        ));

        let healed = build_or_load(&chunks(), &path, &provider, 8).await.unwrap();
        assert_eq!(healed.len(), 3);
        assert!(ProjectIndex::load(&path).is_ok());
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_index() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let provider = HashProvider::with_dims(32);
        build_or_load(&chunks(), &path, &provider, 8).await.unwrap();

        let mut changed = chunks();
        changed.pop();
        let err = build_or_load(&changed, &path, &FailingProvider, 8)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert_eq!(ProjectIndex::load(&path).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_embedding_failure_on_first_build_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("demo");
        let err = build_or_load(&chunks(), &path, &FailingProvider, 8)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_search_with_other_model_is_rejected() {
        let index = ProjectIndex::build("demo", &chunks(), &HashProvider::with_dims(32), 8)
            .await
            .unwrap();
        let err = index
            .search(&HashProvider::with_dims(16), "config", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
    }

    #[test]
    fn test_search_by_vector_orders_and_truncates() {
        let mut index = ProjectIndex::empty("v", "m", 2);
        for (i, v) in [[1.0, 0.0], [0.0, 1.0], [0.7, 0.7]].iter().enumerate() {
            index
                .chunks
                .push(Chunk::new(format!("chunk {}", i), "f", i).unwrap());
            index.vectors.push(v.to_vec());
        }
        let hits = index.search_by_vector(&[1.0, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text(), "chunk 0");
        assert_eq!(hits[1].chunk.text(), "chunk 2");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_by_vector_skips_nan_vectors() {
        let mut index = ProjectIndex::empty("v", "m", 2);
        let vectors = [
            [f32::NAN, 0.0],
            [0.0, 1.0],
            [1.0, f32::NAN],
            [1.0, 0.0],
            [f32::NAN, f32::NAN],
        ];
        for (i, v) in vectors.iter().enumerate() {
            index
                .chunks
                .push(Chunk::new(format!("chunk {}", i), "f", i).unwrap());
            index.vectors.push(v.to_vec());
        }
        let hits = index.search_by_vector(&[1.0, 0.2], 5);
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text()).collect();
        assert_eq!(texts, vec!["chunk 3", "chunk 1"]);
        assert!(hits.iter().all(|h| h.score.is_finite()));
    }

    #[tokio::test]
    async fn test_persisted_projects_lists_complete_indexes() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("vectorstore");
        let provider = HashProvider::with_dims(16);
        build_or_load(&chunks(), &store.join("beta"), &provider, 8)
            .await
            .unwrap();
        build_or_load(&chunks(), &store.join("alpha"), &provider, 8)
            .await
            .unwrap();
        fs::create_dir_all(store.join("half-written")).unwrap();

        assert_eq!(persisted_projects(&store).unwrap(), vec!["alpha", "beta"]);
        assert!(persisted_projects(&tmp.path().join("missing"))
            .unwrap()
            .is_empty());
    }
}
