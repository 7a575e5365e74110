//! Indexing pipeline orchestration.
//!
//! Coordinates the full upload flow: archive → extraction → loading →
//! chunking → embedding → persisted index. Re-indexing an unchanged
//! codebase reuses the persisted index instead of embedding again.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::archive;
use crate::chunk::chunk_documents;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::index::{build_or_load, ProjectIndex};
use crate::loader::load_documents;

/// What an indexing run did.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub project: String,
    /// Regular files written by extraction; `None` when indexing a directory.
    pub files_extracted: Option<usize>,
    pub documents: usize,
    pub chunks: usize,
    pub model: String,
    pub index_path: PathBuf,
    /// True when an up-to-date persisted index was loaded rather than built.
    pub reused: bool,
}

/// Extract `archive` and index its contents.
///
/// The project is named after the archive unless `name` is given. The
/// archive is unpacked under `<workspace>/codebase/<project>/`, replacing any
/// earlier upload of the same project.
pub async fn index_archive(
    config: &Config,
    archive_path: &Path,
    name: Option<&str>,
    provider: &dyn EmbeddingProvider,
) -> Result<(ProjectIndex, IndexSummary)> {
    let project = match name {
        Some(n) => archive::sanitize_project_name(n)?,
        None => archive::project_name(archive_path)?,
    };
    let dest = config.workspace.codebase_dir().join(&project);
    let extracted = archive::extract_archive(archive_path, &dest)?;
    tracing::info!(
        project = %project,
        files = extracted,
        dest = %dest.display(),
        "extracted archive"
    );

    let (index, mut summary) = index_directory(config, &dest, &project, provider).await?;
    summary.files_extracted = Some(extracted);
    Ok((index, summary))
}

/// Index an already-extracted codebase directory as `project`.
pub async fn index_directory(
    config: &Config,
    root: &Path,
    project: &str,
    provider: &dyn EmbeddingProvider,
) -> Result<(ProjectIndex, IndexSummary)> {
    let project = archive::sanitize_project_name(project)?;

    let docs = load_documents(root, &config.loader)?;
    if docs.is_empty() {
        return Err(RagError::NoDocuments(root.to_path_buf()));
    }

    let chunks = chunk_documents(&docs, &config.chunking);
    if chunks.is_empty() {
        return Err(RagError::NoDocuments(root.to_path_buf()));
    }

    let index_path = config.workspace.index_dir(&project);
    let started = Utc::now();
    let index = build_or_load(
        &chunks,
        &index_path,
        provider,
        config.embedding.batch_size,
    )
    .await?;

    let summary = IndexSummary {
        project,
        files_extracted: None,
        documents: docs.len(),
        chunks: index.len(),
        model: index.model().to_string(),
        index_path,
        reused: index.manifest().created_at < started,
    };
    Ok((index, summary))
}

/// Run the index command: index an archive (or an extracted directory) and
/// print a summary.
pub async fn run_index(config: &Config, path: &Path, name: Option<&str>) -> anyhow::Result<()> {
    let provider = create_provider(&config.embedding)?;

    let summary = if path.is_dir() {
        let project = match name {
            Some(n) => n.to_string(),
            None => archive::project_name(path)?,
        };
        index_directory(config, path, &project, provider.as_ref())
            .await?
            .1
    } else {
        index_archive(config, path, name, provider.as_ref()).await?.1
    };

    println!("index {}", summary.project);
    if let Some(n) = summary.files_extracted {
        println!("  files extracted: {}", n);
    }
    println!("  documents loaded: {}", summary.documents);
    println!("  chunks: {}", summary.chunks);
    println!("  model: {}", summary.model);
    println!("  path: {}", summary.index_path.display());
    if summary.reused {
        println!("  unchanged since last run, reused persisted index");
    }
    println!("ok");
    Ok(())
}

/// Run the clear command.
pub fn run_clear(config: &Config) -> anyhow::Result<()> {
    if clear_workspace(config)? {
        println!(
            "Cleared {}. Previous indexes retained.",
            config.workspace.codebase_dir().display()
        );
    } else {
        println!("Nothing to clear.");
    }
    Ok(())
}

/// Remove extracted codebases. Persisted indexes are kept.
///
/// Returns whether anything was removed.
pub fn clear_workspace(config: &Config) -> Result<bool> {
    let dir = config.workspace.codebase_dir();
    if !dir.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(&dir)?;
    tracing::info!(path = %dir.display(), "cleared extracted codebases");
    Ok(true)
}
