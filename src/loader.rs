//! Directory loader: turns an extracted codebase into [`Document`]s.
//!
//! Every regular file under the root is read as text. Invalid UTF-8 is
//! replaced rather than rejected, so binary files never abort a load. Files
//! that are empty or whitespace-only are skipped, as are files that cannot
//! be read; the latter are reported with a warning.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::LoaderConfig;
use crate::error::{RagError, Result};
use crate::models::Document;

/// Paths never worth indexing, matched against the path relative to the root.
const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/__MACOSX/**",
];

/// Load every readable, non-empty file under `root`.
///
/// Traversal is sorted by file name, so the same tree always yields the same
/// document order. Document sources are paths relative to `root`. An empty
/// result is `Ok`; deciding whether that is an error is up to the caller.
pub fn load_documents(root: &Path, config: &LoaderConfig) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(RagError::InvalidInput(format!(
            "codebase directory does not exist: {}",
            root.display()
        )));
    }

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        // Match as if rooted so `**/x/**` also catches a top-level `x/`.
        let rel_str = format!("/{}", relative.to_string_lossy());
        if exclude_set.is_match(&rel_str) {
            continue;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > config.max_file_bytes => {
                tracing::warn!(
                    path = %path.display(),
                    bytes = meta.len(),
                    "skipping file larger than loader.max_file_bytes"
                );
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "error reading metadata: {}", e);
                continue;
            }
        }

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %path.display(), "error reading file: {}", e);
                continue;
            }
        };

        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.trim().is_empty() {
            continue;
        }

        tracing::debug!(path = %path.display(), "loaded");
        docs.push(Document {
            text,
            source: relative.to_path_buf(),
        });
    }

    tracing::info!(
        documents = docs.len(),
        root = %root.display(),
        "loaded codebase files"
    );
    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| RagError::Config(format!("invalid exclude glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RagError::Config(format!("invalid exclude globs: {}", e)))
}
