//! Project index statistics.
//!
//! Summarises a persisted index: chunk and file counts, the embedding model
//! it was built with, its size on disk, and a per-file breakdown. Used by
//! `ragcode stats` to confirm an upload was indexed the way you expect.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::archive;
use crate::config::Config;
use crate::index::{self, ProjectIndex};

/// Aggregate numbers for one project index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub name: String,
    pub model: String,
    pub dims: usize,
    pub chunks: usize,
    pub created_at: DateTime<Utc>,
    pub disk_bytes: u64,
    /// Chunk count per source file, sorted by count descending then path.
    pub by_source: Vec<(String, usize)>,
}

impl IndexStats {
    pub fn collect(index: &ProjectIndex, dir: &Path) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for chunk in index.chunks() {
            *counts.entry(chunk.source()).or_default() += 1;
        }
        let mut by_source: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(s, n)| (s.to_string(), n))
            .collect();
        by_source.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            name: index.name().to_string(),
            model: index.model().to_string(),
            dims: index.dims(),
            chunks: index.len(),
            created_at: index.manifest().created_at,
            disk_bytes: dir_size(dir),
            by_source,
        }
    }

    pub fn sources(&self) -> usize {
        self.by_source.len()
    }
}

/// Run the stats command: load the project's index and print a summary.
pub fn run_stats(config: &Config, project: &str) -> Result<()> {
    let project = archive::sanitize_project_name(project)?;
    let dir = config.workspace.index_dir(&project);
    let index = ProjectIndex::load(&dir)
        .with_context(|| format!("No index for project '{}' at {}", project, dir.display()))?;
    let stats = IndexStats::collect(&index, &dir);

    println!("ragcode index stats");
    println!("==================");
    println!();
    println!("  Project:     {}", stats.name);
    println!("  Location:    {}", dir.display());
    println!("  Size:        {}", format_bytes(stats.disk_bytes));
    println!("  Built:       {}", stats.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!();
    println!("  Model:       {} ({} dims)", stats.model, stats.dims);
    println!("  Files:       {}", stats.sources());
    println!("  Chunks:      {}", stats.chunks);

    if !stats.by_source.is_empty() {
        println!();
        println!("  Largest files:");
        println!("  {:<56} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(65));
        for (source, count) in stats.by_source.iter().take(10) {
            println!("  {:<56} {:>8}", source, count);
        }
        if stats.by_source.len() > 10 {
            println!("  ... and {} more", stats.by_source.len() - 10);
        }
    }

    println!();
    Ok(())
}

/// Run the projects command: list persisted indexes.
pub fn run_projects(config: &Config) -> Result<()> {
    let store = config.workspace.vectorstore_dir();
    let names = index::persisted_projects(&store)?;
    if names.is_empty() {
        println!("No projects indexed under {}.", store.display());
        return Ok(());
    }

    println!("{:<24} {:>8} {:>10}   {}", "PROJECT", "CHUNKS", "SIZE", "MODEL");
    for name in names {
        let dir = store.join(&name);
        match ProjectIndex::load(&dir) {
            Ok(idx) => println!(
                "{:<24} {:>8} {:>10}   {}",
                name,
                idx.len(),
                format_bytes(dir_size(&dir)),
                idx.model()
            ),
            Err(e) => {
                tracing::warn!(project = %name, "unreadable index: {}", e);
                println!("{:<24} {:>8} {:>10}   (unreadable)", name, "-", "-");
            }
        }
    }
    Ok(())
}

fn dir_size(dir: &Path) -> u64 {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok())
                .filter(|m| m.is_file())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
