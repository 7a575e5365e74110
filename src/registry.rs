//! In-memory registry of loaded project indexes.
//!
//! The registry is owned by the caller (the CLI session, or a test) and
//! passed explicitly; there is no process-wide state. Switching the active
//! project is a map lookup, so moving between previously indexed codebases
//! never re-embeds anything.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{RagError, Result};
use crate::index::{self, ProjectIndex};

#[derive(Debug, Default)]
pub struct ProjectRegistry {
    projects: BTreeMap<String, ProjectIndex>,
    active: Option<String>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every complete index under `vectorstore_dir`.
    ///
    /// Unreadable indexes are skipped with a warning. No project is made
    /// active.
    pub fn load_persisted(vectorstore_dir: &Path) -> Result<Self> {
        let mut registry = Self::new();
        for name in index::persisted_projects(vectorstore_dir)? {
            match ProjectIndex::load(&vectorstore_dir.join(&name)) {
                Ok(idx) => {
                    registry.projects.insert(name, idx);
                }
                Err(e) => tracing::warn!(project = %name, "skipping unreadable index: {}", e),
            }
        }
        tracing::debug!(projects = registry.projects.len(), "registry loaded");
        Ok(registry)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Projects
    // ═══════════════════════════════════════════════════════════════════

    /// Register `index` under its own name, returning any index it replaces.
    pub fn put(&mut self, index: ProjectIndex) -> Option<ProjectIndex> {
        self.projects.insert(index.name().to_string(), index)
    }

    pub fn get(&self, name: &str) -> Option<&ProjectIndex> {
        self.projects.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.projects.contains_key(name)
    }

    /// Registered project names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.projects.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Drop every registered project and the active selection.
    pub fn clear(&mut self) {
        self.projects.clear();
        self.active = None;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Active project
    // ═══════════════════════════════════════════════════════════════════

    /// Make `name` the active project.
    pub fn select(&mut self, name: &str) -> Result<&ProjectIndex> {
        if !self.projects.contains_key(name) {
            return Err(RagError::InvalidInput(format!(
                "unknown project '{}' (known: {})",
                name,
                self.names().join(", ")
            )));
        }
        self.active = Some(name.to_string());
        self.active()
    }

    /// Forget the active selection; registered projects stay loaded.
    pub fn deselect(&mut self) {
        self.active = None;
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active project's index, or [`RagError::IndexNotReady`] when no
    /// project has been indexed or selected.
    pub fn active(&self) -> Result<&ProjectIndex> {
        self.active
            .as_deref()
            .and_then(|name| self.projects.get(name))
            .ok_or(RagError::IndexNotReady)
    }
}
