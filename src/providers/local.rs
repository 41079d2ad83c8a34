//! Locally installed Vosk models

use super::{SourceList, SourceProvider};
use crate::recognizer::local::{is_model_dir, LocalModelSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LocalModelProvider {
    roots: Vec<PathBuf>,
    sample_rate: u32,
}

impl LocalModelProvider {
    pub fn new(roots: Vec<PathBuf>, sample_rate: u32) -> Self {
        Self { roots, sample_rate }
    }

    /// Model directories under one root, sorted by name
    fn scan(&self, root: &Path) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping model root {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut models: Vec<PathBuf> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    warn!("Unreadable entry in {}: {}", root.display(), e);
                    None
                }
            })
            .filter(|path| is_model_dir(path))
            .collect();
        models.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
        models
    }
}

impl SourceProvider for LocalModelProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn load_sources(&self, into: &mut SourceList) {
        for root in &self.roots {
            for path in self.scan(root) {
                debug!("📦 Found local model: {}", path.display());
                into.push(Arc::new(LocalModelSource::new(&path, self.sample_rate)));
            }
        }
    }
}
