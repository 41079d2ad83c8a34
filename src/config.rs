use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Local models
    pub models_dir: String,
    pub extra_model_dirs: Vec<String>,
    pub sample_rate: u32,

    // Remote server
    pub server_enabled: bool,
    pub servers: Vec<String>,
    pub server_probe_timeout_ms: u64,

    // Behaviour
    pub listen_immediately: bool,
    pub weak_ref_model: bool,

    // Audio
    pub audio_device: Option<usize>,

    // Meta
    pub ui_language: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models_dir: dirs::data_dir()
                .unwrap_or_default()
                .join("sayboard/models")
                .to_string_lossy()
                .to_string(),
            extra_model_dirs: Vec::new(),
            sample_rate: 16000,
            server_enabled: false,
            servers: vec!["tcp://localhost:10300".to_string()],
            server_probe_timeout_ms: 300,
            listen_immediately: false,
            weak_ref_model: true,
            audio_device: None,
            ui_language: "en".to_string(),
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or fall back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// All directories scanned for local models, primary first
    pub fn model_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(&self.models_dir)
            .chain(self.extra_model_dirs.iter())
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sayboard")
        .join("config.json")
}
