//! Local Vosk model backend
//!
//! A weak close keeps the loaded model in memory so the next initialize only
//! has to build a fresh recognizer. A strong close drops it.

use super::{Recognizer, SourceBackend, SourceCore};
use crate::error::{SayResult, SayboardError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
#[cfg(feature = "vosk")]
use tracing::info;

#[cfg(feature = "vosk")]
type CachedModel = Arc<vosk::Model>;
#[cfg(not(feature = "vosk"))]
type CachedModel = ();

pub struct LocalModelSource {
    core: SourceCore,
    path: PathBuf,
    sample_rate: u32,
    cache: Mutex<Option<CachedModel>>,
}

impl LocalModelSource {
    pub fn new(path: &Path, sample_rate: u32) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            core: SourceCore::new(name, format!("local:{}", path.display())),
            path: path.to_path_buf(),
            sample_rate,
            cache: Mutex::new(None),
        }
    }

    /// Whether a model is held in memory from an earlier load
    pub fn is_cached(&self) -> bool {
        self.cache.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    fn load_error(&self, reason: impl std::fmt::Display) -> SayboardError {
        SayboardError::Load {
            name: self.core.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(feature = "vosk")]
impl SourceBackend for LocalModelSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn load(&self) -> SayResult<Arc<dyn Recognizer>> {
        let cached = self.cache.lock()?.clone();
        let model = match cached {
            Some(model) => {
                info!("♻️ Reusing cached model '{}'", self.core.name());
                model
            }
            None => {
                let model = vosk_backend::load_model(&self.path)
                    .map_err(|e| self.load_error(format!("{:#}", e)))?;
                let model = Arc::new(model);
                *self.cache.lock()? = Some(model.clone());
                model
            }
        };

        let recognizer = vosk_backend::VoskRecognizer::new(model, self.sample_rate)
            .map_err(|e| self.load_error(format!("{:#}", e)))?;
        Ok(Arc::new(recognizer))
    }

    fn release(&self, weak: bool) {
        if !weak {
            if let Ok(mut cache) = self.cache.lock() {
                if cache.take().is_some() {
                    info!("🧹 Freed model '{}'", self.core.name());
                }
            }
        }
    }
}

#[cfg(not(feature = "vosk"))]
impl SourceBackend for LocalModelSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn load(&self) -> SayResult<Arc<dyn Recognizer>> {
        Err(self.load_error(format!(
            "built without the `vosk` feature, cannot load {} at {} Hz",
            self.path.display(),
            self.sample_rate
        )))
    }
}

#[cfg(feature = "vosk")]
mod vosk_backend {
    use crate::error::SayResult;
    use crate::recognizer::{Decoded, Recognizer};
    use anyhow::{Context, Result};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tracing::{debug, info};
    use vosk::{DecodingState, Model};

    pub fn load_model(path: &Path) -> Result<Model> {
        if !super::is_model_dir(path) {
            anyhow::bail!("No Vosk model at {}", path.display());
        }
        let model_str = path.to_str().ok_or_else(|| {
            anyhow::anyhow!("Vosk model path is not valid UTF-8: {}", path.display())
        })?;
        info!("📦 Loading Vosk model from: {}", path.display());
        Model::new(model_str).context("Failed to load Vosk model")
    }

    pub struct VoskRecognizer {
        // Keeps the model alive for as long as the recognizer is
        _model: Arc<Model>,
        recognizer: Mutex<vosk::Recognizer>,
        sample_rate: u32,
    }

    impl VoskRecognizer {
        pub fn new(model: Arc<Model>, sample_rate: u32) -> Result<Self> {
            let recognizer = vosk::Recognizer::new(&model, sample_rate as f32)
                .context("Failed to create Vosk recognizer")?;
            Ok(Self {
                _model: model,
                recognizer: Mutex::new(recognizer),
                sample_rate,
            })
        }
    }

    impl Recognizer for VoskRecognizer {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn accept_waveform(&self, samples: &[i16]) -> SayResult<Decoded> {
            let mut recognizer = self.recognizer.lock()?;
            Ok(match recognizer.accept_waveform(samples) {
                DecodingState::Finalized => recognizer
                    .final_result()
                    .single()
                    .and_then(|single| super::extract_text(single.text))
                    .map(Decoded::Final)
                    .unwrap_or(Decoded::Nothing),
                DecodingState::Running => {
                    match super::extract_text(recognizer.partial_result().partial) {
                        Some(partial) => Decoded::Partial(partial),
                        None => Decoded::Nothing,
                    }
                }
                DecodingState::Failed => {
                    debug!("Decoding failed for this chunk");
                    Decoded::Nothing
                }
            })
        }

        fn final_result(&self) -> SayResult<Option<String>> {
            let mut recognizer = self.recognizer.lock()?;
            Ok(recognizer
                .final_result()
                .single()
                .and_then(|single| super::extract_text(single.text)))
        }

        fn reset(&self) {
            if let Ok(mut recognizer) = self.recognizer.lock() {
                recognizer.reset();
            }
        }
    }
}

/// Extract text from Vosk result, filtering empty results
#[cfg_attr(not(feature = "vosk"), allow(dead_code))]
fn extract_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Whether a directory looks like an unpacked Vosk model
pub fn is_model_dir(path: &Path) -> bool {
    path.is_dir() && ["am", "conf", "graph"].iter().any(|d| path.join(d).is_dir())
}
