//! Internationalization (i18n) Support
//!
//! Looks up user-facing strings by key. Translations are JSON maps loaded
//! from locale directories; English ships built in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Current active language
static CURRENT_LANG: RwLock<String> = RwLock::new(String::new());

/// Loaded translations (language -> key -> value)
static TRANSLATIONS: RwLock<Option<HashMap<String, HashMap<String, String>>>> = RwLock::new(None);

const ENGLISH: &[(&str, &str)] = &[
    ("mic_error_no_recognizers", "No speech recognizers found"),
    ("mic_error_mic_in_use", "Microphone is in use by another app"),
    ("mic_error_recognizer_not_ready", "Recognizer is still loading"),
    ("mic_error_model_load_failed", "Could not load the speech model"),
    ("mic_error_server_unreachable", "Could not reach the recognition server"),
    ("state_initial", "Idle"),
    ("state_loading", "Loading"),
    ("state_ready", "Ready"),
    ("state_listening", "Listening"),
    ("state_paused", "Paused"),
    ("state_error", "Error"),
];

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Initialize i18n with a language, English if none
pub fn init(lang: Option<&str>) {
    set_language(lang.unwrap_or("en"));
}

/// Set the active language
pub fn set_language(lang: &str) {
    *write(&CURRENT_LANG) = lang.to_string();
    info!("🌐 Language set to: {}", lang);

    load_translations(lang);
}

/// Get the current language
pub fn current_language() -> String {
    let lang = read(&CURRENT_LANG).clone();
    if lang.is_empty() {
        "en".to_string()
    } else {
        lang
    }
}

/// Translate a key, falling back to English, then to the key itself
pub fn tr(key: &str) -> String {
    let lang = current_language();

    if let Some(all) = read(&TRANSLATIONS).as_ref() {
        if let Some(value) = all.get(&lang).and_then(|t| t.get(key)) {
            return value.clone();
        }
    }

    ENGLISH
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| key.to_string())
}

/// Install translations for a language directly
pub fn add_translations(lang: &str, translations: HashMap<String, String>) {
    write(&TRANSLATIONS)
        .get_or_insert_with(HashMap::new)
        .insert(lang.to_string(), translations);
}

/// Load translations from locale directories
fn load_translations(lang: &str) {
    let locale_dirs = [
        dirs::data_local_dir().map(|p| p.join("sayboard/locale")),
        Some(PathBuf::from("/usr/local/share/sayboard/locale")),
        Some(PathBuf::from("locale")),
    ];

    for dir in locale_dirs.iter().flatten() {
        let path = dir.join(format!("{}.json", lang));
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<HashMap<String, String>>(&content) {
            Ok(trans) => {
                debug!("Loaded {} translations for '{}'", trans.len(), lang);
                add_translations(lang, trans);
                return;
            }
            Err(e) => debug!("Ignoring malformed {}: {}", path.display(), e),
        }
    }

    debug!("No translations found for '{}', using English", lang);
}
