use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::request::{TypingRequest, DEFAULT_CPS, DEFAULT_MISTAKE_RATE};
use crate::snippets::SnippetBook;

/// Persisted key/value settings. Keys match the extension's storage keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub last_snippet: String,
    pub last_speed: f64,
    pub last_mistakes: bool,
    pub mistake_rate: f64,
    pub cursor_restore: bool,
    pub force_type: bool,
    pub use_key_events: bool,
    pub extension_enabled: bool,
    pub debug_logging: bool,
    pub saved_snippets: SnippetBook,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_snippet: String::new(),
            last_speed: DEFAULT_CPS,
            last_mistakes: false,
            mistake_rate: DEFAULT_MISTAKE_RATE,
            cursor_restore: true,
            force_type: false,
            use_key_events: true,
            extension_enabled: true,
            debug_logging: true,
            saved_snippets: SnippetBook::new(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },
}

impl Settings {
    /// Request for `text` using the persisted typing defaults. A zero speed
    /// falls back to the default speed.
    pub fn request_for(&self, text: impl Into<String>) -> TypingRequest {
        let cps = if self.last_speed > 0.0 {
            self.last_speed
        } else {
            DEFAULT_CPS
        };
        TypingRequest {
            text: text.into(),
            chars_per_second: cps,
            mistakes: self.last_mistakes,
            mistake_rate_percent: self.mistake_rate,
            restore_cursor: self.cursor_restore,
            force_type: self.force_type,
            use_key_events: self.use_key_events,
        }
        .normalized()
    }

    /// Sets a scalar setting from its textual form, by storage key.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        };

        let mut map = match serde_json::to_value(&*self) {
            Ok(Value::Object(map)) => map,
            _ => return Err(invalid()),
        };
        let value = match map.get(key) {
            Some(Value::Bool(_)) => raw.trim().parse::<bool>().map(Value::Bool).map_err(|_| invalid())?,
            Some(Value::Number(_)) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid)?,
            Some(Value::String(_)) => Value::String(raw.to_string()),
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        };
        map.insert(key.to_string(), value);
        *self = serde_json::from_value(Value::Object(map)).map_err(|_| invalid())?;
        Ok(())
    }
}

pub trait SettingsStore {
    fn load(&self) -> Settings;
    fn save(&self, settings: &Settings) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::settings_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Settings {
        let Ok(bytes) = fs::read(&self.path) else {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            return Settings::default();
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "unreadable settings, using defaults");
            Settings::default()
        })
    }

    fn save(&self, settings: &Settings) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(settings).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, data)
    }
}
