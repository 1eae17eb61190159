use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PRESET_NAME: &str = "default";

const REQUIRED_KEYS: [&str; 4] = ["url", "default_preset", "trigger_words", "presets"];

/// Per-model metadata record, persisted as one JSON file per model hash.
/// Preset insertion order is significant: it drives the "first preset"
/// fallback when the default pointer goes stale.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelRecord {
    pub url: String,
    pub default_preset: String,
    pub trigger_words: Vec<String>,
    pub presets: IndexMap<String, String>,
}

impl Default for ModelRecord {
    fn default() -> Self {
        Self::template()
    }
}

impl ModelRecord {
    /// The empty template written the first time any operation touches a hash.
    pub fn template() -> Self {
        let mut presets = IndexMap::new();
        presets.insert(DEFAULT_PRESET_NAME.to_string(), String::new());
        Self {
            url: String::new(),
            default_preset: DEFAULT_PRESET_NAME.to_string(),
            trigger_words: Vec::new(),
            presets,
        }
    }

    /// Trust boundary for remote payloads: a record is only adopted when all
    /// four schema keys are present and well-typed.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or(Error::SchemaInvalid)?;
        if REQUIRED_KEYS.iter().any(|key| !object.contains_key(*key)) {
            return Err(Error::SchemaInvalid);
        }
        serde_json::from_value(value.clone()).map_err(|_| Error::SchemaInvalid)
    }

    /// Re-points `default_preset` at an existing key: the first preset in
    /// insertion order, or a fresh empty `"default"` entry when no presets
    /// remain. Called after any deletion that might orphan the pointer.
    pub fn repair_default(&mut self) {
        let name = if self.default_preset.is_empty() {
            DEFAULT_PRESET_NAME
        } else {
            self.default_preset.as_str()
        };

        if !self.presets.contains_key(name) {
            match self.presets.keys().next() {
                Some(first) => self.default_preset = first.clone(),
                None => {
                    self.default_preset = DEFAULT_PRESET_NAME.to_string();
                    self.presets
                        .insert(DEFAULT_PRESET_NAME.to_string(), String::new());
                }
            }
        } else if self.default_preset.is_empty() {
            self.default_preset = DEFAULT_PRESET_NAME.to_string();
        }
    }

    /// `(name, text)` of the default preset, falling back to the first preset
    /// in insertion order, then to `("default", "")`.
    pub fn default_preset(&self) -> (&str, &str) {
        let name = if self.default_preset.is_empty() {
            DEFAULT_PRESET_NAME
        } else {
            self.default_preset.as_str()
        };

        if let Some(text) = self.presets.get(name) {
            return (name, text);
        }
        if let Some((first_name, first_text)) = self.presets.first() {
            return (first_name, first_text);
        }
        (DEFAULT_PRESET_NAME, "")
    }

    pub fn preset_names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }
}
