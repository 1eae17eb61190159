use crate::{
    error::{Error, Result},
    record::ModelRecord,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const PRESET_SHARING_PREFIX: &str = "###ModelPresets###";

/// File-backed store holding one JSON record per model hash. Every mutation
/// is a full load-modify-save cycle; the on-disk file is the sole source of
/// truth (single operator, single writer).
#[derive(Debug)]
pub struct PresetStore {
    records_dir: PathBuf,
}

impl PresetStore {
    pub fn new(records_dir: impl Into<PathBuf>) -> Result<Self> {
        let records_dir = records_dir.into();
        fs::create_dir_all(&records_dir)?;
        Ok(Self { records_dir })
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn record_path(&self, hash: &str) -> PathBuf {
        self.records_dir.join(format!("{hash}.json"))
    }

    /// Loads the record for `hash`, synthesizing and persisting the empty
    /// template first when no file exists. The second call for the same hash
    /// is a pure read.
    pub fn load(&self, hash: &str) -> Result<ModelRecord> {
        let path = self.record_path(hash);
        if !path.exists() {
            let template = ModelRecord::template();
            self.save(hash, &template)?;
            return Ok(template);
        }
        self.read_record(&path)
    }

    /// Like [`load`](Self::load) but never creates a file; a missing record
    /// yields the template so probe reads do not pollute the records dir.
    pub fn load_read_only(&self, hash: &str) -> Result<ModelRecord> {
        let path = self.record_path(hash);
        if !path.exists() {
            return Ok(ModelRecord::template());
        }
        self.read_record(&path)
    }

    /// Overwrites the record file with formatted JSON. Last writer wins.
    pub fn save(&self, hash: &str, record: &ModelRecord) -> Result<()> {
        let path = self.record_path(hash);
        let data = serde_json::to_vec_pretty(record)?;
        fs::write(&path, data)?;
        Ok(())
    }

    pub fn set_url(&self, hash: &str, url: &str) -> Result<String> {
        self.update(hash, |record| record.url = url.to_string())?;
        Ok("url updated.".to_string())
    }

    pub fn set_trigger_words(&self, hash: &str, words: Vec<String>) -> Result<String> {
        self.update(hash, |record| record.trigger_words = words)?;
        Ok("trigger_words updated.".to_string())
    }

    /// Adds or overwrites a preset by name.
    pub fn save_preset(&self, hash: &str, name: &str, text: &str) -> Result<String> {
        self.update(hash, |record| {
            record.presets.insert(name.to_string(), text.to_string());
        })?;
        Ok(format!("{name} saved"))
    }

    /// Renames a preset. Renaming to the current name is a no-op with its own
    /// message; renaming onto a different existing preset is rejected and the
    /// record is left untouched.
    pub fn rename_preset(&self, hash: &str, old: &str, new: &str) -> Result<String> {
        if old == new {
            return Ok(format!("Preset already named {new}"));
        }

        let record = self.load(hash)?;
        if !record.presets.contains_key(old) {
            return Err(Error::NotFound(format!("preset {old:?}")));
        }
        if record.presets.contains_key(new) {
            return Err(Error::NameCollision(new.to_string()));
        }

        self.update(hash, |record| {
            if let Some(text) = record.presets.shift_remove(old) {
                record.presets.insert(new.to_string(), text);
            }
            if record.default_preset == old {
                record.default_preset = new.to_string();
            }
        })?;
        Ok(format!("Preset {old} renamed to {new}"))
    }

    /// Deletes a preset and repairs the default pointer, returning the
    /// repaired record so callers can refresh their view.
    pub fn delete_preset(&self, hash: &str, name: &str) -> Result<(String, ModelRecord)> {
        let record = self.load(hash)?;
        if !record.presets.contains_key(name) {
            return Err(Error::NotFound(format!("preset {name:?}")));
        }

        let record = self.update(hash, |record| {
            record.presets.shift_remove(name);
            record.repair_default();
        })?;
        Ok((format!("Preset {name} deleted"), record))
    }

    /// Marks an existing preset as the default. Unknown names are rejected so
    /// the default pointer can never go stale through this path.
    pub fn set_default_preset(&self, hash: &str, name: &str) -> Result<String> {
        let record = self.load(hash)?;
        if !record.presets.contains_key(name) {
            return Err(Error::NotFound(format!("preset {name:?}")));
        }

        self.update(hash, |record| record.default_preset = name.to_string())?;
        Ok(format!("{name} set to default"))
    }

    /// The text a model author pastes into their model-page description to
    /// share presets: the fixed prefix followed by the compact JSON record.
    pub fn sharing_text(&self, hash: &str) -> Result<String> {
        let record = self.load(hash)?;
        Ok(format!(
            "{PRESET_SHARING_PREFIX}\n{}",
            serde_json::to_string(&record)?
        ))
    }

    fn update<F>(&self, hash: &str, mutate: F) -> Result<ModelRecord>
    where
        F: FnOnce(&mut ModelRecord),
    {
        let mut record = self.load(hash)?;
        mutate(&mut record);
        self.save(hash, &record)?;
        Ok(record)
    }

    fn read_record(&self, path: &Path) -> Result<ModelRecord> {
        let data = fs::read(path)?;
        let record = serde_json::from_slice(&data)?;
        Ok(record)
    }
}
