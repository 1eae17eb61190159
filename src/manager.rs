use crate::{
    civitai::CivitaiClient,
    error::{Error, Result},
    hash,
    record::ModelRecord,
    store::PresetStore,
    thumbnail::ThumbnailCache,
};
use directories::BaseDirs;
use log::{info, warn};
use std::path::{Path, PathBuf};

pub const APP_ID: &str = "model-preset-manager";

const RECORDS_DIR: &str = "model presets";
const THUMBS_DIR: &str = "thumbnails";

/// Snapshot of everything a host surface needs to render one model. Session
/// state lives in this value, not in process-wide globals; callers thread
/// `trigger_words` back into the prompt reconciler.
#[derive(Clone, Debug)]
pub struct ModelOverview {
    pub model_filename: String,
    pub hash: String,
    pub url: String,
    pub thumbnail: Option<PathBuf>,
    pub preset_name: String,
    pub generation_data: String,
    pub preset_names: Vec<String>,
    pub trigger_words: Vec<String>,
}

/// Ties the store, the thumbnail cache and the remote client together into
/// the two flows a host tab drives: refresh-from-remote and local retrieve.
#[derive(Debug)]
pub struct PresetManager {
    store: PresetStore,
    thumbnails: ThumbnailCache,
    client: CivitaiClient,
}

impl PresetManager {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        Ok(Self {
            store: PresetStore::new(root.join(RECORDS_DIR))?,
            thumbnails: ThumbnailCache::new(root.join(THUMBS_DIR))?,
            client: CivitaiClient::new()?,
        })
    }

    /// Places the store under the per-user data directory.
    pub fn with_default_root() -> Result<Self> {
        let base = BaseDirs::new().ok_or_else(|| {
            Error::NotFound(format!("base directories for {APP_ID}"))
        })?;
        Self::new(base.data_local_dir().join(APP_ID))
    }

    pub fn store(&self) -> &PresetStore {
        &self.store
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub fn client(&self) -> &CivitaiClient {
        &self.client
    }

    /// Pulls remote metadata for the model and overwrites the local record
    /// with it: trigger words and page URL always, the full record when the
    /// model page carries a schema-valid shared preset payload. Thumbnail and
    /// scrape failures degrade with a warning; only the hash lookup itself is
    /// allowed to fail the flow.
    pub fn download_model_info(&self, model_filename: &str) -> Result<ModelOverview> {
        let hash = hash::resolve(model_filename)?;
        let lookup = self.client.lookup_by_hash(&hash)?;

        let shared_presets = match self.client.fetch_presets_from_page(&lookup.model_url) {
            Ok(presets) => presets,
            Err(err) => {
                warn!("Preset scrape failed for {}: {err}", lookup.model_url);
                None
            }
        };

        let thumbnail = self.fetch_thumbnail(
            model_filename,
            lookup.first_image_url.as_deref(),
            false,
        );

        let record = match shared_presets
            .as_ref()
            .and_then(|value| ModelRecord::from_value(value).ok())
        {
            Some(record) => {
                info!("Adopting shared presets for {model_filename}");
                self.store.save(&hash, &record)?;
                record
            }
            None => {
                self.store
                    .set_trigger_words(&hash, lookup.trigger_words.clone())?;
                self.store.set_url(&hash, &lookup.model_url)?;
                self.store.load(&hash)?
            }
        };

        Ok(self.overview(model_filename, hash, record, thumbnail))
    }

    /// Serves the model from disk when a record with a known URL exists,
    /// falling through to [`download_model_info`](Self::download_model_info)
    /// otherwise. Pure reads: a model that was never edited leaves no record
    /// file behind.
    pub fn retrieve_model_info(&self, model_filename: &str) -> Result<ModelOverview> {
        let hash = hash::resolve(model_filename)?;
        let record = self.store.load_read_only(&hash)?;

        if record.url.is_empty() {
            return self.download_model_info(model_filename);
        }

        let thumbnail = self.fetch_thumbnail(model_filename, None, true);
        Ok(self.overview(model_filename, hash, record, thumbnail))
    }

    /// Opens the model page in the system browser.
    pub fn open_model_page(url: &str) -> Result<()> {
        open::that(url).map_err(Error::Io)
    }

    fn fetch_thumbnail(
        &self,
        model_filename: &str,
        image_url: Option<&str>,
        prefer_local: bool,
    ) -> Option<PathBuf> {
        match self
            .thumbnails
            .obtain(&self.client, model_filename, image_url, prefer_local)
        {
            Ok(path) => path,
            Err(err) => {
                warn!("Thumbnail handling failed for {model_filename}: {err}");
                None
            }
        }
    }

    fn overview(
        &self,
        model_filename: &str,
        hash: String,
        record: ModelRecord,
        thumbnail: Option<PathBuf>,
    ) -> ModelOverview {
        let (preset_name, generation_data) = record.default_preset();
        ModelOverview {
            model_filename: model_filename.to_string(),
            hash,
            url: record.url.clone(),
            thumbnail,
            preset_name: preset_name.to_string(),
            generation_data: generation_data.to_string(),
            preset_names: record.preset_names(),
            trigger_words: record.trigger_words.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    fn manager() -> Result<(TempDir, PresetManager)> {
        let dir = TempDir::new()?;
        let manager = PresetManager::new(dir.path())?;
        Ok((dir, manager))
    }

    #[test]
    fn new_creates_records_and_thumbnail_dirs() -> Result<()> {
        let (dir, manager) = manager()?;
        assert!(dir.path().join("model presets").is_dir());
        assert!(dir.path().join("thumbnails").is_dir());
        assert_eq!(
            manager.store().record_path("abc1234567"),
            dir.path().join("model presets").join("abc1234567.json")
        );
        Ok(())
    }

    #[test]
    fn retrieve_serves_edited_records_from_disk() -> Result<()> {
        let (_dir, manager) = manager()?;
        let hash = "abc1234567";
        manager.store().set_url(hash, "https://civitai.com/models/42")?;
        manager.store().save_preset(hash, "cinematic", "a cat, 35mm")?;
        manager.store().set_default_preset(hash, "cinematic")?;
        manager
            .store()
            .set_trigger_words(hash, vec!["cat".to_string()])?;

        let overview = manager.retrieve_model_info("foo [abc1234567].safetensors")?;
        assert_eq!(overview.hash, hash);
        assert_eq!(overview.url, "https://civitai.com/models/42");
        assert_eq!(overview.preset_name, "cinematic");
        assert_eq!(overview.generation_data, "a cat, 35mm");
        assert_eq!(overview.trigger_words, vec!["cat"]);
        assert_eq!(overview.preset_names, vec!["default", "cinematic"]);
        assert!(overview.thumbnail.is_none());
        Ok(())
    }

    #[test]
    fn retrieve_without_a_local_record_does_not_create_one_before_falling_back() -> Result<()> {
        let (_dir, manager) = manager()?;
        // the fallback hits the network and fails in the test environment,
        // but the read-only probe must not have created a record file
        let result = manager.retrieve_model_info("foo [abc1234567].safetensors");
        assert!(result.is_err());
        assert!(!manager.store().record_path("abc1234567").exists());
        Ok(())
    }
}
