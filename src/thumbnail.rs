use crate::{civitai::CivitaiClient, error::Result, hash};
use log::{info, warn};
use std::{
    fs,
    path::{Path, PathBuf},
};

const MAX_THUMBNAIL_EDGE: u32 = 300;

/// One PNG thumbnail per sanitized model name, resized so neither dimension
/// exceeds [`MAX_THUMBNAIL_EDGE`]. Repeated `prefer_local` lookups never
/// re-download once a file exists.
#[derive(Debug)]
pub struct ThumbnailCache {
    thumbs_dir: PathBuf,
}

impl ThumbnailCache {
    pub fn new(thumbs_dir: impl Into<PathBuf>) -> Result<Self> {
        let thumbs_dir = thumbs_dir.into();
        fs::create_dir_all(&thumbs_dir)?;
        Ok(Self { thumbs_dir })
    }

    pub fn thumbs_dir(&self) -> &Path {
        &self.thumbs_dir
    }

    pub fn path_for(&self, model_name: &str) -> PathBuf {
        let cleaned = hash::clean_model_name(model_name, true);
        self.thumbs_dir.join(format!("{}.png", cleaned.trim()))
    }

    /// Local probe only; `Some` iff a thumbnail file already exists.
    pub fn existing(&self, model_name: &str) -> Option<PathBuf> {
        let path = self.path_for(model_name);
        path.exists().then_some(path)
    }

    /// Decodes raw image bytes, bounds them to the thumbnail size and saves
    /// the PNG. Also serves images the host hands over directly.
    pub fn store_bytes(&self, model_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(model_name);
        let image = image::load_from_memory(bytes)?;
        // bound, never upscale
        let thumbnail = if image.width() > MAX_THUMBNAIL_EDGE || image.height() > MAX_THUMBNAIL_EDGE
        {
            image.thumbnail(MAX_THUMBNAIL_EDGE, MAX_THUMBNAIL_EDGE)
        } else {
            image
        };
        thumbnail.save(&path)?;
        Ok(path)
    }

    /// Returns a thumbnail path for the model, reusing the local file when
    /// `prefer_local` allows it and downloading once otherwise. `Ok(None)`
    /// when no image can be obtained; callers tolerate a missing thumbnail.
    pub fn obtain(
        &self,
        client: &CivitaiClient,
        model_name: &str,
        image_url: Option<&str>,
        prefer_local: bool,
    ) -> Result<Option<PathBuf>> {
        if prefer_local {
            if let Some(path) = self.existing(model_name) {
                info!("Reusing local thumbnail {path:?}");
                return Ok(Some(path));
            }
        }

        if let Some(url) = image_url.filter(|url| !url.is_empty()) {
            if let Some(bytes) = client.download_image_bytes(url) {
                return self.store_bytes(model_name, &bytes).map(Some);
            }
            warn!("Could not download thumbnail for {model_name}");
        }

        // fall back to whatever is already on disk, even when not preferred
        Ok(self.existing(model_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn cache() -> Result<(TempDir, ThumbnailCache)> {
        let dir = TempDir::new()?;
        let cache = ThumbnailCache::new(dir.path().join("thumbnails"))?;
        Ok((dir, cache))
    }

    fn png_bytes(width: u32, height: u32) -> Result<Vec<u8>> {
        let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    #[test]
    fn path_is_named_after_cleaned_model_name() -> Result<()> {
        let (_dir, cache) = cache()?;
        let path = cache.path_for("foo [abc1234567].safetensors");
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "foo.png");
        Ok(())
    }

    #[test]
    fn store_bytes_bounds_both_dimensions() -> Result<()> {
        let (_dir, cache) = cache()?;
        let path = cache.store_bytes("model.safetensors", &png_bytes(600, 400)?)?;

        let stored = image::open(&path)?;
        assert_eq!(stored.width(), 300);
        assert_eq!(stored.height(), 200);
        Ok(())
    }

    #[test]
    fn small_images_are_not_upscaled() -> Result<()> {
        let (_dir, cache) = cache()?;
        let path = cache.store_bytes("model.safetensors", &png_bytes(120, 80)?)?;

        let stored = image::open(&path)?;
        assert_eq!((stored.width(), stored.height()), (120, 80));
        Ok(())
    }

    #[test]
    fn prefer_local_reuses_existing_file_without_network() -> Result<()> {
        let (_dir, cache) = cache()?;
        let stored = cache.store_bytes("model.safetensors", &png_bytes(10, 10)?)?;

        let client = CivitaiClient::new()?;
        // a bogus URL proves no network attempt is made on the local path
        let reused = cache.obtain(
            &client,
            "model.safetensors",
            Some("http://invalid.invalid/img.png"),
            true,
        )?;
        assert_eq!(reused, Some(stored));
        Ok(())
    }

    #[test]
    fn obtain_without_image_or_local_file_yields_none() -> Result<()> {
        let (_dir, cache) = cache()?;
        let client = CivitaiClient::new()?;
        assert_eq!(cache.obtain(&client, "model.safetensors", None, true)?, None);
        Ok(())
    }
}
