use image::imageops::FilterType;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Renders and caches JPEG thumbnails, addressed by library filename.
pub struct ThumbnailManager {
    cache_dir: PathBuf,
    size: u32,
}

impl ThumbnailManager {
    pub fn new(cache_dir: PathBuf, size: u32) -> Self {
        Self {
            cache_dir,
            size: size.max(1),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache location for a library filename. Library filenames are unique,
    /// so they double as the cache key.
    pub fn cache_path(&self, filename: &str) -> Result<PathBuf> {
        if !is_plain_filename(filename) {
            return Err(Error::FilenameNotFound(filename.to_string()));
        }
        Ok(self.cache_dir.join(format!("{filename}.thumb.jpg")))
    }

    pub fn get_cached_path(&self, filename: &str) -> Option<PathBuf> {
        self.cache_path(filename).ok().filter(|p| p.is_file())
    }

    /// Return the cached thumbnail for `filename`, rendering it from `original`
    /// on first use.
    pub fn generate(&self, filename: &str, original: &Path) -> Result<PathBuf> {
        let cache_path = self.cache_path(filename)?;
        if cache_path.is_file() {
            return Ok(cache_path);
        }

        fs::create_dir_all(&self.cache_dir)?;

        let img = image::open(original)?;
        let thumbnail = img.resize(self.size, self.size, FilterType::Lanczos3).to_rgb8();

        // Render next to the final path so readers never see a partial JPEG.
        let temp = tempfile::Builder::new()
            .prefix(".thumb-")
            .suffix(".tmp")
            .tempfile_in(&self.cache_dir)?;
        thumbnail.save_with_format(temp.path(), ImageFormat::Jpeg)?;
        temp.persist(&cache_path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!(filename, path = %cache_path.display(), "Rendered thumbnail");
        Ok(cache_path)
    }
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}
