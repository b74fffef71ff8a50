//! Client-facing operations over the catalog and library.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Catalog;
use crate::error::{Error, Result};
use crate::import::{ImportProgress, Importer};
use crate::library::LibraryStore;
use crate::models::{DateChange, ImportSummary, Photo};
use crate::tasks::ImportTask;
use crate::thumbnails::ThumbnailManager;

/// Host-provided folder chooser (a native dialog, a CLI argument, ...).
pub trait FolderPicker {
    /// `None` when the user dismissed the picker.
    fn pick_folder(&self, title: &str) -> Option<PathBuf>;
}

pub struct PhotoLibrary {
    config: Config,
    catalog: Arc<Catalog>,
    store: Arc<LibraryStore>,
    thumbnails: ThumbnailManager,
}

impl PhotoLibrary {
    pub fn open(config: Config) -> Result<Self> {
        let store = LibraryStore::open(&config.library.root)?;
        let catalog = Catalog::open(&config.database.sqlite_path)?;
        let thumbnails = ThumbnailManager::new(config.thumbnail_dir(), config.thumbnails.size);

        tracing::info!(
            library = %store.root().display(),
            catalog = %config.database.sqlite_path.display(),
            "Opened photo library"
        );

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            store: Arc::new(store),
            thumbnails,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn library_root(&self) -> &Path {
        self.store.root()
    }

    pub fn get_photos(&self) -> Result<Vec<Photo>> {
        self.catalog.list()
    }

    pub fn select_folder(&self, picker: &dyn FolderPicker) -> Option<PathBuf> {
        picker
            .pick_folder("Select a folder to import")
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn import_from_folder(&self, source: &Path) -> Result<ImportSummary> {
        self.import_from_folder_with(source, None, &AtomicBool::new(false))
    }

    pub fn import_from_folder_with(
        &self,
        source: &Path,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
        cancel_flag: &AtomicBool,
    ) -> Result<ImportSummary> {
        if source.as_os_str().is_empty() {
            return Err(Error::NoFolderSelected);
        }
        Importer::new(&self.catalog, &self.store, &self.config.import)
            .import_folder_cancellable(source, progress_tx, cancel_flag)
    }

    /// Run the import on a background thread.
    pub fn spawn_import(&self, source: &Path) -> Result<ImportTask> {
        if source.as_os_str().is_empty() {
            return Err(Error::NoFolderSelected);
        }
        Ok(ImportTask::spawn(
            self.catalog.clone(),
            self.store.clone(),
            self.config.import.clone(),
            source.to_path_buf(),
        ))
    }

    /// Change a photo's capture date. The catalog is untouched on any error.
    pub fn update_photo_date(&self, id: i64, date: &str) -> Result<Photo> {
        let date_taken = parse_photo_date(date)?;
        let photo = self.catalog.update_date_taken(id, date_taken)?;
        tracing::info!(id, date_taken = %photo.date_taken, "Updated capture date");
        Ok(photo)
    }

    pub fn photo_history(&self, id: i64) -> Result<Vec<DateChange>> {
        if self.catalog.get(id)?.is_none() {
            return Err(Error::NotFound(id));
        }
        self.catalog.date_history(id)
    }

    /// Map a library filename to the stored copy.
    pub fn resolve_filename(&self, filename: &str) -> Result<PathBuf> {
        let photo = self
            .catalog
            .find_by_filename(filename)?
            .ok_or_else(|| Error::FilenameNotFound(filename.to_string()))?;
        let path = PathBuf::from(&photo.library_path);
        if !self.store.contains(&path) {
            return Err(Error::OutsideLibrary(path));
        }
        Ok(path)
    }

    pub fn thumbnail(&self, filename: &str) -> Result<PathBuf> {
        let original = self.resolve_filename(filename)?;
        self.thumbnails.generate(filename, &original)
    }
}

/// Parse a client-supplied capture date.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` (read as UTC) and `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_photo_date(input: &str) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(Error::InvalidDate(input.to_string()))
}
