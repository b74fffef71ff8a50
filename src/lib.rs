//! photoo: import photos from any folder into a managed, deduplicated library.
//!
//! Files are fingerprinted by content, their capture metadata is read from
//! EXIF (or Google Takeout sidecars), and accepted originals are copied into a
//! Year/Month tree under the library root and indexed in a SQLite catalog.

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod library;
pub mod logging;
pub mod models;
pub mod scanner;
pub mod service;
pub mod tasks;
pub mod thumbnails;

pub use config::{Config, ImportConfig};
pub use db::Catalog;
pub use error::{Error, Result};
pub use import::{FileOutcome, ImportProgress, Importer};
pub use library::LibraryStore;
pub use models::{DateChange, GpsCoordinates, ImportFailure, ImportSummary, NewPhoto, Photo};
pub use service::{parse_photo_date, FolderPicker, PhotoLibrary};
pub use tasks::ImportTask;
pub use thumbnails::ThumbnailManager;
