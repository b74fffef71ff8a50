//! Catalog records and the shapes exchanged with clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A signed decimal-degree position. Only ever constructed from real GPS data,
/// so "no location" is `None` rather than `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

/// One imported file, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PhotoFields")]
pub struct Photo {
    pub id: i64,
    pub original_path: String,
    pub library_path: String,
    pub filename: String,
    pub hash: String,
    pub date_taken: DateTime<Utc>,
    pub camera_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub import_date: DateTime<Utc>,
}

impl Photo {
    pub fn location(&self) -> Option<GpsCoordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => GpsCoordinates::new(lat, lon),
            _ => None,
        }
    }
}

/// Wire shape of a photo before validation.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PhotoFields {
    id: i64,
    original_path: String,
    library_path: String,
    filename: String,
    hash: String,
    date_taken: DateTime<Utc>,
    #[serde(default)]
    camera_model: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    import_date: DateTime<Utc>,
}

impl TryFrom<PhotoFields> for Photo {
    type Error = String;

    fn try_from(f: PhotoFields) -> Result<Self, Self::Error> {
        match (f.latitude, f.longitude) {
            (None, None) => {}
            (Some(lat), Some(lon)) => {
                if GpsCoordinates::new(lat, lon).is_none() {
                    return Err(format!("coordinates out of range: ({lat}, {lon})"));
                }
            }
            _ => return Err("latitude and longitude must be given together".to_string()),
        }
        if f.hash.is_empty() {
            return Err("hash must not be empty".to_string());
        }

        Ok(Photo {
            id: f.id,
            original_path: f.original_path,
            library_path: f.library_path,
            filename: f.filename,
            hash: f.hash,
            date_taken: f.date_taken,
            camera_model: f.camera_model,
            latitude: f.latitude,
            longitude: f.longitude,
            import_date: f.import_date,
        })
    }
}

/// A photo that has been placed in the library but not yet catalogued.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub original_path: PathBuf,
    pub library_path: PathBuf,
    pub filename: String,
    pub hash: String,
    pub date_taken: DateTime<Utc>,
    pub camera_model: Option<String>,
    pub location: Option<GpsCoordinates>,
}

/// Audit entry written whenever a photo's capture date is edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateChange {
    pub id: i64,
    pub photo_id: i64,
    pub field_name: String,
    pub old_value: String,
    pub new_value: String,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one `ImportFromFolder` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ImportFailure>,
    /// Set when the import stopped early on request.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported + self.skipped + self.failed
    }

    pub(crate) fn record_failure(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(ImportFailure {
            path,
            reason: reason.into(),
        });
    }
}
