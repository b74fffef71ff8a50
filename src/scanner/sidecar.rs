//! Google Photos (Takeout) JSON sidecars.
//!
//! Takeout exports strip or rewrite EXIF but keep the capture time and location
//! in a `<name>.supplemental-metadata.json` (older exports: `<name>.json`)
//! next to each original.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::GpsCoordinates;

const SIDECAR_SUFFIXES: &[&str] = &[".supplemental-metadata.json", ".json"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TakeoutMetadata {
    #[serde(default)]
    photo_taken_time: Option<TakeoutTimestamp>,
    #[serde(default)]
    geo_data: Option<TakeoutGeoData>,
}

#[derive(Debug, Deserialize)]
struct TakeoutTimestamp {
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct TakeoutGeoData {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SidecarMetadata {
    pub taken_at: Option<DateTime<Utc>>,
    pub location: Option<GpsCoordinates>,
}

/// Whether `path` is a sidecar belonging to an existing sibling file.
pub fn is_sidecar(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    SIDECAR_SUFFIXES.iter().any(|suffix| {
        name.strip_suffix(suffix)
            .filter(|stem| !stem.is_empty())
            .map(|stem| path.with_file_name(stem).is_file())
            .unwrap_or(false)
    })
}

pub fn sidecar_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    SIDECAR_SUFFIXES
        .iter()
        .map(|suffix| path.with_file_name(format!("{name}{suffix}")))
        .find(|candidate| candidate.is_file())
}

/// Read the sidecar for `path`, if there is a readable one.
pub fn read_sidecar(path: &Path) -> Option<SidecarMetadata> {
    let sidecar = sidecar_path(path)?;
    let content = match std::fs::read_to_string(&sidecar) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(path = %sidecar.display(), error = %e, "Unreadable sidecar");
            return None;
        }
    };
    match parse_sidecar(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::debug!(path = %sidecar.display(), error = %e, "Malformed sidecar");
            None
        }
    }
}

pub fn parse_sidecar(content: &str) -> serde_json::Result<SidecarMetadata> {
    let raw: TakeoutMetadata = serde_json::from_str(content)?;

    let taken_at = raw
        .photo_taken_time
        .and_then(|t| t.timestamp.trim().parse::<i64>().ok())
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    // Takeout writes 0.0/0.0 when the photo has no location.
    let location = raw
        .geo_data
        .filter(|g| g.latitude != 0.0 || g.longitude != 0.0)
        .and_then(|g| GpsCoordinates::new(g.latitude, g.longitude));

    Ok(SidecarMetadata { taken_at, location })
}
