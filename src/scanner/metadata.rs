use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::models::GpsCoordinates;
use crate::scanner::sidecar;

/// Capture metadata recovered from a file. Every field is independent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    pub taken_at: Option<DateTime<Utc>>,
    pub camera_model: Option<String>,
    pub location: Option<GpsCoordinates>,
}

impl CaptureMetadata {
    pub fn is_empty(&self) -> bool {
        self.taken_at.is_none() && self.camera_model.is_none() && self.location.is_none()
    }
}

/// Extract capture metadata from `path`, preferring a Takeout sidecar for the
/// timestamp and location when `read_sidecars` is set. Never fails: a file
/// without readable metadata yields an empty result.
pub fn extract_metadata(path: &Path, read_sidecars: bool) -> CaptureMetadata {
    let mut metadata = extract_exif(path);

    if read_sidecars {
        if let Some(side) = sidecar::read_sidecar(path) {
            if side.taken_at.is_some() {
                metadata.taken_at = side.taken_at;
            }
            if side.location.is_some() {
                metadata.location = side.location;
            }
        }
    }

    metadata
}

/// Extract capture metadata from the file's embedded EXIF block only.
pub fn extract_exif(path: &Path) -> CaptureMetadata {
    let mut metadata = CaptureMetadata::default();

    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return metadata,
    };
    let mut bufreader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "No EXIF data");
            return metadata;
        }
    };

    metadata.camera_model = exif
        .get_field(exif::Tag::Model, exif::In::PRIMARY)
        .and_then(|field| ascii_value(&field.value))
        .filter(|model| !model.is_empty());

    metadata.taken_at = capture_time(&exif);
    metadata.location = gps_location(&exif);

    metadata
}

fn ascii_value(value: &exif::Value) -> Option<String> {
    match value {
        exif::Value::Ascii(ref parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        }),
        _ => None,
    }
}

fn ascii_bytes(value: &exif::Value) -> Option<&[u8]> {
    match value {
        exif::Value::Ascii(ref parts) => parts.first().map(Vec::as_slice),
        _ => None,
    }
}

/// Original capture time, falling back to the digitized and file-level stamps.
fn capture_time(exif: &exif::Exif) -> Option<DateTime<Utc>> {
    const CANDIDATES: [(exif::Tag, exif::Tag); 3] = [
        (exif::Tag::DateTimeOriginal, exif::Tag::OffsetTimeOriginal),
        (exif::Tag::DateTimeDigitized, exif::Tag::OffsetTimeDigitized),
        (exif::Tag::DateTime, exif::Tag::OffsetTime),
    ];

    CANDIDATES.iter().find_map(|(date_tag, offset_tag)| {
        let raw = ascii_bytes(&exif.get_field(*date_tag, exif::In::PRIMARY)?.value)?;
        let mut dt = exif::DateTime::from_ascii(raw).ok()?;
        if let Some(offset) = exif
            .get_field(*offset_tag, exif::In::PRIMARY)
            .and_then(|f| ascii_bytes(&f.value))
        {
            let _ = dt.parse_offset(offset);
        }
        exif_datetime_to_utc(&dt)
    })
}

/// EXIF stamps are wall-clock times; without an offset tag they are read as UTC.
fn exif_datetime_to_utc(dt: &exif::DateTime) -> Option<DateTime<Utc>> {
    let naive = NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_nano_opt(
            dt.hour as u32,
            dt.minute as u32,
            dt.second as u32,
            dt.nanosecond.unwrap_or(0),
        )?;

    match dt.offset {
        Some(minutes) => {
            let offset = FixedOffset::east_opt(minutes as i32 * 60)?;
            naive
                .and_local_timezone(offset)
                .single()
                .map(|local| local.with_timezone(&Utc))
        }
        None => Some(naive.and_utc()),
    }
}

fn gps_location(exif: &exif::Exif) -> Option<GpsCoordinates> {
    let lat = dms_field(exif, exif::Tag::GPSLatitude)?;
    let lon = dms_field(exif, exif::Tag::GPSLongitude)?;

    let lat = if hemisphere(exif, exif::Tag::GPSLatitudeRef) == Some(b'S') {
        -lat
    } else {
        lat
    };
    let lon = if hemisphere(exif, exif::Tag::GPSLongitudeRef) == Some(b'W') {
        -lon
    } else {
        lon
    };

    // Receivers without a fix commonly write zeros.
    if lat == 0.0 && lon == 0.0 {
        return None;
    }

    GpsCoordinates::new(lat, lon)
}

fn dms_field(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    match exif.get_field(tag, exif::In::PRIMARY)?.value {
        exif::Value::Rational(ref v) if v.len() >= 3 => {
            if v.iter().take(3).any(|r| r.denom == 0) {
                return None;
            }
            Some(dms_to_decimal(v[0].to_f64(), v[1].to_f64(), v[2].to_f64()))
        }
        _ => None,
    }
}

fn hemisphere(exif: &exif::Exif, tag: exif::Tag) -> Option<u8> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    ascii_bytes(&field.value)?
        .first()
        .map(|b| b.to_ascii_uppercase())
}

pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}
