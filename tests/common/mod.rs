#![allow(dead_code)]

use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Small PNG whose bytes depend on `seed`.
pub fn write_png(path: &Path, seed: u8) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(8, 8, |x, y| Rgb([seed, x as u8 * 16, y as u8 * 16]));
    img.save_with_format(path, ImageFormat::Png).unwrap();
}

pub fn set_mtime(path: &Path, secs_since_epoch: u64) -> SystemTime {
    let time = UNIX_EPOCH + Duration::from_secs(secs_since_epoch);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
    time
}

pub struct Gps {
    pub lat: (u32, u32, u32, u32),
    pub lat_ref: &'static str,
    pub lon: (u32, u32, u32, u32),
    pub lon_ref: &'static str,
}

#[derive(Default)]
pub struct ExifTags {
    pub model: Option<&'static str>,
    pub date_time_original: Option<&'static str>,
    pub gps: Option<Gps>,
}

fn ascii(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![text.as_bytes().to_vec()]),
    }
}

/// Degrees, minutes, and seconds as `seconds_num / seconds_denom`.
fn dms(tag: Tag, (deg, min, sec_num, sec_denom): (u32, u32, u32, u32)) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(vec![
            Rational { num: deg, denom: 1 },
            Rational { num: min, denom: 1 },
            Rational {
                num: sec_num,
                denom: sec_denom,
            },
        ]),
    }
}

fn exif_payload(tags: &ExifTags) -> Vec<u8> {
    let mut fields = Vec::new();
    if let Some(model) = tags.model {
        fields.push(ascii(Tag::Model, model));
    }
    if let Some(date) = tags.date_time_original {
        fields.push(ascii(Tag::DateTimeOriginal, date));
    }
    if let Some(ref gps) = tags.gps {
        fields.push(ascii(Tag::GPSLatitudeRef, gps.lat_ref));
        fields.push(dms(Tag::GPSLatitude, gps.lat));
        fields.push(ascii(Tag::GPSLongitudeRef, gps.lon_ref));
        fields.push(dms(Tag::GPSLongitude, gps.lon));
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    tiff.into_inner()
}

/// JPEG with an EXIF APP1 segment built from `tags`.
pub fn write_jpeg_with_exif(path: &Path, seed: u8, tags: &ExifTags) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(16, 16, |x, y| Rgb([seed, x as u8 * 8, y as u8 * 8]));
    let mut jpeg = Cursor::new(Vec::new());
    img.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
    let jpeg = jpeg.into_inner();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let tiff = exif_payload(tags);
    let segment_len = (2 + 6 + tiff.len()) as u16;

    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    fs::write(path, out).unwrap();
}

/// Every regular file under `root` with its contents, skipping the thumbnail cache.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".thumbnails")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
        .collect()
}
