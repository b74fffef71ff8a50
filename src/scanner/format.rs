//! Content sniffing: decide from the leading bytes whether a file is an image.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::ImageFormat;

/// Image container recognised from a file's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Anything the `image` crate can identify (JPEG, PNG, GIF, WebP, TIFF/RAW, BMP, ...).
    Raster(ImageFormat),
    /// ISO base media file with a HEIF/HEIC/AVIF brand.
    Heif,
}

impl ImageKind {
    /// Extension used when the source file has none.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Raster(format) => format.extensions_str().first().copied().unwrap_or("img"),
            ImageKind::Heif => "heic",
        }
    }
}

const HEADER_LEN: usize = 32;

const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1", b"avif", b"avis",
];

/// Read the header of `path` and classify it. `Ok(None)` means "not an image".
pub fn sniff(path: &Path) -> std::io::Result<Option<ImageKind>> {
    let mut file = File::open(path)?;
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.by_ref()
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(classify(&header))
}

pub fn classify(header: &[u8]) -> Option<ImageKind> {
    if is_heif(header) {
        return Some(ImageKind::Heif);
    }
    match image::guess_format(header) {
        Ok(format) if is_photo_format(format) => Some(ImageKind::Raster(format)),
        _ => None,
    }
}

/// `guess_format` also knows a few formats whose magic is one or two ASCII bytes
/// (PNM, TGA-less formats, ...); those match plain text too easily.
fn is_photo_format(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::Gif
            | ImageFormat::WebP
            | ImageFormat::Tiff
            | ImageFormat::Bmp
            | ImageFormat::Avif
            | ImageFormat::OpenExr
            | ImageFormat::Qoi
    )
}

fn is_heif(header: &[u8]) -> bool {
    if header.len() < 12 || &header[4..8] != b"ftyp" {
        return false;
    }
    let major = &header[8..12];
    if HEIF_BRANDS.iter().any(|brand| major == &brand[..]) {
        return true;
    }
    // Compatible brands follow the 4-byte minor version.
    header
        .get(16..)
        .map(|rest| {
            rest.chunks_exact(4)
                .any(|c| HEIF_BRANDS.iter().any(|brand| c == &brand[..]))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_jpeg_and_png() {
        assert_eq!(
            classify(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]),
            Some(ImageKind::Raster(ImageFormat::Jpeg))
        );
        assert_eq!(
            classify(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some(ImageKind::Raster(ImageFormat::Png))
        );
    }

    #[test]
    fn test_classify_tiff_based_raw() {
        // CR2/NEF/ARW all start with a TIFF header.
        assert_eq!(
            classify(b"II*\0\x10\0\0\0CR\x02\0"),
            Some(ImageKind::Raster(ImageFormat::Tiff))
        );
    }

    #[test]
    fn test_classify_heic() {
        let mut header = vec![0, 0, 0, 0x18];
        header.extend_from_slice(b"ftypheic");
        header.extend_from_slice(&[0, 0, 0, 0]);
        header.extend_from_slice(b"mif1heic");
        assert_eq!(classify(&header), Some(ImageKind::Heif));
        assert_eq!(ImageKind::Heif.extension(), "heic");
    }

    #[test]
    fn test_classify_rejects_text_and_video() {
        assert_eq!(classify(b"this is not an image at all"), None);
        assert_eq!(classify(b"P1 looks like a bitmap header"), None);
        assert_eq!(classify(b""), None);

        let mut mp4 = vec![0, 0, 0, 0x18];
        mp4.extend_from_slice(b"ftypisom\0\0\0\0isomavc1");
        assert_eq!(classify(&mp4), None);
    }

    #[test]
    fn test_sniff_reads_file_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.gif");
        std::fs::write(&path, b"GIF89a\x01\0\x01\0").unwrap();
        assert_eq!(
            sniff(&path).unwrap(),
            Some(ImageKind::Raster(ImageFormat::Gif))
        );
    }
}
