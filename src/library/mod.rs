//! The managed library: originals copied into a Year/Month hierarchy.
//!
//! ```text
//! <root>/
//! ├── 2024/
//! │   └── 03/
//! │       └── 2024-03-01_10-00-00_9f86d081884c7d65.jpg
//! └── .thumbnails/
//! ```
//!
//! Files are written under a temporary name in their destination folder and
//! linked into place without overwriting, so a path handed to the catalog
//! always names a complete copy.

use chrono::{DateTime, Datelike, Utc};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::scanner::{hashing, ImageKind};

/// Hex digits of the content hash embedded in library filenames.
const HASH_PREFIX_LEN: usize = 16;

/// Attempts at a `_<n>` suffix before giving up on a destination folder.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Where a file landed in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub path: PathBuf,
    pub filename: String,
    /// False when an identical copy was already at the destination.
    pub created: bool,
}

pub struct LibraryStore {
    root: PathBuf,
}

impl LibraryStore {
    /// Open (creating if needed) the library rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Year/Month folder for a capture time.
    pub fn destination_folder(&self, date_taken: &DateTime<Utc>) -> PathBuf {
        self.root
            .join(format!("{:04}", date_taken.year()))
            .join(format!("{:02}", date_taken.month()))
    }

    /// Copy `source` into the library. The source is only ever read.
    pub fn place(
        &self,
        source: &Path,
        hash: &str,
        date_taken: &DateTime<Utc>,
        kind: ImageKind,
    ) -> Result<Placement> {
        let folder = self.destination_folder(date_taken);
        std::fs::create_dir_all(&folder)?;

        let extension = library_extension(source, kind);

        let mut temp = tempfile::Builder::new()
            .prefix(".photoo-")
            .suffix(".tmp")
            .tempfile_in(&folder)?;
        {
            let mut reader = File::open(source)?;
            io::copy(&mut reader, temp.as_file_mut())?;
            temp.as_file().sync_all()?;
        }

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = library_filename(date_taken, hash, &extension, attempt);
            let destination = folder.join(&filename);

            match temp.persist_noclobber(&destination) {
                Ok(_) => {
                    return Ok(Placement {
                        path: destination,
                        filename,
                        created: true,
                    })
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    // A concurrent import of the same bytes got here first.
                    if hashing::compute_sha256(&destination)? == hash {
                        tracing::debug!(path = %destination.display(), "Reusing identical library copy");
                        return Ok(Placement {
                            path: destination,
                            filename,
                            created: false,
                        });
                    }
                    temp = e.file;
                }
                Err(e) => return Err(Error::Io(e.error)),
            }
        }

        Err(Error::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free library name in {}", folder.display()),
        )))
    }

    /// Remove a copy that will not be catalogued. Already-removed files are fine.
    pub fn discard(&self, placement: &Placement) -> Result<()> {
        if !self.contains(&placement.path) {
            return Err(Error::OutsideLibrary(placement.path.clone()));
        }
        match std::fs::remove_file(&placement.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `YYYY-MM-DD_HH-MM-SS_<hash prefix>[_<n>].<ext>`
pub fn library_filename(
    date_taken: &DateTime<Utc>,
    hash: &str,
    extension: &str,
    attempt: u32,
) -> String {
    let prefix: String = hash.chars().take(HASH_PREFIX_LEN).collect();
    let stamp = date_taken.format("%Y-%m-%d_%H-%M-%S");
    if attempt == 0 {
        format!("{stamp}_{prefix}.{extension}")
    } else {
        format!("{stamp}_{prefix}_{attempt}.{extension}")
    }
}

/// Keep the source's extension (lowercased) when it is plain ASCII; otherwise
/// use the one implied by the sniffed format.
fn library_extension(source: &Path, kind: ImageKind) -> String {
    source
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| kind.extension().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::ImageFormat;

    const JPEG: ImageKind = ImageKind::Raster(ImageFormat::Jpeg);

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn write_source(dir: &Path, name: &str, bytes: &[u8]) -> (PathBuf, String) {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        let hash = hashing::compute_sha256(&path).unwrap();
        (path, hash)
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_library_filename() {
        let hash = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        assert_eq!(
            library_filename(&date(), hash, "jpg", 0),
            "2024-03-01_10-00-00_9f86d081884c7d65.jpg"
        );
        assert_eq!(
            library_filename(&date(), hash, "jpg", 2),
            "2024-03-01_10-00-00_9f86d081884c7d65_2.jpg"
        );
    }

    #[test]
    fn test_library_extension() {
        assert_eq!(library_extension(Path::new("/a/IMG_1.JPG"), JPEG), "jpg");
        assert_eq!(library_extension(Path::new("/a/IMG_1"), JPEG), "jpg");
        assert_eq!(library_extension(Path::new("/a/x.h e"), ImageKind::Heif), "heic");
    }

    #[test]
    fn test_place_copies_into_year_month() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(lib.path()).unwrap();
        let (source, hash) = write_source(src.path(), "IMG_0001.JPG", b"photo bytes");

        let placement = store.place(&source, &hash, &date(), JPEG).unwrap();

        assert!(placement.created);
        assert!(store.contains(&placement.path));
        assert_eq!(placement.path.parent().unwrap(), store.root().join("2024/03"));
        assert_eq!(std::fs::read(&placement.path).unwrap(), b"photo bytes");
        assert_eq!(std::fs::read(&source).unwrap(), b"photo bytes");
        // No temporary files left behind.
        assert_eq!(entries(&store.root().join("2024/03")), vec![placement.filename.clone()]);
    }

    #[test]
    fn test_place_reuses_identical_copy() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(lib.path()).unwrap();
        let (source, hash) = write_source(src.path(), "a.jpg", b"same");

        let first = store.place(&source, &hash, &date(), JPEG).unwrap();
        let second = store.place(&source, &hash, &date(), JPEG).unwrap();

        assert_eq!(first.path, second.path);
        assert!(!second.created);
        assert_eq!(entries(&store.root().join("2024/03")).len(), 1);
    }

    #[test]
    fn test_place_never_overwrites_different_content() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(lib.path()).unwrap();
        let (source, hash) = write_source(src.path(), "a.jpg", b"ours");

        let folder = store.destination_folder(&date());
        std::fs::create_dir_all(&folder).unwrap();
        let squatter = folder.join(library_filename(&date(), &hash, "jpg", 0));
        std::fs::write(&squatter, b"someone else").unwrap();

        let placement = store.place(&source, &hash, &date(), JPEG).unwrap();

        assert!(placement.filename.ends_with("_1.jpg"));
        assert_eq!(std::fs::read(&squatter).unwrap(), b"someone else");
        assert_eq!(std::fs::read(&placement.path).unwrap(), b"ours");
    }

    #[test]
    fn test_discard() {
        let src = tempfile::tempdir().unwrap();
        let lib = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(lib.path()).unwrap();
        let (source, hash) = write_source(src.path(), "a.png", b"bytes");

        let placement = store.place(&source, &hash, &date(), JPEG).unwrap();
        store.discard(&placement).unwrap();
        assert!(!placement.path.exists());
        // Second discard is a no-op.
        store.discard(&placement).unwrap();

        let outside = Placement {
            path: source.clone(),
            filename: "a.png".to_string(),
            created: true,
        };
        assert!(matches!(store.discard(&outside), Err(Error::OutsideLibrary(_))));
        assert!(source.exists());
    }
}
