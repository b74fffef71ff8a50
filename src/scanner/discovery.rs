use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::scanner::sidecar;

/// One entry produced while walking a source folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    File(PathBuf),
    /// A directory entry below the root that could not be read.
    Unreadable { path: PathBuf, reason: String },
}

/// Check that `directory` can be enumerated and return its absolute form.
pub fn open_source(directory: &Path) -> Result<PathBuf> {
    let meta = match std::fs::metadata(directory) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::SourceNotFound(directory.to_path_buf()))
        }
        Err(source) => {
            return Err(Error::Enumeration {
                path: directory.to_path_buf(),
                source,
            })
        }
    };
    if !meta.is_dir() {
        return Err(Error::SourceNotDirectory(directory.to_path_buf()));
    }

    std::fs::read_dir(directory).map_err(|source| Error::Enumeration {
        path: directory.to_path_buf(),
        source,
    })?;

    directory.canonicalize().map_err(|source| Error::Enumeration {
        path: directory.to_path_buf(),
        source,
    })
}

/// Lazily walk `directory` for regular files, in file-name order.
///
/// Directories, symlinks (unless `follow_links` is set), sidecar files and
/// anything under `exclude` are skipped without being reported.
pub fn candidates<'a>(
    directory: &Path,
    options: &'a ImportConfig,
    exclude: Option<&'a Path>,
) -> impl Iterator<Item = Candidate> + 'a {
    let root = directory.to_path_buf();
    WalkDir::new(directory)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| match exclude {
            Some(excluded) => !entry.path().starts_with(excluded),
            None => true,
        })
        .filter_map(move |entry| match entry {
            Ok(entry) => {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || sidecar::is_sidecar(path)
                    || !options.accepts_extension(path)
                {
                    return None;
                }
                Some(Candidate::File(entry.into_path()))
            }
            Err(e) => {
                let path = failure_path(e.path(), &root);
                Some(Candidate::Unreadable {
                    path,
                    reason: e.to_string(),
                })
            }
        })
}

/// Walk errors without a path of their own are charged to the walk root.
fn failure_path(path: Option<&Path>, root: &Path) -> PathBuf {
    path.unwrap_or(root).to_path_buf()
}
