use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot enumerate {}: {source}", .path.display())]
    Enumeration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("source path does not exist: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("source path is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("no folder selected")]
    NoFolderSelected,

    #[error("a photo with hash {0} is already in the catalog")]
    DuplicateHash(String),

    #[error("photo not found: {0}")]
    NotFound(i64),

    #[error("no photo with filename {0}")]
    FilenameNotFound(String),

    #[error("invalid date: {0:?}")]
    InvalidDate(String),

    #[error("unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("library path {} is outside the library root", .0.display())]
    OutsideLibrary(PathBuf),

    #[error("catalog constraint violated: {0}")]
    Conflict(String),
}

pub type Result<T> = std::result::Result<T, Error>;
