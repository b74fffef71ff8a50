//! Per-file analysis used by the importer: discovery, content sniffing,
//! fingerprinting and capture-metadata extraction.

pub mod discovery;
pub mod format;
pub mod hashing;
pub mod metadata;
pub mod sidecar;

pub use discovery::{candidates, open_source, Candidate};
pub use format::{sniff, ImageKind};
pub use hashing::compute_sha256;
pub use metadata::{extract_metadata, CaptureMetadata};
