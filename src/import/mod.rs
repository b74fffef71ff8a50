//! Bulk import of a source folder into the library.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use crate::config::ImportConfig;
use crate::db::Catalog;
use crate::error::{Error, Result};
use crate::library::{LibraryStore, Placement};
use crate::models::{ImportSummary, NewPhoto, Photo};
use crate::scanner::{self, Candidate};

/// Events emitted while an import runs.
#[derive(Debug, Clone)]
pub enum ImportProgress {
    Started { source: PathBuf },
    Imported { path: PathBuf, photo: Photo },
    Skipped { path: PathBuf },
    Failed { path: PathBuf, reason: String },
    Completed { summary: ImportSummary },
}

/// What happened to one candidate file.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Imported(Photo),
    /// The content is already catalogued.
    Duplicate,
}

enum Tally {
    Imported,
    Skipped,
    Failed(PathBuf, String),
}

pub struct Importer<'a> {
    catalog: &'a Catalog,
    store: &'a LibraryStore,
    options: &'a ImportConfig,
}

impl<'a> Importer<'a> {
    pub fn new(catalog: &'a Catalog, store: &'a LibraryStore, options: &'a ImportConfig) -> Self {
        Self {
            catalog,
            store,
            options,
        }
    }

    pub fn import_folder(&self, source: &Path) -> Result<ImportSummary> {
        self.import_folder_cancellable(source, None, &AtomicBool::new(false))
    }

    /// Import every regular file under `source`.
    ///
    /// Per-file problems are recorded in the summary; only a source folder
    /// that cannot be enumerated fails the call. `cancel_flag` is checked
    /// between files, and a cancelled import returns what it finished.
    pub fn import_folder_cancellable(
        &self,
        source: &Path,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
        cancel_flag: &AtomicBool,
    ) -> Result<ImportSummary> {
        let source = scanner::open_source(source)?;

        tracing::info!(source = %source.display(), library = %self.store.root().display(), "Starting import");
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ImportProgress::Started {
                source: source.clone(),
            });
        }

        let tallies = if self.options.threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.threads)
                .build()
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            pool.install(|| self.process_all(&source, &progress_tx, cancel_flag))
        } else {
            self.process_all(&source, &progress_tx, cancel_flag)
        };

        let mut summary = ImportSummary::default();
        for tally in tallies {
            match tally {
                Tally::Imported => summary.imported += 1,
                Tally::Skipped => summary.skipped += 1,
                Tally::Failed(path, reason) => summary.record_failure(path, reason),
            }
        }
        summary.failures.sort_by(|a, b| a.path.cmp(&b.path));
        summary.cancelled = cancel_flag.load(Ordering::SeqCst);

        tracing::info!(
            source = %source.display(),
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Import finished"
        );
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ImportProgress::Completed {
                summary: summary.clone(),
            });
        }

        Ok(summary)
    }

    fn process_all(
        &self,
        source: &Path,
        progress_tx: &Option<mpsc::Sender<ImportProgress>>,
        cancel_flag: &AtomicBool,
    ) -> Vec<Tally> {
        scanner::candidates(source, self.options, Some(self.store.root()))
            .take_while(|_| !cancel_flag.load(Ordering::SeqCst))
            .par_bridge()
            .map_with(progress_tx.clone(), |tx, candidate| {
                // Files already handed to a worker are dropped once cancelled.
                if cancel_flag.load(Ordering::SeqCst) {
                    return None;
                }
                let tally = match candidate {
                    Candidate::File(path) => self.import_candidate(path, tx),
                    Candidate::Unreadable { path, reason } => {
                        tracing::warn!(path = %path.display(), %reason, "Unreadable entry");
                        notify(tx, ImportProgress::Failed {
                            path: path.clone(),
                            reason: reason.clone(),
                        });
                        Tally::Failed(path, reason)
                    }
                };
                Some(tally)
            })
            .flatten()
            .collect()
    }

    fn import_candidate(&self, path: PathBuf, tx: &Option<mpsc::Sender<ImportProgress>>) -> Tally {
        match self.import_file(&path) {
            Ok(FileOutcome::Imported(photo)) => {
                notify(tx, ImportProgress::Imported { path, photo });
                Tally::Imported
            }
            Ok(FileOutcome::Duplicate) => {
                notify(tx, ImportProgress::Skipped { path });
                Tally::Skipped
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(path = %path.display(), error = %reason, "Failed to import file");
                notify(tx, ImportProgress::Failed {
                    path: path.clone(),
                    reason: reason.clone(),
                });
                Tally::Failed(path, reason)
            }
        }
    }

    /// Fingerprint, dedup, extract, place and catalogue a single file.
    pub fn import_file(&self, path: &Path) -> Result<FileOutcome> {
        let kind = scanner::sniff(path)?.ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
        let hash = scanner::compute_sha256(path)?;

        if self.catalog.find_by_hash(&hash)?.is_some() {
            tracing::debug!(path = %path.display(), "Already in catalog");
            return Ok(FileOutcome::Duplicate);
        }

        let metadata = scanner::extract_metadata(path, self.options.read_sidecars);
        let date_taken = match metadata.taken_at {
            Some(taken_at) => taken_at,
            None => modified_time(path)?,
        };

        let placement = self.store.place(path, &hash, &date_taken, kind)?;

        let photo = NewPhoto {
            original_path: path.to_path_buf(),
            library_path: placement.path.clone(),
            filename: placement.filename.clone(),
            hash: hash.clone(),
            date_taken,
            camera_model: metadata.camera_model,
            location: metadata.location,
        };

        match self.catalog.insert(&photo) {
            Ok(stored) => Ok(FileOutcome::Imported(stored)),
            Err(Error::DuplicateHash(_)) => {
                // Lost a race with a concurrent import of the same bytes.
                self.release_copy(&placement, &hash);
                tracing::debug!(path = %path.display(), "Duplicate resolved at insert");
                Ok(FileOutcome::Duplicate)
            }
            Err(e) => {
                if placement.created {
                    self.release_copy(&placement, &hash);
                }
                Err(e)
            }
        }
    }

    /// Remove a copy whose insert failed, unless a catalogued row names it.
    /// Another importer may have reused the same file for its own row.
    fn release_copy(&self, placement: &Placement, hash: &str) {
        let ours = placement.path.to_string_lossy();
        let referenced = match self.catalog.find_by_hash(hash) {
            Ok(Some(winner)) => winner.library_path == ours,
            Ok(None) => false,
            Err(e) => {
                // Keep the file; an orphan copy is safer than a row without one.
                tracing::warn!(path = %placement.path.display(), error = %e, "Cannot verify copy is unused");
                true
            }
        };
        if referenced {
            return;
        }
        if let Err(e) = self.store.discard(placement) {
            tracing::warn!(path = %placement.path.display(), error = %e, "Failed to remove uncatalogued copy");
        }
    }
}

fn notify(tx: &Option<mpsc::Sender<ImportProgress>>, event: ImportProgress) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}

fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}
