//! Imports running on a background thread.
//!
//! The caller keeps an [`ImportTask`] handle: it can poll progress without
//! blocking, request cancellation, and collect the final summary.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::ImportConfig;
use crate::db::Catalog;
use crate::error::{Error, Result};
use crate::import::{ImportProgress, Importer};
use crate::library::LibraryStore;
use crate::models::ImportSummary;

pub struct ImportTask {
    pub source: PathBuf,
    cancel_flag: Arc<AtomicBool>,
    receiver: mpsc::Receiver<ImportProgress>,
    handle: JoinHandle<Result<ImportSummary>>,
    started_at: Instant,
}

impl ImportTask {
    /// Start importing `source` on a new thread.
    pub fn spawn(
        catalog: Arc<Catalog>,
        store: Arc<LibraryStore>,
        options: ImportConfig,
        source: PathBuf,
    ) -> Self {
        let (tx, receiver) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));

        let worker_flag = cancel_flag.clone();
        let worker_source = source.clone();
        let handle = std::thread::spawn(move || {
            let importer = Importer::new(&catalog, &store, &options);
            let result = importer.import_folder_cancellable(&worker_source, Some(tx), &worker_flag);
            if let Err(ref e) = result {
                tracing::error!(source = %worker_source.display(), error = %e, "Import failed");
            }
            result
        });

        Self {
            source,
            cancel_flag,
            receiver,
            handle,
            started_at: Instant::now(),
        }
    }

    /// Request cancellation. Files already in flight still finish.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Shared flag for cancelling from elsewhere (e.g. a signal handler).
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Drain progress events received so far.
    pub fn try_progress(&self) -> Vec<ImportProgress> {
        self.receiver.try_iter().collect()
    }

    /// Block until the import ends, handing each progress event to `on_progress`.
    pub fn wait(self, mut on_progress: impl FnMut(&ImportProgress)) -> Result<ImportSummary> {
        for event in self.receiver.iter() {
            on_progress(&event);
        }
        join_worker(self.handle)
    }

    /// Block until the import ends, discarding unread progress.
    pub fn join(self) -> Result<ImportSummary> {
        join_worker(self.handle)
    }
}

fn join_worker(handle: JoinHandle<Result<ImportSummary>>) -> Result<ImportSummary> {
    handle
        .join()
        .map_err(|_| Error::Io(std::io::Error::other("import worker panicked")))?
}
