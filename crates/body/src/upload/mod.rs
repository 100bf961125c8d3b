//! File uploads of multipart requests.
//!
//! Every file part is registered in the exchange's [`UploadRegistry`] and written to
//! disk by its own task. The [`UploadTracker`] reports when the last upload finished
//! after the end of the request stream, and the [`Cleanup`] pass deletes the written
//! files exactly once.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::body::FailureFlag;
use crate::protocol::FileUpload;

mod cleanup;
pub use cleanup::{Cleanup, CleanupGuard};

mod stream;
pub(crate) use stream::UploadSink;
pub(crate) use stream::spawn_upload;

mod tracker;
pub use tracker::UploadTracker;

/// The uploads recorded for one exchange, in arrival order.
#[derive(Debug, Default)]
pub struct UploadRegistry {
    uploads: Mutex<Vec<FileUpload>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `upload` and returns its index.
    pub fn register(&self, upload: FileUpload) -> usize {
        let mut uploads = self.lock();
        uploads.push(upload);
        uploads.len() - 1
    }

    pub(crate) fn update<F: FnOnce(&mut FileUpload)>(&self, index: usize, f: F) {
        if let Some(upload) = self.lock().get_mut(index) {
            f(upload);
        }
    }

    pub fn snapshot(&self) -> Vec<FileUpload> {
        self.lock().clone()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.lock().iter().map(|upload| upload.uploaded_path().to_path_buf()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<FileUpload>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State shared between the handler reading the body and the upload tasks.
#[derive(Debug)]
pub(crate) struct IngestContext {
    pub(crate) registry: Arc<UploadRegistry>,
    pub(crate) tracker: UploadTracker,
    pub(crate) failure: Arc<FailureFlag>,
    pub(crate) cleanup: Cleanup,
}

impl IngestContext {
    pub(crate) fn new(registry: Arc<UploadRegistry>, failure: Arc<FailureFlag>, cleanup: Cleanup) -> Self {
        Self { registry, tracker: UploadTracker::new(), failure, cleanup }
    }
}
