use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::upload::UploadRegistry;

/// Deletes the uploaded files of an exchange, at most once.
///
/// Clones share the same latch: whichever clone runs first performs the pass, every
/// other call is a no-op.
#[derive(Debug, Clone)]
pub struct Cleanup {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    started: AtomicBool,
    enabled: bool,
    registry: Arc<UploadRegistry>,
}

impl Cleanup {
    /// A disabled cleanup never touches the file system, used when file uploads are not handled.
    pub fn new(registry: Arc<UploadRegistry>, enabled: bool) -> Self {
        Self { inner: Arc::new(Inner { started: AtomicBool::new(false), enabled, registry }) }
    }

    /// Runs the deletion pass, returns `true` for the single call that ran it.
    pub async fn delete_all(&self) -> bool {
        if self.inner.started.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return false;
        }

        if !self.inner.enabled {
            return true;
        }

        for path in self.inner.registry.paths() {
            match tokio::fs::try_exists(&path).await {
                Ok(true) => {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(path = %path.display(), error = %e, "delete of uploaded file failed");
                    } else {
                        debug!(path = %path.display(), "deleted uploaded file");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not detect if uploaded file exists, not deleting");
                }
            }
        }
        true
    }

    /// Runs [`delete_all`](Cleanup::delete_all) on a background task.
    pub fn schedule(&self) {
        if self.is_started() {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let cleanup = self.clone();
                handle.spawn(async move {
                    cleanup.delete_all().await;
                });
            }
            Err(e) => warn!(error = %e, "no runtime available, uploaded files are not deleted"),
        }
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Returns a guard that schedules the pass when dropped while still armed.
    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard { cleanup: Some(self.clone()) }
    }
}

/// Schedules the [`Cleanup`] of an exchange whose ingestion did not reach dispatch,
/// including when the future reading the body is dropped.
#[derive(Debug)]
pub struct CleanupGuard {
    cleanup: Option<Cleanup>,
}

impl CleanupGuard {
    /// The exchange was handed over, the files now belong to the dispatched request.
    pub fn disarm(&mut self) {
        self.cleanup = None;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            debug!("exchange dropped before dispatch, scheduling upload cleanup");
            cleanup.schedule();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PartHeader;
    use crate::protocol::FileUpload;
    use std::path::Path;

    fn register(registry: &UploadRegistry, path: &Path) {
        let headers = [httparse::Header { name: "Content-Disposition", value: b"form-data; name=\"f\"; filename=\"a\"" }];
        let header = PartHeader::parse(&headers).unwrap();
        registry.register(FileUpload::new(&header, path.to_path_buf()));
    }

    #[tokio::test]
    async fn deletes_existing_files_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(UploadRegistry::new());
        let written = dir.path().join("written");
        tokio::fs::write(&written, b"data").await.unwrap();
        register(&registry, &written);
        register(&registry, &dir.path().join("never-created"));

        let cleanup = Cleanup::new(registry, true);
        assert!(cleanup.delete_all().await);

        assert!(!written.exists());
        assert!(cleanup.is_started());
    }

    #[tokio::test]
    async fn concurrent_calls_run_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(UploadRegistry::new());
        let written = dir.path().join("written");
        tokio::fs::write(&written, b"data").await.unwrap();
        register(&registry, &written);

        let cleanup = Cleanup::new(registry, true);
        let calls = (0..16).map(|_| {
            let cleanup = cleanup.clone();
            async move { cleanup.delete_all().await }
        });
        let results = futures::future::join_all(calls).await;

        assert_eq!(results.iter().filter(|ran| **ran).count(), 1);
        assert!(!written.exists());
    }

    #[tokio::test]
    async fn disabled_cleanup_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(UploadRegistry::new());
        let written = dir.path().join("written");
        tokio::fs::write(&written, b"data").await.unwrap();
        register(&registry, &written);

        let cleanup = Cleanup::new(registry, false);
        assert!(cleanup.delete_all().await);
        assert!(!cleanup.delete_all().await);

        assert!(written.exists());
    }

    #[tokio::test]
    async fn dropped_guard_schedules_pass() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(UploadRegistry::new());
        let written = dir.path().join("written");
        tokio::fs::write(&written, b"data").await.unwrap();
        register(&registry, &written);

        let cleanup = Cleanup::new(registry, true);
        drop(cleanup.guard());

        for _ in 0..100 {
            if !written.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!written.exists());
        assert!(cleanup.is_started());
    }

    #[tokio::test]
    async fn disarmed_guard_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(UploadRegistry::new());
        let written = dir.path().join("written");
        tokio::fs::write(&written, b"data").await.unwrap();
        register(&registry, &written);

        let cleanup = Cleanup::new(registry, true);
        let mut guard = cleanup.guard();
        guard.disarm();
        drop(guard);

        tokio::task::yield_now().await;
        assert!(!cleanup.is_started());
        assert!(written.exists());
    }

    #[tokio::test]
    async fn scheduled_pass_runs_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(UploadRegistry::new());
        let written = dir.path().join("written");
        tokio::fs::write(&written, b"data").await.unwrap();
        register(&registry, &written);

        let cleanup = Cleanup::new(registry, true);
        cleanup.schedule();
        cleanup.schedule();

        for _ in 0..100 {
            if !written.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!written.exists());
    }
}
