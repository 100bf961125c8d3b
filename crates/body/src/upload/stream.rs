use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::protocol::BodyError;
use crate::upload::IngestContext;

const UPLOAD_CHANNEL_CAPACITY: usize = 16;

/// Sending half of one upload, dropping it ends the file.
#[derive(Debug)]
pub(crate) struct UploadSink {
    sender: mpsc::Sender<Bytes>,
}

impl UploadSink {
    /// Hands `chunk` to the writer task, `false` once the task stopped accepting data.
    pub(crate) async fn send(&self, chunk: Bytes) -> bool {
        self.sender.send(chunk).await.is_ok()
    }
}

/// Starts the task writing the upload registered at `index` to `path`.
///
/// The tracker must already count the upload as started.
pub(crate) fn spawn_upload(ctx: Arc<IngestContext>, index: usize, path: PathBuf) -> UploadSink {
    let (sender, receiver) = mpsc::channel(UPLOAD_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut size = 0;
        match write_upload(receiver, &path, &mut size).await {
            Ok(()) => {
                debug!(path = %path.display(), size, "upload completed");
                ctx.registry.update(index, |upload| upload.complete(size));
                ctx.tracker.upload_completed();
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "upload failed");
                ctx.registry.update(index, |upload| upload.fail(size));
                ctx.failure.fail(BodyError::upload_io(path.clone(), e));
                ctx.cleanup.schedule();
                ctx.tracker.abort();
            }
        }

        // the cleanup pass may have run before this file existed
        if ctx.cleanup.is_started() && ctx.cleanup.is_enabled() {
            remove_late_file(&path).await;
        }
    });

    UploadSink { sender }
}

async fn write_upload(mut receiver: mpsc::Receiver<Bytes>, path: &Path, size: &mut u64) -> io::Result<()> {
    let mut file = File::create(path).await?;
    while let Some(chunk) = receiver.recv().await {
        file.write_all(&chunk).await?;
        *size += chunk.len() as u64;
    }
    file.flush().await
}

async fn remove_late_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "deleted upload finished after cleanup"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "delete of uploaded file failed"),
    }
}
