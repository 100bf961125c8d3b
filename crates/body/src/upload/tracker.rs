use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Tracks the file uploads of one exchange and decides when the body is complete.
///
/// The body is complete once the end of the request stream was seen and no upload is
/// still writing. Both conditions can become true on different tasks, in any order;
/// [`try_complete`](UploadTracker::try_complete) reports completion exactly once.
#[derive(Debug, Default)]
pub struct UploadTracker {
    pending: AtomicUsize,
    stream_ended: AtomicBool,
    fired: AtomicBool,
    aborted: AtomicBool,
    notify: Notify,
}

impl UploadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_started(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns `true` if this completion finished the body.
    pub fn upload_completed(&self) -> bool {
        // never wraps below zero, a stray completion is ignored
        let _ = self.pending.fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| pending.checked_sub(1));
        self.try_complete()
    }

    /// Returns `true` if the end of the stream finished the body.
    pub fn stream_end_received(&self) -> bool {
        self.stream_ended.store(true, Ordering::Release);
        self.try_complete()
    }

    /// Completes the body when the stream ended and nothing is pending, `true` exactly once.
    pub fn try_complete(&self) -> bool {
        if !self.stream_ended.load(Ordering::Acquire) || self.pending.load(Ordering::Acquire) != 0 {
            return false;
        }

        if self.fired.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return false;
        }

        self.notify.notify_one();
        true
    }

    /// Wakes the waiter without completing, used when an upload failed.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Waits until the body completed or the exchange was aborted.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_completed() || self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn completes_without_uploads() {
        let tracker = UploadTracker::new();

        assert!(tracker.stream_end_received());
        assert!(tracker.is_completed());
        assert!(!tracker.try_complete());
    }

    #[test]
    fn stream_end_before_uploads_finish() {
        let tracker = UploadTracker::new();
        tracker.upload_started();
        tracker.upload_started();

        assert!(!tracker.stream_end_received());
        assert!(!tracker.upload_completed());
        assert_eq!(tracker.pending(), 1);
        assert!(tracker.upload_completed());
        assert!(!tracker.upload_completed());
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn uploads_finish_before_stream_end() {
        let tracker = UploadTracker::new();
        tracker.upload_started();

        assert!(!tracker.upload_completed());
        assert!(!tracker.is_completed());
        assert!(tracker.stream_end_received());
    }

    #[test]
    fn completes_exactly_once_across_threads() {
        for _ in 0..100 {
            let tracker = Arc::new(UploadTracker::new());
            for _ in 0..8 {
                tracker.upload_started();
            }

            let mut handles = Vec::new();
            for _ in 0..8 {
                let tracker = tracker.clone();
                handles.push(thread::spawn(move || tracker.upload_completed()));
            }
            let ended = {
                let tracker = tracker.clone();
                thread::spawn(move || tracker.stream_end_received())
            };

            let mut fired = usize::from(ended.join().unwrap());
            for handle in handles {
                fired += usize::from(handle.join().unwrap());
            }

            assert_eq!(fired, 1);
            assert!(tracker.is_completed());
        }
    }

    #[tokio::test]
    async fn wait_until_completed() {
        let tracker = Arc::new(UploadTracker::new());
        tracker.upload_started();

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait().await }
        });

        assert!(!tracker.stream_end_received());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        assert!(tracker.upload_completed());
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn abort_wakes_waiter() {
        let tracker = Arc::new(UploadTracker::new());
        tracker.upload_started();
        tracker.stream_end_received();

        tracker.abort();
        tracker.wait().await;

        assert!(tracker.is_aborted());
        assert!(!tracker.is_completed());
    }
}
