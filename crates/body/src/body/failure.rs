use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::protocol::BodyError;

/// Exchange-wide failure latch.
///
/// Set by the accumulator on an oversized body, by the upstream stream on error and by
/// an upload task on I/O failure. Only the first failure is recorded.
#[derive(Debug, Default)]
pub struct FailureFlag {
    failed: AtomicBool,
    cause: Mutex<Option<BodyError>>,
}

impl FailureFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` if nothing failed yet, returns whether this call set the flag.
    pub fn fail(&self, error: BodyError) -> bool {
        let mut cause = self.cause.lock().unwrap_or_else(PoisonError::into_inner);
        if self.failed.swap(true, Ordering::AcqRel) {
            return false;
        }
        *cause = Some(error);
        true
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Takes the recorded cause, the flag itself stays set.
    pub fn take_cause(&self) -> Option<BodyError> {
        self.cause.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_wins() {
        let flag = FailureFlag::new();
        assert!(!flag.is_failed());

        assert!(flag.fail(BodyError::oversized(11, 10)));
        assert!(!flag.fail(BodyError::upstream("reset")));
        assert!(flag.is_failed());

        assert!(flag.take_cause().is_some_and(|e| e.is_oversized()));
        assert!(flag.take_cause().is_none());
        assert!(flag.is_failed());
    }
}
