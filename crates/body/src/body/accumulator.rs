use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::body::FailureFlag;
use crate::protocol::{BodyError, ContentKind};

/// What happened to a chunk handed to [`BodyAccumulator::on_chunk`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Ingest {
    /// appended to the body buffer
    Retained,
    /// counted but not retained, the chunk belongs to the multipart decoder
    Forward,
    /// the exchange already failed, the chunk is dropped
    Ignored,
}

/// Counts the incoming body bytes against the limit and buffers non-multipart bodies.
#[derive(Debug)]
pub struct BodyAccumulator {
    kind: ContentKind,
    limit: Option<u64>,
    size: u64,
    buffer: BytesMut,
    failure: Arc<FailureFlag>,
}

impl BodyAccumulator {
    pub fn new(kind: ContentKind, limit: Option<u64>, capacity: usize, failure: Arc<FailureFlag>) -> Self {
        // multipart data never lands in the buffer
        let capacity = if kind.is_multipart() { 0 } else { capacity };
        Self { kind, limit, size: 0, buffer: BytesMut::with_capacity(capacity), failure }
    }

    /// Accounts for `chunk`.
    ///
    /// The chunk pushing the running size over the limit fails the exchange and is the
    /// only one returning an error; every chunk after it is [`Ingest::Ignored`].
    pub fn on_chunk(&mut self, chunk: &Bytes) -> Result<Ingest, BodyError> {
        if self.failure.is_failed() {
            return Ok(Ingest::Ignored);
        }

        self.size = self.size.saturating_add(chunk.len() as u64);

        if let Some(limit) = self.limit {
            if self.size > limit {
                warn!(size = self.size, limit, "request body exceeds the limit");
                self.failure.fail(BodyError::oversized(self.size, limit));
                return Err(BodyError::oversized(self.size, limit));
            }
        }

        if self.kind.is_multipart() {
            return Ok(Ingest::Forward);
        }

        self.buffer.extend_from_slice(chunk);
        Ok(Ingest::Retained)
    }

    /// Bytes received so far, including forwarded multipart bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.failure.is_failed()
    }

    pub fn into_body(self) -> Bytes {
        self.buffer.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator(kind: ContentKind, limit: Option<u64>) -> (BodyAccumulator, Arc<FailureFlag>) {
        let failure = Arc::new(FailureFlag::new());
        (BodyAccumulator::new(kind, limit, 16, failure.clone()), failure)
    }

    #[test]
    fn retains_plain_body() {
        let (mut acc, _) = accumulator(ContentKind::Other, None);

        assert_eq!(acc.on_chunk(&Bytes::from_static(b"hello ")).unwrap(), Ingest::Retained);
        assert_eq!(acc.on_chunk(&Bytes::from_static(b"world")).unwrap(), Ingest::Retained);

        assert_eq!(acc.size(), 11);
        assert!(!acc.is_failed());
        assert_eq!(acc.into_body(), Bytes::from_static(b"hello world"));
    }

    #[test]
    fn body_at_limit_is_accepted() {
        let (mut acc, _) = accumulator(ContentKind::UrlEncoded, Some(10));

        assert_eq!(acc.on_chunk(&Bytes::from_static(b"a=1&b=2222")).unwrap(), Ingest::Retained);
        assert_eq!(acc.size(), 10);
        assert!(!acc.is_failed());
    }

    #[test]
    fn oversized_fails_exactly_once() {
        let (mut acc, failure) = accumulator(ContentKind::Other, Some(10));

        assert_eq!(acc.on_chunk(&Bytes::from_static(b"123456")).unwrap(), Ingest::Retained);
        let error = acc.on_chunk(&Bytes::from_static(b"78901")).unwrap_err();
        assert!(matches!(error, BodyError::OversizedEntity { size: 11, limit: 10 }));

        assert_eq!(acc.on_chunk(&Bytes::from_static(b"more")).unwrap(), Ingest::Ignored);
        assert_eq!(acc.on_chunk(&Bytes::from_static(b"more")).unwrap(), Ingest::Ignored);

        assert!(failure.is_failed());
        assert!(failure.take_cause().is_some_and(|e| e.is_oversized()));
        assert_eq!(acc.size(), 11);
    }

    #[test]
    fn multipart_is_forwarded() {
        let (mut acc, _) = accumulator(ContentKind::Multipart, Some(100));

        assert_eq!(acc.on_chunk(&Bytes::from_static(b"--boundary\r\n")).unwrap(), Ingest::Forward);
        assert_eq!(acc.size(), 12);
        assert!(acc.into_body().is_empty());
    }

    #[test]
    fn ignores_after_external_failure() {
        let (mut acc, failure) = accumulator(ContentKind::Other, None);
        failure.fail(BodyError::upstream("connection reset"));

        assert_eq!(acc.on_chunk(&Bytes::from_static(b"late")).unwrap(), Ingest::Ignored);
        assert_eq!(acc.size(), 0);
    }
}
