use std::error::Error;
use std::io;
use std::path::PathBuf;

use http::StatusCode;
use thiserror::Error;

/// Boxed error used at the boundaries with the transport and the dispatcher.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failures raised while the request body and its uploads are being ingested.
///
/// Every variant short-circuits the exchange: the dispatcher is never invoked and
/// the recorded uploads are scheduled for deletion.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request entity too large, current: {size} exceed the limit {limit}")]
    OversizedEntity { size: u64, limit: u64 },

    #[error("upstream stream error: {source}")]
    Upstream { source: BoxError },

    #[error("multipart error: {source}")]
    Multipart {
        #[from]
        source: MultipartError,
    },

    #[error("upload io error on {path:?}: {source}")]
    UploadIo { path: PathBuf, source: io::Error },
}

impl BodyError {
    pub fn oversized(size: u64, limit: u64) -> Self {
        Self::OversizedEntity { size, limit }
    }

    pub fn upstream<E: Into<BoxError>>(e: E) -> Self {
        Self::Upstream { source: e.into() }
    }

    pub fn upload_io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::UploadIo { path: path.into(), source }
    }

    #[inline]
    pub fn is_oversized(&self) -> bool {
        matches!(self, BodyError::OversizedEntity { .. })
    }

    /// The status code written back to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::OversizedEntity { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::Upstream { .. } | BodyError::Multipart { .. } => StatusCode::BAD_REQUEST,
            BodyError::UploadIo { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum MultipartError {
    #[error("missing multipart boundary")]
    MissingBoundary,

    #[error("invalid multipart boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("part header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargePartHeader { current_size: usize, max_size: usize },

    #[error("invalid part header: {reason}")]
    InvalidPartHeader { reason: String },

    #[error("part has no content-disposition header")]
    MissingContentDisposition,

    #[error("multipart body ended before the closing boundary")]
    UnexpectedEof,

    // required by `tokio_util::codec::Decoder`, whose `Error` must be `From<io::Error>`
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl MultipartError {
    pub fn invalid_boundary<S: ToString>(str: S) -> Self {
        Self::InvalidBoundary { reason: str.to_string() }
    }

    pub fn too_large_part_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargePartHeader { current_size, max_size }
    }

    pub fn invalid_part_header<S: ToString>(str: S) -> Self {
        Self::InvalidPartHeader { reason: str.to_string() }
    }
}

/// Errors surfaced by a [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The dispatcher decided the status itself; it is applied verbatim.
    #[error("dispatch failed with status {status}")]
    Failure {
        status: StatusCode,
        #[source]
        cause: Option<BoxError>,
    },

    /// Anything else, mapped to the configured fallback status.
    #[error("unclassified dispatch error: {source}")]
    Unclassified { source: BoxError },
}

impl DispatchError {
    pub fn failure(status: StatusCode) -> Self {
        Self::Failure { status, cause: None }
    }

    pub fn failure_with<E: Into<BoxError>>(status: StatusCode, cause: E) -> Self {
        Self::Failure { status, cause: Some(cause.into()) }
    }

    pub fn unclassified<E: Into<BoxError>>(e: E) -> Self {
        Self::Unclassified { source: e.into() }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("uploads directory must be set when file uploads are handled")]
    MissingUploadsDirectory,
}
